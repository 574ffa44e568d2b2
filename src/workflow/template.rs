//! 参数模板渲染
//!
//! 支持的占位符：`{{user_text}}`（完整请求文本）、`{{document}}`（请求附带的文档上下文）、
//! `{{input}}`（input_from 步骤输出的文本）。未知占位符原样保留。
//! 若某个参数的模板恰好只是一个占位符且渲染结果为空，则该参数被省略。

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::tools::Parameters;

pub const USER_TEXT: &str = "{{user_text}}";
pub const DOCUMENT: &str = "{{document}}";
pub const INPUT: &str = "{{input}}";

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([a-z_]+)\s*\}\}").expect("valid placeholder regex"))
}

/// 渲染时可用的取值
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateContext<'a> {
    pub user_text: &'a str,
    pub document: &'a str,
    pub input: Option<&'a str>,
}

/// 模板中是否引用了某占位符
pub fn references(template: &Parameters, placeholder: &str) -> bool {
    let name = placeholder.trim_matches(|c| c == '{' || c == '}');
    template.values().any(|v| {
        placeholder_regex()
            .captures_iter(v)
            .any(|c| c.get(1).map(|m| m.as_str()) == Some(name))
    })
}

pub fn render(template: &Parameters, ctx: &TemplateContext<'_>) -> Parameters {
    let re = placeholder_regex();
    template
        .iter()
        .filter_map(|(key, value)| {
            let rendered = re
                .replace_all(value, |caps: &Captures<'_>| match &caps[1] {
                    "user_text" => ctx.user_text.to_string(),
                    "document" => ctx.document.to_string(),
                    "input" => ctx.input.unwrap_or_default().to_string(),
                    _ => caps[0].to_string(),
                })
                .into_owned();
            let only_placeholder = re
                .find(value)
                .map(|m| m.start() == 0 && m.end() == value.len())
                .unwrap_or(false);
            if only_placeholder && rendered.trim().is_empty() {
                None
            } else {
                Some((key.clone(), rendered))
            }
        })
        .collect()
}
