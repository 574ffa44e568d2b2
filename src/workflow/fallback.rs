//! 兜底规划服务：prompt 组装与回复解析
//!
//! 回复是自由文本，可能是 ```json 代码块、裸 JSON，或 `TOOL: / INTENT: / PARAMETERS:` 行格式。
//! 解析尽力而为：任何畸形输出都退化为默认值（意图 None、空步骤列表），从不报错。

use serde_json::Value;

use crate::memory::{ConversationWindow, Message};
use crate::tools::{plan_schema_json, Parameters, ToolDirectory};
use crate::workflow::types::Intent;

const INTENT_SYSTEM_PROMPT: &str = r#"You are an intent classifier for a patent assistant.
Decide whether the user's request is:
- conversation: small talk or a question that needs no tool
- single_tool: exactly one action that one tool can perform
- multi_step: several actions that need different tools in sequence

Answer with a single line in the form `INTENT: <label>` and nothing else."#;

const PLAN_SYSTEM_PROMPT: &str = r#"You are a workflow planner. Break the user's request into an ordered list of tool calls.
Use ONLY tools from the Available tools list. Keep the order in which the user mentions the actions.
Return ONLY a JSON object that matches the schema below, with no commentary.
Parameter values may use the placeholders {{user_text}}, {{input}} and {{document}}.
Set input_from to "step_N" when a step needs the output of earlier step N."#;

/// 兜底服务给出的原始步骤（尚未校验）
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawStep {
    pub tool: String,
    pub parameters: Parameters,
    pub input_from: Option<String>,
}

/// 意图分类 prompt
pub fn intent_messages(text: &str, directory: &ToolDirectory) -> Vec<Message> {
    vec![
        Message::system(INTENT_SYSTEM_PROMPT),
        Message::user(format!(
            "Available tools:\n{}\n\nUser request: {}",
            directory.render_for_prompt(),
            text
        )),
    ]
}

/// 规划 prompt：工具列表 + 计划 schema + 最近对话 + 请求
pub fn plan_messages(
    text: &str,
    directory: &ToolDirectory,
    prior_context: ConversationWindow<'_>,
) -> Vec<Message> {
    let mut user = format!("Available tools:\n{}\n\n", directory.render_for_prompt());
    if !prior_context.is_empty() {
        user.push_str("Recent conversation:\n");
        user.push_str(&prior_context.render());
        user.push_str("\n\n");
    }
    user.push_str("User request: ");
    user.push_str(text);

    vec![
        Message::system(format!("{}\n\nSchema:\n{}", PLAN_SYSTEM_PROMPT, plan_schema_json())),
        Message::user(user),
    ]
}

/// 从回复中解析意图标签
pub fn parse_intent_answer(answer: &str) -> Option<Intent> {
    let trimmed = answer.trim();
    if trimmed.is_empty() {
        return None;
    }

    for line in trimmed.lines() {
        if let Some(label) = strip_label(line, "intent") {
            if let Some(intent) = Intent::parse_label(label) {
                return Some(intent);
            }
        }
    }

    if let Some(Value::Object(map)) = extract_json(trimmed) {
        if let Some(intent) = map
            .get("intent")
            .and_then(Value::as_str)
            .and_then(Intent::parse_label)
        {
            return Some(intent);
        }
    }

    Intent::parse_label(trimmed).or_else(|| {
        trimmed
            .split_whitespace()
            .next()
            .and_then(Intent::parse_label)
    })
}

/// 从回复中解析步骤列表；只保留目录中存在的工具
pub fn parse_plan_answer(answer: &str, directory: &ToolDirectory) -> Vec<RawStep> {
    // 行格式中的 PARAMETERS 本身是 JSON 对象，JSON 路径无结果时再按行解析
    let mut steps = extract_json(answer)
        .map(|value| steps_from_json(&value))
        .unwrap_or_default();
    if steps.is_empty() {
        steps = steps_from_lines(answer);
    }

    steps
        .into_iter()
        .filter(|s| {
            let known = directory.contains(&s.tool);
            if !known {
                tracing::warn!(tool = %s.tool, "planning service proposed a tool outside the directory");
            }
            known
        })
        .collect()
}

/// 提取 JSON：优先 ```json 代码块，其次第一个 { / [ 到最后一个 } / ]
fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();

    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        let body = rest.find("```").map(|end| &rest[..end]).unwrap_or(rest);
        if let Ok(v) = serde_json::from_str(body.trim()) {
            return Some(v);
        }
    }

    let candidates = [('{', '}'), ('[', ']')];
    let mut best: Option<(usize, Value)> = None;
    for (open, close) in candidates {
        if let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close)) {
            if start < end {
                if let Ok(v) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                    if best.as_ref().map(|(s, _)| start < *s).unwrap_or(true) {
                        best = Some((start, v));
                    }
                }
            }
        }
    }
    best.map(|(_, v)| v)
}

fn steps_from_json(value: &Value) -> Vec<RawStep> {
    match value {
        Value::Array(items) => items.iter().filter_map(step_from_json).collect(),
        Value::Object(map) => {
            if let Some(Value::Array(items)) = map.get("steps").or_else(|| map.get("plan")) {
                items.iter().filter_map(step_from_json).collect()
            } else {
                step_from_json(value).into_iter().collect()
            }
        }
        _ => Vec::new(),
    }
}

fn step_from_json(value: &Value) -> Option<RawStep> {
    let map = value.as_object()?;
    let tool = ["tool", "tool_name", "name"]
        .iter()
        .find_map(|k| map.get(*k).and_then(Value::as_str))?
        .trim()
        .to_string();
    if tool.is_empty() {
        return None;
    }

    let parameters = ["parameters", "params", "args"]
        .iter()
        .find_map(|k| map.get(*k).and_then(Value::as_object))
        .map(|obj| {
            obj.iter()
                .map(|(k, v)| (k.clone(), json_scalar_to_string(v)))
                .collect()
        })
        .unwrap_or_default();

    let input_from = ["input_from", "depends_on"]
        .iter()
        .find_map(|k| map.get(*k))
        .and_then(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

    Some(RawStep {
        tool,
        parameters,
        input_from,
    })
}

fn json_scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// `TOOL:` 开启新步骤；`PARAMETERS:` 接 JSON 对象或 `k=v; k2=v2`；`INPUT_FROM:` 可选
fn steps_from_lines(text: &str) -> Vec<RawStep> {
    let mut steps: Vec<RawStep> = Vec::new();
    for line in text.lines() {
        if let Some(tool) = strip_label(line, "tool") {
            let tool = tool.trim_matches(|c: char| c == '`' || c == '"' || c == '\'');
            if !tool.is_empty() {
                steps.push(RawStep {
                    tool: tool.to_string(),
                    ..RawStep::default()
                });
            }
        } else if let Some(params) = strip_label(line, "parameters") {
            if let Some(step) = steps.last_mut() {
                step.parameters = parse_inline_parameters(params);
            }
        } else if let Some(source) = strip_label(line, "input_from") {
            if let Some(step) = steps.last_mut() {
                if !source.is_empty() {
                    step.input_from = Some(source.to_string());
                }
            }
        }
    }
    steps
}

fn parse_inline_parameters(raw: &str) -> Parameters {
    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(raw) {
        return obj
            .iter()
            .map(|(k, v)| (k.clone(), json_scalar_to_string(v)))
            .collect();
    }
    raw.split(';')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=').or_else(|| pair.split_once(':'))?;
            let k = k.trim();
            (!k.is_empty()).then(|| (k.to_string(), v.trim().to_string()))
        })
        .collect()
}

/// 匹配 `LABEL: value`（不区分大小写，容忍前导 `-`/`*` 与空白）
fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let line = line.trim().trim_start_matches(['-', '*']).trim();
    let (head, rest) = line.split_once(':')?;
    head.trim()
        .eq_ignore_ascii_case(label)
        .then(|| rest.trim())
}
