//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `CLAIMFLOW__*` 覆盖（双下划线表示嵌套，如 `CLAIMFLOW__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::tools::{ToolDirectory, ToolSpec};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub orchestrator: OrchestratorSection,
    pub backend: BackendSection,
    pub tools: ToolsSection,
}

/// [app] 段：应用名、送入兜底服务的对话轮数
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub name: Option<String>,
    #[serde(default = "default_max_context_turns")]
    pub max_context_turns: usize,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            max_context_turns: default_max_context_turns(),
        }
    }
}

fn default_max_context_turns() -> usize {
    10
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：deepseek / openai / mock；优先级由 API Key 与 provider 共同决定
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub deepseek: LlmModelOverride,
    #[serde(default)]
    pub openai: LlmModelOverride,
    /// 单次请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            deepseek: LlmModelOverride::default(),
            openai: LlmModelOverride::default(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_provider() -> String {
    "deepseek".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmModelOverride {
    pub model: Option<String>,
}

/// [orchestrator] 段
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorSection {
    /// 单步工具调用超时（秒）
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,
    /// 聚合回复中单段的最大字符数
    #[serde(default = "default_max_section_chars")]
    pub max_section_chars: usize,
    /// 启发式无法定论时是否询问文本生成服务
    #[serde(default = "default_true")]
    pub llm_fallback: bool,
    /// 简单问候直接给出固定回复
    #[serde(default = "default_true")]
    pub greeting_fast_path: bool,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            step_timeout_secs: default_step_timeout_secs(),
            max_section_chars: default_max_section_chars(),
            llm_fallback: true,
            greeting_fast_path: true,
        }
    }
}

fn default_step_timeout_secs() -> u64 {
    60
}

fn default_max_section_chars() -> usize {
    8000
}

fn default_true() -> bool {
    true
}

/// [backend] 段：HTTP 工具后端（未设置 url 时命令行使用进程内回显工具）
#[derive(Debug, Clone, Deserialize)]
pub struct BackendSection {
    pub url: Option<String>,
    #[serde(default = "default_backend_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_backend_timeout_secs(),
        }
    }
}

fn default_backend_timeout_secs() -> u64 {
    90
}

/// [tools] 段：命令行默认使用的工具目录
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ToolsSection {
    #[serde(default)]
    pub directory: Vec<ToolSpec>,
}

impl ToolsSection {
    pub fn tool_directory(&self) -> ToolDirectory {
        ToolDirectory::new(self.directory.iter().cloned())
    }
}

/// 从 config 目录加载配置，环境变量 CLAIMFLOW__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 CLAIMFLOW__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        } else {
            tracing::warn!(path = %path.display(), "config file not found, ignoring");
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("CLAIMFLOW")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.app.max_context_turns, 10);
        assert_eq!(cfg.orchestrator.step_timeout_secs, 60);
        assert_eq!(cfg.orchestrator.max_section_chars, 8000);
        assert!(cfg.orchestrator.llm_fallback);
        assert!(cfg.orchestrator.greeting_fast_path);
        assert!(cfg.backend.url.is_none());
    }

    #[test]
    fn test_explicit_file_overrides_and_directory() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[orchestrator]
step_timeout_secs = 7
greeting_fast_path = false

[backend]
url = "http://127.0.0.1:9000"

[[tools.directory]]
name = "alpha_tool"
description = "First"

[[tools.directory]]
name = "beta_tool"
"#
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.orchestrator.step_timeout_secs, 7);
        assert!(!cfg.orchestrator.greeting_fast_path);
        assert_eq!(cfg.backend.url.as_deref(), Some("http://127.0.0.1:9000"));

        // 显式文件的 [[tools.directory]] 整体替换 config/default.toml 中的数组
        let names = cfg.tools.tool_directory().names();
        assert_eq!(names, ["alpha_tool", "beta_tool"]);
    }

    #[test]
    fn test_missing_explicit_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(Some(dir.path().join("absent.toml"))).unwrap();
        assert!(cfg.orchestrator.step_timeout_secs > 0);
    }
}
