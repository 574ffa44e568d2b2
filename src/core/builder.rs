//! 编排器构建器：按配置组装各组件，依赖显式注入
//!
//! 未注入 LLM 时按配置与 API Key 选择后端；未注入工具后端时，配置了 backend.url 则用 HTTP 后端，
//! 否则为目录中的每个工具注册一个回显工具（演练模式）。

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::error::OrchestratorError;
use crate::core::orchestrator::Orchestrator;
use crate::llm::{create_deepseek_client, LlmClient, MockLlmClient, OpenAiClient};
use crate::tools::{EchoTool, HttpToolBackend, ToolBackend, ToolExecutor, ToolRegistry};
use crate::workflow::{
    ConversationResponder, IntentClassifier, ResponseAggregator, StepExecutor, WorkflowPlanner,
};

/// 根据配置与环境变量选择 LLM 后端（DeepSeek / OpenAI 兼容 / Mock）
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let timeout = cfg.llm.request_timeout_secs;
    if provider == "mock" {
        tracing::info!("Using Mock LLM (configured)");
        return Arc::new(MockLlmClient::new());
    }

    // 有 DeepSeek Key 或（配置为 deepseek 且仅有 OpenAI Key 时也走 DeepSeek 兼容端点）
    let use_deepseek = std::env::var("DEEPSEEK_API_KEY").is_ok()
        || (provider == "deepseek" && std::env::var("OPENAI_API_KEY").is_ok());
    let use_openai = std::env::var("OPENAI_API_KEY").is_ok() && provider != "deepseek";

    if use_deepseek {
        let model = cfg
            .llm
            .deepseek
            .model
            .clone()
            .unwrap_or_else(|| cfg.llm.model.clone());
        tracing::info!("Using DeepSeek LLM ({})", model);
        Arc::new(create_deepseek_client(Some(&model)).with_request_timeout(timeout))
    } else if use_openai {
        let model = cfg
            .llm
            .openai
            .model
            .clone()
            .unwrap_or_else(|| "gpt-4o-mini".to_string());
        let base = cfg.llm.base_url.as_deref();
        tracing::info!("Using OpenAI LLM ({})", model);
        Arc::new(
            OpenAiClient::new(base, &model, std::env::var("OPENAI_API_KEY").ok().as_deref())
                .with_request_timeout(timeout),
        )
    } else {
        tracing::warn!("No API key set or provider unknown, using Mock LLM");
        Arc::new(MockLlmClient::new())
    }
}

/// 编排器构建器
pub struct OrchestratorBuilder {
    config: AppConfig,
    llm: Option<Arc<dyn LlmClient>>,
    backend: Option<Arc<dyn ToolBackend>>,
}

impl OrchestratorBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            llm: None,
            backend: None,
        }
    }

    /// 注入文本生成服务（测试中为脚本化的 MockLlmClient）
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// 注入工具后端
    pub fn with_backend(mut self, backend: Arc<dyn ToolBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn build_backend(&self) -> Result<Arc<dyn ToolBackend>, OrchestratorError> {
        if let Some(backend) = &self.backend {
            return Ok(Arc::clone(backend));
        }
        if let Some(url) = &self.config.backend.url {
            tracing::info!(url = %url, "Using HTTP tool backend");
            let backend = HttpToolBackend::new(url, self.config.backend.timeout_secs)
                .map_err(|e| OrchestratorError::Config(e.to_string()))?;
            return Ok(Arc::new(backend));
        }

        tracing::warn!("No tool backend configured, registering dry-run echo tools");
        let mut registry = ToolRegistry::new();
        for spec in &self.config.tools.directory {
            registry.register(EchoTool::new(&spec.name, &spec.description));
        }
        Ok(Arc::new(registry))
    }

    pub fn build(self) -> Result<Orchestrator, OrchestratorError> {
        let cfg = &self.config;
        let llm = self
            .llm
            .clone()
            .unwrap_or_else(|| create_llm_from_config(cfg));
        let backend = self.build_backend()?;

        // 关闭兜底时，意图与规划只走启发式
        let fallback = cfg.orchestrator.llm_fallback.then(|| Arc::clone(&llm));
        let turns = cfg.app.max_context_turns;

        Ok(Orchestrator::new(
            IntentClassifier::new(fallback.clone()),
            WorkflowPlanner::new(fallback, turns),
            StepExecutor::new(ToolExecutor::new(backend, cfg.orchestrator.step_timeout_secs)),
            ResponseAggregator::new(cfg.orchestrator.max_section_chars),
            ConversationResponder::new(Some(llm), cfg.orchestrator.greeting_fast_path, turns),
        ))
    }
}

/// 便捷函数：加载配置（失败时用默认值）并创建构建器
pub fn create_orchestrator_builder(config_path: Option<PathBuf>) -> OrchestratorBuilder {
    let config = crate::config::load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    OrchestratorBuilder::new(config)
}
