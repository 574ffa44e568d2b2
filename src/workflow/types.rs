//! 工作流类型定义
//!
//! 意图、步骤、计划、步骤结果以及规划错误。计划一经生成即只读；步骤按 ordinal 全序执行，
//! input_from 只能引用更早步骤的 output_key，因此天然无环。

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::tools::Parameters;

/// 请求意图
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// 普通对话，不调用工具
    Conversation,
    /// 单个工具（建模为一步计划）
    SingleTool,
    /// 多个动作，需要拆解为多步计划
    MultiStep,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Conversation => "conversation",
            Intent::SingleTool => "single_tool",
            Intent::MultiStep => "multi_step",
        }
    }

    /// 解析意图标签，容忍大小写、连字符与常见别名
    pub fn parse_label(label: &str) -> Option<Intent> {
        let normalized = label
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.')
            .to_lowercase()
            .replace(['-', ' '], "_");
        match normalized.as_str() {
            "conversation" | "chat" | "conversational" => Some(Intent::Conversation),
            "single_tool" | "single" | "tool" => Some(Intent::SingleTool),
            "multi_step" | "multi" | "multistep" | "workflow" => Some(Intent::MultiStep),
            _ => None,
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 计划来源（日志与元数据用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    Heuristic,
    Fallback,
}

/// 一次计划好的工具调用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// 从 1 开始连续编号
    pub ordinal: usize,
    pub tool_name: String,
    /// 参数模板，值中可含 {{user_text}} / {{input}} / {{document}} 占位符
    pub parameter_template: Parameters,
    pub output_key: String,
    /// 以哪个更早步骤的 output_key 作为输入
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_from: Option<String>,
}

/// 有序步骤序列
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowPlan {
    pub steps: Vec<Step>,
    pub total_steps: usize,
    pub source: PlanSource,
}

impl WorkflowPlan {
    pub fn empty(source: PlanSource) -> Self {
        Self {
            steps: Vec::new(),
            total_steps: 0,
            source,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn step(&self, ordinal: usize) -> Option<&Step> {
        ordinal.checked_sub(1).and_then(|i| self.steps.get(i))
    }

    pub fn step_by_output_key(&self, key: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.output_key == key)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.tool_name.clone()).collect()
    }

    /// 截断为前 n 步（单工具路径只保留第一步）；被截掉步骤的引用不会残留，因为引用只能指向更早步骤
    pub fn truncated(mut self, n: usize) -> Self {
        self.steps.truncate(n);
        self.total_steps = self.steps.len();
        self
    }

    /// 校验不变量：ordinal 连续、output_key 唯一、input_from 只指向更早步骤
    pub fn validate(&self) -> Result<(), PlanValidationError> {
        if self.total_steps != self.steps.len() {
            return Err(PlanValidationError::StepCountMismatch {
                declared: self.total_steps,
                actual: self.steps.len(),
            });
        }

        let mut seen_keys: HashSet<&str> = HashSet::new();
        for (i, step) in self.steps.iter().enumerate() {
            let expected = i + 1;
            if step.ordinal != expected {
                return Err(PlanValidationError::NonContiguousOrdinal {
                    expected,
                    found: step.ordinal,
                });
            }
            if step.tool_name.trim().is_empty() {
                return Err(PlanValidationError::EmptyToolName(step.ordinal));
            }
            if let Some(source) = &step.input_from {
                if source == &step.output_key {
                    return Err(PlanValidationError::SelfReference(step.ordinal));
                }
                if !seen_keys.contains(source.as_str()) {
                    return Err(PlanValidationError::ForwardReference {
                        ordinal: step.ordinal,
                        input_from: source.clone(),
                    });
                }
            }
            if step.output_key.is_empty() || !seen_keys.insert(step.output_key.as_str()) {
                return Err(PlanValidationError::DuplicateOutputKey(step.output_key.clone()));
            }
        }
        Ok(())
    }
}

/// 单步执行结果；每个 ordinal 只写一次
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub ordinal: usize,
    pub tool_name: String,
    pub success: bool,
    #[serde(default)]
    pub output: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepResult {
    pub fn succeeded(ordinal: usize, tool_name: impl Into<String>, output: Value) -> Self {
        Self {
            ordinal,
            tool_name: tool_name.into(),
            success: true,
            output,
            error: None,
        }
    }

    pub fn failed(ordinal: usize, tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            ordinal,
            tool_name: tool_name.into(),
            success: false,
            output: Value::Null,
            error: Some(error.into()),
        }
    }

    /// 输出转文本：字符串原样；对象优先取 content/text/result/summary 字段；其余序列化为 JSON
    pub fn output_text(&self) -> String {
        value_to_text(&self.output)
    }
}

pub(crate) fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            for key in ["content", "text", "result", "summary"] {
                if let Some(Value::String(s)) = map.get(key) {
                    return s.clone();
                }
            }
            serde_json::to_string_pretty(value).unwrap_or_default()
        }
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    }
}

/// 计划不变量被破坏
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanValidationError {
    #[error("total_steps {declared} does not match {actual} steps")]
    StepCountMismatch { declared: usize, actual: usize },

    #[error("expected ordinal {expected}, found {found}")]
    NonContiguousOrdinal { expected: usize, found: usize },

    #[error("step {0} has an empty tool name")]
    EmptyToolName(usize),

    #[error("step {0} references its own output")]
    SelfReference(usize),

    #[error("step {ordinal} references '{input_from}' which is not an earlier step")]
    ForwardReference { ordinal: usize, input_from: String },

    #[error("duplicate or empty output key '{0}'")]
    DuplicateOutputKey(String),

    #[error("tool '{0}' is not in the tool directory")]
    UnknownTool(String),
}

/// 规划失败：仅当启发式无结果且兜底服务不可达时出现
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanningError {
    #[error("planning service unavailable: {0}")]
    FallbackUnavailable(String),

    #[error("invalid plan: {0}")]
    InvalidPlan(#[from] PlanValidationError),
}
