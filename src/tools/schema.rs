//! 兜底规划输出的 JSON Schema（schemars 自动生成）
//!
//! 拼入规划 prompt，减少 LLM 输出格式错误；解析端仍对畸形输出保持容忍。

use schemars::{schema_for, JsonSchema};
use std::collections::HashMap;

/// 兜底规划服务应返回的计划格式
#[allow(dead_code)]
#[derive(JsonSchema)]
struct PlanFormat {
    /// 按执行顺序排列的步骤
    pub steps: Vec<PlanStepFormat>,
}

#[allow(dead_code)]
#[derive(JsonSchema)]
struct PlanStepFormat {
    /// 工具名，必须出现在 Available tools 中
    pub tool: String,
    /// 工具参数；值中可使用 {{user_text}}、{{input}}、{{document}} 占位符
    pub parameters: HashMap<String, String>,
    /// 可选：以哪个更早步骤的输出作为输入（形如 "step_1"，或该步骤的 output_key）
    pub input_from: Option<String>,
}

/// 返回计划格式的 JSON Schema 字符串
pub fn plan_schema_json() -> String {
    let schema = schema_for!(PlanFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
