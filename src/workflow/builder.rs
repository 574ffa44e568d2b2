//! 计划构建器
//!
//! 启发式路径与兜底路径都通过同一个构建器产出计划：自动分配连续 ordinal 与 output_key，
//! build 时校验工具是否在目录中以及计划不变量。

use crate::tools::{Parameters, ToolDirectory};
use crate::workflow::types::*;

/// 计划构建器
pub struct PlanBuilder {
    source: PlanSource,
    steps: Vec<Step>,
}

impl PlanBuilder {
    pub fn new(source: PlanSource) -> Self {
        Self {
            source,
            steps: Vec::new(),
        }
    }

    /// 追加一个步骤，返回其 ordinal
    pub fn push(&mut self, tool_name: impl Into<String>, parameter_template: Parameters) -> usize {
        let tool_name = tool_name.into();
        let ordinal = self.steps.len() + 1;
        self.steps.push(Step {
            ordinal,
            output_key: output_key_for(ordinal, &tool_name),
            tool_name,
            parameter_template,
            input_from: None,
        });
        ordinal
    }

    /// 添加步骤
    pub fn step(mut self, tool_name: impl Into<String>, parameter_template: Parameters) -> Self {
        self.push(tool_name, parameter_template);
        self
    }

    /// 让 consumer 步骤以 producer 步骤的输出为输入（仅当 producer 更早时生效）
    pub fn connect(&mut self, consumer: usize, producer: usize) -> bool {
        if producer == 0 || producer >= consumer || consumer > self.steps.len() {
            return false;
        }
        let key = self.steps[producer - 1].output_key.clone();
        self.steps[consumer - 1].input_from = Some(key);
        true
    }

    /// 设置顺序依赖
    pub fn depends_on(mut self, consumer: usize, producer: usize) -> Self {
        self.connect(consumer, producer);
        self
    }

    /// 修改已添加步骤的参数模板
    pub fn template_mut(&mut self, ordinal: usize) -> Option<&mut Parameters> {
        ordinal
            .checked_sub(1)
            .and_then(|i| self.steps.get_mut(i))
            .map(|s| &mut s.parameter_template)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// 构建计划
    pub fn build(self, directory: &ToolDirectory) -> Result<WorkflowPlan, PlanValidationError> {
        if let Some(step) = self.steps.iter().find(|s| !directory.contains(&s.tool_name)) {
            return Err(PlanValidationError::UnknownTool(step.tool_name.clone()));
        }
        let plan = WorkflowPlan {
            total_steps: self.steps.len(),
            steps: self.steps,
            source: self.source,
        };
        plan.validate()?;
        Ok(plan)
    }
}

/// 形如 `step_2_claim_drafting`
pub fn output_key_for(ordinal: usize, tool_name: &str) -> String {
    let short = tool_name.strip_suffix("_tool").unwrap_or(tool_name);
    format!("step_{ordinal}_{short}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolSpec;

    fn directory() -> ToolDirectory {
        ToolDirectory::new(vec![
            ToolSpec::new("prior_art_search_tool", ""),
            ToolSpec::new("claim_drafting_tool", ""),
        ])
    }

    #[test]
    fn test_build_assigns_ordinals_and_keys() {
        let plan = PlanBuilder::new(PlanSource::Heuristic)
            .step("prior_art_search_tool", Parameters::new())
            .step("claim_drafting_tool", Parameters::new())
            .depends_on(2, 1)
            .build(&directory())
            .expect("valid plan");

        assert_eq!(plan.total_steps, 2);
        assert_eq!(plan.steps[0].output_key, "step_1_prior_art_search");
        assert_eq!(plan.steps[1].input_from.as_deref(), Some("step_1_prior_art_search"));
    }

    #[test]
    fn test_connect_rejects_forward_wiring() {
        let mut builder = PlanBuilder::new(PlanSource::Heuristic)
            .step("prior_art_search_tool", Parameters::new())
            .step("claim_drafting_tool", Parameters::new());
        assert!(!builder.connect(1, 2));
        assert!(!builder.connect(2, 2));
        assert!(builder.steps().iter().all(|s| s.input_from.is_none()));
    }

    #[test]
    fn test_build_rejects_unknown_tool() {
        let result = PlanBuilder::new(PlanSource::Fallback)
            .step("made_up_tool", Parameters::new())
            .build(&directory());
        assert_eq!(result, Err(PlanValidationError::UnknownTool("made_up_tool".to_string())));
    }
}
