//! 工具目录（Tool Directory）
//!
//! 调用方随每个请求提供的「工具名 → 简短描述」有序列表，请求期内只读。
//! 顺序有意义：打分平局时按目录顺序决出，保证规划结果确定。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// 目录中的单个工具
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// 不可变、可廉价克隆的工具目录
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolDirectory {
    tools: Arc<Vec<ToolSpec>>,
}

impl ToolDirectory {
    /// 构建目录；同名工具只保留第一次出现，空名称被忽略
    pub fn new(specs: impl IntoIterator<Item = ToolSpec>) -> Self {
        let mut tools: Vec<ToolSpec> = Vec::new();
        for spec in specs {
            let name = spec.name.trim();
            if name.is_empty() {
                continue;
            }
            if tools.iter().any(|t| t.name == name) {
                tracing::warn!(tool = %name, "duplicate tool in directory ignored");
                continue;
            }
            tools.push(ToolSpec::new(name, spec.description.trim()));
        }
        Self {
            tools: Arc::new(tools),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.iter()
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// 工具在目录中的位置（平局决胜用）
    pub fn position(&self, name: &str) -> Option<usize> {
        self.tools.iter().position(|t| t.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 生成 prompt 中的 Available tools 段落
    pub fn render_for_prompt(&self) -> String {
        self.tools
            .iter()
            .map(|t| format!("- {}: {}", t.name, t.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl FromIterator<ToolSpec> for ToolDirectory {
    fn from_iter<T: IntoIterator<Item = ToolSpec>>(iter: T) -> Self {
        Self::new(iter)
    }
}
