//! claimflow - 多步骤工作流编排引擎
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 请求状态、编排器与构建器
//! - **llm**: 文本生成服务抽象与实现（OpenAI 兼容 / DeepSeek / Mock），用于意图与规划兜底、对话回复
//! - **memory**: 对话消息与上下文窗口
//! - **observability**: 日志订阅者初始化
//! - **tools**: 工具目录、静态工具画像、工具后端（进程内 / HTTP）与执行器
//! - **workflow**: 子句切分、意图识别、规划、逐步执行、聚合与进度事件

pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod tools;
pub mod workflow;
