//! Bookflow - 基于 LLM 的多阶段成书流水线
//!
//! 模块划分：
//! - **book**: 书籍数据模型、容错解码、大纲 / 章节 / 汇总三个阶段
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、流程状态、成书流程编排
//! - **crew**: Agent / Task 模板与顺序执行的 Crew
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Gemini / DeepSeek / Mock）
//! - **observability**: 日志初始化（可选 OpenTelemetry 导出）
//! - **tools**: 研究步骤可调用的工具（网页搜索）
//! - **workflow**: 通用事件驱动流程引擎（start / listen 触发、Mermaid 画图）

pub mod book;
pub mod config;
pub mod core;
pub mod crew;
pub mod llm;
pub mod observability;
pub mod tools;
pub mod workflow;

pub use crate::core::{BookFlow, BookState};
