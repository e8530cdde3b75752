//! 错误类型
//!
//! BookError 只用于启动阶段的致命错误（配置、凭据）；流水线运行中的解码 / 章节 / 落盘失败
//! 都在各阶段内部降级处理，不会以错误形式向上传播。

use thiserror::Error;

/// 启动阶段的致命错误：任何阶段运行之前即中止
#[derive(Error, Debug)]
pub enum BookError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    /// 选定的 LLM 后端缺少 API Key
    #[error("Missing credential for provider '{provider}': set {env_var} or llm.api_key")]
    MissingCredential {
        provider: String,
        env_var: &'static str,
    },

    #[error("Unknown LLM provider: {0}")]
    UnknownProvider(String),

    #[error(transparent)]
    Flow(#[from] crate::workflow::FlowError),
}

/// 单次 Crew 调用（研究 → 产出 两步任务）的失败
#[derive(Error, Debug)]
pub enum CrewError {
    #[error("Crew '{0}' has no tasks")]
    EmptyCrew(String),

    #[error("Task '{task}' references missing input '{input}'")]
    MissingInput { task: String, input: String },

    #[error("LLM error in task '{task}': {message}")]
    Llm { task: String, message: String },
}
