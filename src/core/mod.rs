//! 核心层：错误类型、流程状态与成书流程编排

pub mod error;
pub mod orchestrator;
pub mod state;

pub use error::{BookError, CrewError};
pub use orchestrator::{create_llm_from_config, create_tools_from_config, BookFlow};
pub use state::BookState;
