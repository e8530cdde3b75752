//! 工具：研究步骤在调用 LLM 之前可执行的外部能力（目前只有网页搜索）

pub mod registry;
pub mod search;

pub use registry::{Tool, ToolRegistry};
pub use search::{Fetcher, HttpFetcher, SearchTool};
