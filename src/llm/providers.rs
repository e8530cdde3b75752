//! 预置后端（均为 OpenAI 兼容格式）
//!
//! - Gemini: https://generativelanguage.googleapis.com/v1beta/openai/
//!   - 模型: gemini-2.0-flash
//! - DeepSeek: https://api.deepseek.com
//!   - 模型: deepseek-chat (常规对话), deepseek-reasoner (思考模式)

use crate::llm::OpenAiClient;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/";
pub const GEMINI_FLASH: &str = "gemini-2.0-flash";

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";

/// 创建 Gemini 客户端（api_key 由调用方解析，缺失时应在启动阶段报错）
pub fn create_gemini_client(model: Option<&str>, api_key: &str) -> OpenAiClient {
    let model = model.unwrap_or(GEMINI_FLASH);
    OpenAiClient::new(Some(GEMINI_BASE_URL), model, api_key)
}

/// 创建 DeepSeek 客户端
pub fn create_deepseek_client(model: Option<&str>, api_key: &str) -> OpenAiClient {
    let model = model.unwrap_or(DEEPSEEK_CHAT);
    OpenAiClient::new(Some(DEEPSEEK_BASE_URL), model, api_key)
}
