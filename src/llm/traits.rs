//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Gemini / DeepSeek / Mock）实现 LlmClient：complete（非流式）。
//! 客户端由编排器显式构造并以 `Arc<dyn LlmClient>` 注入各个 Crew，不存在进程级全局单例。

use async_trait::async_trait;

use crate::llm::Message;

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
