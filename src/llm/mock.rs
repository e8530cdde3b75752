//! Mock LLM 客户端（用于测试与离线演示，无需 API）
//!
//! 按最后一条 User 消息中的输出格式要求回应：大纲任务返回带 ```json 围栏的大纲，
//! 章节任务回显 `Chapter title:` 行并返回章节 JSON，其余任务返回一段研究笔记。

use async_trait::async_trait;

use crate::llm::{LlmClient, Message, Role};

/// 章节任务模板中标记章节标题的行前缀
pub const CHAPTER_TITLE_PREFIX: &str = "Chapter title:";

/// Mock 客户端
#[derive(Debug, Default)]
pub struct MockLlmClient;

impl MockLlmClient {
    fn outline() -> String {
        let body = serde_json::json!({
            "chapters": [
                {
                    "title": "Foundations",
                    "description": "Where the field stands today and how it got here."
                },
                {
                    "title": "Applications",
                    "description": "How different industries are putting the technology to work."
                },
                {
                    "title": "Outlook",
                    "description": "Open problems and what to expect next."
                }
            ]
        });
        format!("```json\n{}\n```", body)
    }

    fn chapter(prompt: &str) -> String {
        let title = prompt
            .lines()
            .find_map(|l| l.trim().strip_prefix(CHAPTER_TITLE_PREFIX))
            .map(str::trim)
            .unwrap_or("Untitled");
        serde_json::json!({
            "title": title,
            "content": format!("# {}\n\nMock content for the chapter \"{}\".", title, title),
        })
        .to_string()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        if last_user.contains("\"chapters\"") {
            Ok(Self::outline())
        } else if last_user.contains("\"content\"") {
            Ok(Self::chapter(last_user))
        } else {
            Ok(format!(
                "Research notes (mock): {}",
                last_user.lines().next().unwrap_or_default()
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_outline_is_fenced_json() {
        let out = MockLlmClient
            .complete(&[Message::user(r#"Return {"chapters": [...]}"#)])
            .await
            .unwrap();
        assert!(out.starts_with("```json"));
        assert!(out.contains("Foundations"));
    }

    #[tokio::test]
    async fn test_mock_chapter_echoes_title() {
        let prompt = "Write it.\nChapter title: Intro\nReturn {\"title\": .., \"content\": ..}";
        let out = MockLlmClient.complete(&[Message::user(prompt)]).await.unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["title"], "Intro");
    }

    #[tokio::test]
    async fn test_mock_research_is_plain_text() {
        let out = MockLlmClient
            .complete(&[Message::system("sys"), Message::user("Research AI")])
            .await
            .unwrap();
        assert_eq!(out, "Research notes (mock): Research AI");
    }
}
