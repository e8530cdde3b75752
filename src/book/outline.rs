//! 大纲阶段：研究 → 大纲 Crew 执行一次，解码为有序的章节大纲列表

use std::sync::Arc;

use async_trait::async_trait;

use crate::book::{decode, BookOutline, ChapterOutline};
use crate::core::BookState;
use crate::crew::{CrewInputs, CrewRunner, CrewSpec};
use crate::workflow::{FlowError, FlowStep};

pub struct OutlineStage {
    runner: Arc<dyn CrewRunner>,
    crew: CrewSpec,
}

impl OutlineStage {
    pub fn new(runner: Arc<dyn CrewRunner>, crew: CrewSpec) -> Self {
        Self { runner, crew }
    }

    /// 生成大纲并整体覆盖 `state.book_outline`；任何失败都退化为空列表
    pub async fn generate(&self, state: &mut BookState) -> Vec<ChapterOutline> {
        tracing::info!(crew = %self.crew.name, "Kickoff the book outline crew");
        state.book_outline = Vec::new();

        let inputs = CrewInputs::new()
            .text("topic", state.topic.clone())
            .text("goal", state.goal.clone());

        let outline = match self.runner.kickoff(&self.crew, &inputs).await {
            Ok(raw) => decode::<BookOutline>(raw),
            Err(e) => {
                tracing::warn!("Outline crew failed: {}", e);
                None
            }
        };

        match outline {
            Some(outline) => {
                state.book_outline = outline.chapters;
                tracing::info!(
                    "Chapters outline extracted (count: {})",
                    state.book_outline.len()
                );
                for (i, entry) in state.book_outline.iter().enumerate() {
                    tracing::info!("  {}. {}", i + 1, entry.title);
                }
            }
            None => {
                tracing::warn!("Book outline parsing failed; outline will be empty");
            }
        }

        state.book_outline.clone()
    }
}

#[async_trait]
impl FlowStep<BookState> for OutlineStage {
    async fn run(&self, state: &mut BookState) -> Result<serde_json::Value, FlowError> {
        let outline = self.generate(state).await;
        Ok(serde_json::to_value(outline).unwrap_or_default())
    }
}
