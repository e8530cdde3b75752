//! 章节阶段：按大纲为每个章节并发执行 研究 → 撰写 Crew，全部完成后按大纲顺序汇合
//!
//! 每个章节单元相互隔离：单元内的任何失败（Crew 报错、解码失败、panic）都只把本章替换为
//! 哨兵章节，不会影响其他单元。单元只返回结果，`state.book` 由本阶段在汇合后一次性追加。

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;

use crate::book::{decode, Chapter, ChapterOutline};
use crate::core::BookState;
use crate::crew::{CrewInputs, CrewRunner, CrewSpec};
use crate::workflow::{FlowError, FlowStep};

/// 章节单元失败时的正文
pub const CHAPTER_ERROR_CONTENT: &str = "⚠️ Error: No content generated or parsed.";

pub struct ChapterStage {
    runner: Arc<dyn CrewRunner>,
    crew: Arc<CrewSpec>,
}

impl ChapterStage {
    pub fn new(runner: Arc<dyn CrewRunner>, crew: CrewSpec) -> Self {
        Self {
            runner,
            crew: Arc::new(crew),
        }
    }

    /// 为每个大纲条目写一章，追加到 `state.book`，返回追加的章节数
    pub async fn write_chapters(&self, state: &mut BookState) -> usize {
        if state.book_outline.is_empty() {
            tracing::info!("No chapter outlines to write chapters for; skipping chapter writing");
            return 0;
        }

        let book_outline: Vec<String> = state.book_outline.iter().map(ChapterOutline::to_json).collect();
        let total = state.book_outline.len();

        let mut titles = Vec::with_capacity(total);
        let mut handles = Vec::with_capacity(total);
        for (i, entry) in state.book_outline.iter().enumerate() {
            tracing::info!("Scheduling chapter {}/{}: '{}'", i + 1, total, entry.title);
            let inputs = CrewInputs::new()
                .text("goal", state.goal.clone())
                .text("topic", state.topic.clone())
                .text("chapter_title", entry.title.clone())
                .text("chapter_description", entry.description.clone())
                .list("book_outline", book_outline.clone());

            titles.push(entry.title.clone());
            handles.push(tokio::spawn(write_single_chapter(
                Arc::clone(&self.runner),
                Arc::clone(&self.crew),
                entry.clone(),
                inputs,
            )));
        }

        // join_all 按提交顺序返回结果，与完成先后无关
        let chapters: Vec<Chapter> = join_all(handles)
            .await
            .into_iter()
            .zip(titles)
            .map(|(joined, title)| match joined {
                Ok(chapter) => chapter,
                Err(e) => {
                    tracing::warn!(chapter = %title, "Chapter unit aborted: {}", e);
                    Chapter::new(title, CHAPTER_ERROR_CONTENT)
                }
            })
            .collect();

        let written = chapters.len();
        state.book.extend(chapters);

        tracing::info!("Final book chapters in state: {}", state.book.len());
        for (i, ch) in state.book.iter().enumerate() {
            tracing::info!("  {}. {}", i + 1, ch.title);
        }
        written
    }
}

/// 单个章节单元：失败时返回以大纲标题为题的哨兵章节
async fn write_single_chapter(
    runner: Arc<dyn CrewRunner>,
    crew: Arc<CrewSpec>,
    outline: ChapterOutline,
    inputs: CrewInputs,
) -> Chapter {
    tracing::info!(chapter = %outline.title, "Requesting chapter crew");

    let raw = match runner.kickoff(&crew, &inputs).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(chapter = %outline.title, "Chapter crew failed: {}", e);
            return Chapter::new(outline.title, CHAPTER_ERROR_CONTENT);
        }
    };

    match decode::<Chapter>(raw) {
        Some(mut chapter) => {
            if chapter.title.trim().is_empty() {
                chapter.title = outline.title.clone();
            }
            tracing::info!(chapter = %outline.title, "Processed chapter: '{}'", chapter.title);
            chapter
        }
        None => {
            tracing::warn!(chapter = %outline.title, "Chapter parsing failed; using default error content");
            Chapter::new(outline.title, CHAPTER_ERROR_CONTENT)
        }
    }
}

#[async_trait]
impl FlowStep<BookState> for ChapterStage {
    async fn run(&self, state: &mut BookState) -> Result<serde_json::Value, FlowError> {
        let written = self.write_chapters(state).await;
        Ok(serde_json::json!(written))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CrewError;
    use crate::crew::{CrewOutput, InputValue, RawOutput};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// 按章节标题决定行为；越靠前的章节完成得越晚，用来打乱完成顺序
    struct ByTitle;

    #[async_trait]
    impl CrewRunner for ByTitle {
        async fn kickoff(&self, _crew: &CrewSpec, inputs: &CrewInputs) -> Result<RawOutput, CrewError> {
            let title = match inputs.get("chapter_title") {
                Some(InputValue::Text(t)) => t.clone(),
                _ => return Err(CrewError::EmptyCrew("no title".into())),
            };
            let delay = match title.as_str() {
                "Ch1" => 60,
                "Ch2" => 30,
                _ => 0,
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            match title.as_str() {
                "panic" => panic!("unit blew up"),
                "error" => Err(CrewError::Llm {
                    task: "write_chapter".into(),
                    message: "backend down".into(),
                }),
                "garbage" => Ok(RawOutput::Text("no json here".into())),
                "untitled" => Ok(CrewOutput::from_raw(r#"{"title": " ", "content": "Body"}"#).into()),
                _ => Ok(CrewOutput::from_raw(format!(
                    "```json\n{}\n```",
                    serde_json::json!({"title": title, "content": format!("Body of {}", title)})
                ))
                .into()),
            }
        }
    }

    fn state_with(titles: &[&str]) -> BookState {
        let mut state = BookState::new("B", "T", "G");
        state.book_outline = titles
            .iter()
            .map(|t| ChapterOutline::new(*t, format!("about {}", t)))
            .collect();
        state
    }

    fn stage() -> ChapterStage {
        ChapterStage::new(Arc::new(ByTitle), CrewSpec::chapter())
    }

    #[tokio::test]
    async fn test_results_keep_outline_order() {
        let mut state = state_with(&["Ch1", "Ch2", "Ch3"]);
        assert_eq!(stage().write_chapters(&mut state).await, 3);

        let titles: Vec<&str> = state.book.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Ch1", "Ch2", "Ch3"]);
        assert_eq!(state.book[0].content, "Body of Ch1");
    }

    #[tokio::test]
    async fn test_failing_units_do_not_affect_siblings() {
        let mut state = state_with(&["Ch1", "panic", "error", "garbage", "Ch3"]);
        stage().write_chapters(&mut state).await;

        assert_eq!(state.book.len(), 5);
        assert_eq!(state.book[0], Chapter::new("Ch1", "Body of Ch1"));
        for (i, title) in [(1, "panic"), (2, "error"), (3, "garbage")] {
            assert_eq!(state.book[i], Chapter::new(title, CHAPTER_ERROR_CONTENT));
        }
        assert_eq!(state.book[4], Chapter::new("Ch3", "Body of Ch3"));
    }

    #[tokio::test]
    async fn test_blank_decoded_title_falls_back_to_outline() {
        let mut state = state_with(&["untitled"]);
        stage().write_chapters(&mut state).await;
        assert_eq!(state.book, vec![Chapter::new("untitled", "Body")]);
    }

    #[tokio::test]
    async fn test_empty_outline_schedules_nothing() {
        let mut state = state_with(&[]);
        let value = stage().run(&mut state).await.unwrap();
        assert_eq!(value, serde_json::json!(0));
        assert!(state.book.is_empty());
    }

    /// 每个单元都在屏障前等待，直到 N 个单元同时在途才放行
    struct Gathering {
        barrier: tokio::sync::Barrier,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl CrewRunner for Gathering {
        async fn kickoff(&self, _crew: &CrewSpec, inputs: &CrewInputs) -> Result<RawOutput, CrewError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.barrier.wait().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let title = match inputs.get("chapter_title") {
                Some(InputValue::Text(t)) => t.clone(),
                _ => String::new(),
            };
            Ok(RawOutput::from(serde_json::json!({"title": title, "content": "Body"})))
        }
    }

    #[tokio::test]
    async fn test_all_units_are_in_flight_together() {
        let titles = ["A", "B", "C", "D", "E", "F"];
        let runner = Arc::new(Gathering {
            barrier: tokio::sync::Barrier::new(titles.len()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let stage = ChapterStage::new(runner.clone(), CrewSpec::chapter());
        let mut state = state_with(&titles);

        // 顺序执行时第一个单元会永远卡在屏障上
        let written = tokio::time::timeout(Duration::from_secs(5), stage.write_chapters(&mut state))
            .await
            .expect("chapter units did not run concurrently");

        assert_eq!(written, titles.len());
        assert_eq!(runner.peak.load(Ordering::SeqCst), titles.len());
        assert_eq!(runner.in_flight.load(Ordering::SeqCst), 0);
        let got: Vec<&str> = state.book.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(got, titles);
    }

    #[tokio::test]
    async fn test_book_is_appended_not_overwritten() {
        let mut state = state_with(&["Ch3"]);
        state.book.push(Chapter::new("Prologue", "Earlier"));
        stage().write_chapters(&mut state).await;
        assert_eq!(state.book.len(), 2);
        assert_eq!(state.book[0].title, "Prologue");
    }
}
