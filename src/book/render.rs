//! 汇总阶段：按顺序拼接各章节为一份 Markdown 文档并落盘
//!
//! 模型常在正文开头重复章节标题（如 `# Intro`），若与章节标题在忽略大小写与空白后相同则去掉，
//! 避免成书中出现两次标题。

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::book::Chapter;
use crate::core::BookState;
use crate::workflow::{FlowError, FlowStep};

/// 没有任何有效章节时的成书内容
pub const EMPTY_BOOK_PLACEHOLDER: &str = "# ⚠️ Book is empty\n\nNo valid chapters were generated.";

/// 无效章节（标题为空）在成书中的占位块
pub const INVALID_CHAPTER_BLOCK: &str =
    "\n\n# ⚠️ Invalid Chapter Object\n\nThis entry was not a valid Chapter object.\n\n";

static HEADER_RE: OnceLock<Regex> = OnceLock::new();

fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// 去掉正文开头与标题重复的 Markdown 标题段（到第一个空行为止）
pub fn strip_redundant_title<'a>(title: &str, content: &'a str) -> &'a str {
    let re = HEADER_RE.get_or_init(|| {
        Regex::new(r"(?s)^\s*#+\s*(.+?)\s*(\r\n\r\n|\n\n|\r\r)").expect("valid header regex")
    });
    match re.captures(content) {
        Some(caps) if normalize(&caps[1]) == normalize(title) => {
            tracing::debug!("Cleaned redundant title '{}' from chapter content", caps[1].trim());
            &content[caps[0].len()..]
        }
        _ => content,
    }
}

/// 渲染单个章节块：`# {title}\n\n{content}\n\n`
pub fn render_chapter(chapter: &Chapter) -> String {
    if chapter.title.trim().is_empty() {
        tracing::warn!("Skipping invalid chapter without title during save");
        return INVALID_CHAPTER_BLOCK.to_string();
    }
    let cleaned = strip_redundant_title(&chapter.title, &chapter.content);
    format!("# {}\n\n{}\n\n", chapter.title, cleaned.trim())
}

/// 拼接全书；空白结果替换为占位文本
pub fn render_book(chapters: &[Chapter]) -> String {
    let book: String = chapters.iter().map(render_chapter).collect();
    match book.trim() {
        "" => EMPTY_BOOK_PLACEHOLDER.to_string(),
        text => text.to_string(),
    }
}

/// 写入成书文件（UTF-8，覆盖写，目录不存在则创建）
pub async fn save_book(path: &Path, text: &str) -> std::io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(path, text).await
}

pub struct JoinStage {
    output_path: PathBuf,
}

impl JoinStage {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }

    /// 渲染并保存；写入失败只记日志，仍返回内存中的成书内容
    pub async fn join_and_save(&self, state: &BookState) -> String {
        tracing::info!("Joining and saving {} book chapters", state.book.len());
        if state.book.is_empty() {
            tracing::warn!("No chapters found in the book state; saving placeholder content");
        }

        let text = render_book(&state.book);
        match save_book(&self.output_path, &text).await {
            Ok(()) => tracing::info!("Book saved as {}", self.output_path.display()),
            Err(e) => tracing::error!("Failed to save book to {}: {}", self.output_path.display(), e),
        }
        text
    }
}

#[async_trait]
impl FlowStep<BookState> for JoinStage {
    async fn run(&self, state: &mut BookState) -> Result<serde_json::Value, FlowError> {
        Ok(serde_json::Value::String(self.join_and_save(state).await))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redundant_heading_is_removed() {
        let ch = Chapter::new("Intro", "# Intro\n\nBody text.");
        assert_eq!(render_chapter(&ch), "# Intro\n\nBody text.\n\n");
    }

    #[test]
    fn test_heading_match_ignores_case_and_spacing() {
        let content = "  ##   the   BIG\tintro \r\n\r\nBody.";
        assert_eq!(strip_redundant_title("The Big Intro", content), "Body.");
    }

    #[test]
    fn test_content_without_heading_is_untouched() {
        let ch = Chapter::new("Intro", "Body text.");
        assert_eq!(render_chapter(&ch), "# Intro\n\nBody text.\n\n");
    }

    #[test]
    fn test_different_heading_is_kept() {
        let ch = Chapter::new("Intro", "# Background\n\nBody.");
        assert_eq!(render_chapter(&ch), "# Intro\n\n# Background\n\nBody.\n\n");
    }

    #[test]
    fn test_heading_without_blank_line_is_kept() {
        assert_eq!(strip_redundant_title("Intro", "# Intro\nBody."), "# Intro\nBody.");
    }

    #[test]
    fn test_blank_title_renders_invalid_block() {
        let ch = Chapter::new("  ", "Body.");
        assert_eq!(render_chapter(&ch), INVALID_CHAPTER_BLOCK);
    }

    #[test]
    fn test_render_book_in_order() {
        let book = render_book(&[Chapter::new("A", "one"), Chapter::new("B", "# B\n\ntwo")]);
        assert_eq!(book, "# A\n\none\n\n# B\n\ntwo");
    }

    #[test]
    fn test_empty_book_placeholder() {
        assert_eq!(render_book(&[]), EMPTY_BOOK_PLACEHOLDER);
    }

    #[tokio::test]
    async fn test_join_writes_file_and_creates_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output").join("book.md");
        let stage = JoinStage::new(&path);
        let mut state = BookState::new("B", "T", "G");
        state.book.push(Chapter::new("Intro", "# Intro\n\nBody text."));

        let text = stage.join_and_save(&state).await;
        assert_eq!(text, "# Intro\n\nBody text.");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), text);
    }

    #[tokio::test]
    async fn test_write_failure_still_returns_text() {
        let dir = tempfile::tempdir().unwrap();
        // 目标路径是一个已存在的目录，写入必然失败
        let stage = JoinStage::new(dir.path());
        let state = BookState::new("B", "T", "G");
        let value = stage.run(&mut state.clone()).await.unwrap();
        assert_eq!(value, serde_json::json!(EMPTY_BOOK_PLACEHOLDER));
    }
}
