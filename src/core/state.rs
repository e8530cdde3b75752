//! 流程状态：贯穿三个阶段的唯一可变记录
//!
//! 只有编排器在阶段边界之间修改 BookState：
//! - 大纲阶段整体覆盖 `book_outline`（不合并）
//! - 章节阶段在全部并发单元汇合后一次性追加 `book`（并发单元只返回结果，不直接写状态）
//! - 汇总阶段只读

use serde::{Deserialize, Serialize};

use crate::book::{Chapter, ChapterOutline};
use crate::config::BookSection;

/// 成书流程状态
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BookState {
    pub id: String,
    pub title: String,
    pub topic: String,
    pub goal: String,
    /// 章节大纲，顺序决定写作顺序与最终文档顺序
    pub book_outline: Vec<ChapterOutline>,
    /// 已写成的章节，按大纲顺序追加
    pub book: Vec<Chapter>,
}

impl BookState {
    pub fn new(title: impl Into<String>, topic: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            id: "1".to_string(),
            title: title.into(),
            topic: topic.into(),
            goal: goal.into(),
            book_outline: Vec::new(),
            book: Vec::new(),
        }
    }

    pub fn from_config(book: &BookSection) -> Self {
        Self::new(book.title.clone(), book.topic.clone(), book.goal.clone())
    }
}

impl Default for BookState {
    fn default() -> Self {
        Self::from_config(&BookSection::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_empty() {
        let state = BookState::default();
        assert_eq!(state.id, "1");
        assert_eq!(state.title, "The Current State of AI in 2025");
        assert!(state.book_outline.is_empty());
        assert!(state.book.is_empty());
    }
}
