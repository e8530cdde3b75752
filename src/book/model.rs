//! 成书领域记录：章节大纲、书籍大纲、章节

use serde::{Deserialize, Serialize};

/// 章节大纲条目；在列表中的位置决定写作顺序与成书顺序
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterOutline {
    pub title: String,
    pub description: String,
}

impl ChapterOutline {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }

    /// 紧凑 JSON，作为后续章节任务的 `book_outline` 输入
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            serde_json::json!({ "title": self.title, "description": self.description }).to_string()
        })
    }
}

/// 大纲阶段的解码目标；`chapters` 取出后即丢弃
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookOutline {
    pub chapters: Vec<ChapterOutline>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    pub content: String,
}

impl Chapter {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}
