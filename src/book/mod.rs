//! 成书流水线：数据模型、容错解码与三个阶段（大纲 / 章节 / 汇总）

pub mod chapters;
pub mod decode;
pub mod model;
pub mod outline;
pub mod render;

pub use chapters::{ChapterStage, CHAPTER_ERROR_CONTENT};
pub use decode::{decode, strip_markdown_json, Decode};
pub use model::{BookOutline, Chapter, ChapterOutline};
pub use outline::OutlineStage;
pub use render::{
    render_book, render_chapter, save_book, strip_redundant_title, JoinStage,
    EMPTY_BOOK_PLACEHOLDER, INVALID_CHAPTER_BLOCK,
};
