//! 容错解码器
//!
//! 把形态不定的 RawOutput 规整为严格的领域记录（BookOutline / Chapter），失败返回 None，
//! 任何子步骤的失败都只记日志，不会越过解码器边界。按顺序尝试，首个成功者胜出：
//!
//! 1. Crew 输出已暴露目标字段（`chapters` 列表，或字符串 `title` + `content`）：直接构造；
//!    列表中任一元素不是映射则放弃此路径
//! 2. Crew 输出的原始载荷：字符串则剥离 ``` 围栏后按 JSON 解析；映射则直接构造；其他类型失败
//! 3. 已是目标记录：原样使用
//! 4. 映射：直接构造
//! 5. 字符串：剥离围栏后按 JSON 解析
//! 6. 其他：失败
//!
//! 构造经由 serde 的强类型反序列化完成，字段类型不符（如 `title` 为数字）即视为解码失败。

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::book::{BookOutline, Chapter, ChapterOutline};
use crate::crew::{RawOutput, Record};

const PREVIEW_CHARS: usize = 500;

static FENCE_RE: OnceLock<Regex> = OnceLock::new();

/// 剥离 ```json ... ``` 或 ``` ... ``` 围栏；取第一个（非贪婪）匹配，没有围栏时返回去除首尾空白的原串
pub fn strip_markdown_json(s: &str) -> String {
    let re = FENCE_RE
        .get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("valid fence regex"));
    match re.captures(s).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().trim().to_string(),
        None => s.trim().to_string(),
    }
}

/// 可由容错解码器产出的领域记录
pub trait Decode: DeserializeOwned + Sized {
    const KIND: &'static str;

    /// 策略 1：从已暴露的字段直接构造
    fn from_fields(fields: &Map<String, Value>) -> Option<Self>;

    /// 策略 3：已是强类型记录
    fn from_record(record: Record) -> Option<Self>;
}

impl Decode for BookOutline {
    const KIND: &'static str = "BookOutline";

    fn from_fields(fields: &Map<String, Value>) -> Option<Self> {
        let items = fields.get("chapters")?.as_array()?;
        let mut chapters = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::Object(_) => match serde_json::from_value::<ChapterOutline>(item.clone()) {
                    Ok(ch) => chapters.push(ch),
                    Err(e) => {
                        tracing::warn!("Invalid chapter outline in fields: {}", e);
                        return None;
                    }
                },
                other => {
                    tracing::warn!(
                        "Unexpected item type in chapters: {}",
                        crate::crew::output::truncate(&other.to_string(), 100)
                    );
                    return None;
                }
            }
        }
        Some(BookOutline { chapters })
    }

    fn from_record(record: Record) -> Option<Self> {
        match record {
            Record::Outline(outline) => Some(outline),
            Record::Chapter(_) => None,
        }
    }
}

impl Decode for Chapter {
    const KIND: &'static str = "Chapter";

    fn from_fields(fields: &Map<String, Value>) -> Option<Self> {
        let title = fields.get("title")?.as_str()?;
        let content = fields.get("content")?.as_str()?;
        Some(Chapter::new(title, content))
    }

    fn from_record(record: Record) -> Option<Self> {
        match record {
            Record::Chapter(chapter) => Some(chapter),
            Record::Outline(_) => None,
        }
    }
}

fn from_mapping<T: Decode>(map: Map<String, Value>) -> Option<T> {
    match serde_json::from_value::<T>(Value::Object(map)) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!("Error parsing mapping into {}: {}", T::KIND, e);
            None
        }
    }
}

fn from_text<T: Decode>(text: &str) -> Option<T> {
    let cleaned = strip_markdown_json(text);
    match serde_json::from_str::<T>(&cleaned) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!("Error parsing text as JSON for {}: {}", T::KIND, e);
            tracing::debug!(
                "Cleaned text for {}: {}",
                T::KIND,
                crate::crew::output::truncate(&cleaned, PREVIEW_CHARS)
            );
            None
        }
    }
}

/// 解码 RawOutput；任何形态的失败都返回 None
pub fn decode<T: Decode>(raw: RawOutput) -> Option<T> {
    tracing::debug!(kind = raw.kind(), "Decoding {}: {}", T::KIND, raw.preview(PREVIEW_CHARS));

    match raw {
        RawOutput::Crew(output) => {
            if let Some(record) = T::from_fields(&output.fields) {
                return Some(record);
            }
            match output.raw {
                Some(Value::String(s)) => from_text(&s),
                Some(Value::Object(m)) => from_mapping(m),
                Some(other) => {
                    tracing::warn!(
                        "Crew raw output is not a string or mapping: {}",
                        crate::crew::output::truncate(&other.to_string(), PREVIEW_CHARS)
                    );
                    None
                }
                None => {
                    tracing::warn!("Crew output has no usable fields and no raw payload");
                    None
                }
            }
        }
        RawOutput::Record(record) => {
            let kind = match &record {
                Record::Outline(_) => "BookOutline",
                Record::Chapter(_) => "Chapter",
            };
            let decoded = T::from_record(record);
            if decoded.is_none() {
                tracing::warn!("Expected {} record, got {}", T::KIND, kind);
            }
            decoded
        }
        RawOutput::Mapping(m) => from_mapping(m),
        RawOutput::Text(s) => from_text(&s),
        RawOutput::Unrecognized(v) => {
            tracing::warn!(
                "Unrecognized output type for {}: {}",
                T::KIND,
                crate::crew::output::truncate(&v.to_string(), PREVIEW_CHARS)
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crew::CrewOutput;
    use serde_json::json;

    fn fields(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_strip_fenced_json() {
        assert_eq!(strip_markdown_json("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_markdown_json("```\n{}\n```"), "{}");
        assert_eq!(strip_markdown_json("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_strip_is_idempotent() {
        let once = strip_markdown_json("Here you go:\n```json\n{\"a\": [1, 2]}\n```\nthanks");
        assert_eq!(once, "{\"a\": [1, 2]}");
        assert_eq!(strip_markdown_json(&once), once);
    }

    #[test]
    fn test_strip_takes_first_fence() {
        let s = "```json\n{\"first\":1}\n```\n```json\n{\"second\":2}\n```";
        assert_eq!(strip_markdown_json(s), "{\"first\":1}");
    }

    #[test]
    fn test_crew_fields_outline() {
        let out = CrewOutput {
            fields: fields(json!({"chapters": [{"title": "A", "description": "a"}]})),
            raw: Some(json!("ignored")),
            tasks_output: vec![],
        };
        let outline: BookOutline = decode(out.into()).unwrap();
        assert_eq!(outline.chapters, vec![ChapterOutline::new("A", "a")]);
    }

    #[test]
    fn test_crew_fields_with_bad_item_falls_back_to_raw() {
        let out = CrewOutput {
            fields: fields(json!({"chapters": ["not a mapping"]})),
            raw: Some(json!("```json\n{\"chapters\": [{\"title\": \"B\", \"description\": \"b\"}]}\n```")),
            tasks_output: vec![],
        };
        let outline: BookOutline = decode(out.into()).unwrap();
        assert_eq!(outline.chapters[0].title, "B");
    }

    #[test]
    fn test_crew_fields_chapter() {
        let out = CrewOutput {
            fields: fields(json!({"title": "T", "content": "C"})),
            raw: None,
            tasks_output: vec![],
        };
        assert_eq!(decode::<Chapter>(out.into()), Some(Chapter::new("T", "C")));
    }

    #[test]
    fn test_crew_fields_chapter_wrong_type_then_raw_mapping() {
        let out = CrewOutput {
            fields: fields(json!({"title": 7, "content": "C"})),
            raw: Some(json!({"title": "T", "content": "C"})),
            tasks_output: vec![],
        };
        assert_eq!(decode::<Chapter>(out.into()), Some(Chapter::new("T", "C")));
    }

    #[test]
    fn test_crew_raw_other_type_fails() {
        let out = CrewOutput::from_raw(json!(123));
        assert_eq!(decode::<Chapter>(out.into()), None);
        assert_eq!(decode::<Chapter>(CrewOutput::default().into()), None);
    }

    #[test]
    fn test_crew_raw_malformed_string_fails() {
        let out = CrewOutput::from_raw("```json\n{\"title\": \n```");
        assert_eq!(decode::<Chapter>(out.into()), None);
    }

    #[test]
    fn test_typed_record() {
        let chapter = Chapter::new("T", "C");
        let raw = RawOutput::Record(Record::Chapter(chapter.clone()));
        assert_eq!(decode::<Chapter>(raw), Some(chapter));

        let raw = RawOutput::Record(Record::Chapter(Chapter::new("T", "C")));
        assert_eq!(decode::<BookOutline>(raw), None);
    }

    #[test]
    fn test_bare_mapping() {
        let raw = RawOutput::from(json!({"chapters": []}));
        assert_eq!(decode::<BookOutline>(raw), Some(BookOutline { chapters: vec![] }));

        let raw = RawOutput::from(json!({"chapters": "nope"}));
        assert_eq!(decode::<BookOutline>(raw), None);
    }

    #[test]
    fn test_plain_and_fenced_strings() {
        let raw = RawOutput::Text(r#"{"title": "T", "content": "C"}"#.to_string());
        assert_eq!(decode::<Chapter>(raw), Some(Chapter::new("T", "C")));

        let raw = RawOutput::Text("```\n{\"title\": \"T\", \"content\": \"C\"}\n```".to_string());
        assert_eq!(decode::<Chapter>(raw), Some(Chapter::new("T", "C")));

        let raw = RawOutput::Text("just prose".to_string());
        assert_eq!(decode::<Chapter>(raw), None);
    }

    #[test]
    fn test_unrecognized_fails() {
        assert_eq!(decode::<Chapter>(RawOutput::from(json!(null))), None);
        assert_eq!(decode::<BookOutline>(RawOutput::from(json!([1, 2]))), None);
    }
}
