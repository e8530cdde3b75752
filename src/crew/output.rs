//! Crew 的原始输出
//!
//! 上游生成结果的形态不固定，这里用 RawOutput 标签联合显式列出所有可能：
//! Crew 结构体（字段 + 原始文本）、已是领域记录、映射、文本（可能带 ``` 围栏）、无法识别。

use serde_json::{Map, Value};

use crate::book::{BookOutline, Chapter};

/// 顺序 Crew 的执行结果
#[derive(Debug, Clone, Default)]
pub struct CrewOutput {
    /// 结构化任务解析出的字段，如 `chapters` 或 `title` + `content`
    pub fields: Map<String, Value>,
    /// 最后一步的原始输出，通常是字符串，也可能是映射
    pub raw: Option<Value>,
    /// 每一步的文本输出（按执行顺序）
    pub tasks_output: Vec<String>,
}

impl CrewOutput {
    /// 只有原始文本、没有字段的输出
    pub fn from_raw(raw: impl Into<Value>) -> Self {
        Self {
            raw: Some(raw.into()),
            ..Self::default()
        }
    }
}

/// 已经是强类型的领域记录
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Outline(BookOutline),
    Chapter(Chapter),
}

#[derive(Debug, Clone)]
pub enum RawOutput {
    Crew(CrewOutput),
    Record(Record),
    Mapping(Map<String, Value>),
    Text(String),
    Unrecognized(Value),
}

impl RawOutput {
    pub fn kind(&self) -> &'static str {
        match self {
            RawOutput::Crew(_) => "crew",
            RawOutput::Record(Record::Outline(_)) => "outline",
            RawOutput::Record(Record::Chapter(_)) => "chapter",
            RawOutput::Mapping(_) => "mapping",
            RawOutput::Text(_) => "text",
            RawOutput::Unrecognized(_) => "unrecognized",
        }
    }

    /// 日志用的截断预览
    pub fn preview(&self, max_chars: usize) -> String {
        let full = match self {
            RawOutput::Crew(c) => match &c.raw {
                Some(Value::String(s)) => s.clone(),
                Some(v) => v.to_string(),
                None => Value::Object(c.fields.clone()).to_string(),
            },
            RawOutput::Record(r) => format!("{:?}", r),
            RawOutput::Mapping(m) => Value::Object(m.clone()).to_string(),
            RawOutput::Text(s) => s.clone(),
            RawOutput::Unrecognized(v) => v.to_string(),
        };
        truncate(&full, max_chars)
    }
}

impl From<Value> for RawOutput {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(m) => RawOutput::Mapping(m),
            Value::String(s) => RawOutput::Text(s),
            other => RawOutput::Unrecognized(other),
        }
    }
}

impl From<CrewOutput> for RawOutput {
    fn from(output: CrewOutput) -> Self {
        RawOutput::Crew(output)
    }
}

pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
