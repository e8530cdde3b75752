//! Crew 输入：具名的字符串 / 字符串列表，用于填充任务模板中的 `{name}` 占位符

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::core::CrewError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputValue {
    Text(String),
    List(Vec<String>),
}

impl InputValue {
    fn render(&self) -> String {
        match self {
            InputValue::Text(s) => s.clone(),
            InputValue::List(items) => items.join("\n"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CrewInputs {
    values: BTreeMap<String, InputValue>,
}

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

impl CrewInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.values
            .insert(name.to_string(), InputValue::Text(value.into()));
        self
    }

    pub fn list(mut self, name: &str, items: Vec<String>) -> Self {
        self.values.insert(name.to_string(), InputValue::List(items));
        self
    }

    pub fn get(&self, name: &str) -> Option<&InputValue> {
        self.values.get(name)
    }

    /// 填充模板；`task` 仅用于错误信息。模板引用了未提供的输入时报错
    pub fn interpolate(&self, task: &str, template: &str) -> Result<String, CrewError> {
        let re = PLACEHOLDER_RE
            .get_or_init(|| Regex::new(r"\{([a-z_][a-z0-9_]*)\}").expect("valid placeholder regex"));

        if let Some(missing) = re
            .captures_iter(template)
            .map(|c| c[1].to_string())
            .find(|name| !self.values.contains_key(name))
        {
            return Err(CrewError::MissingInput {
                task: task.to_string(),
                input: missing,
            });
        }

        Ok(re
            .replace_all(template, |c: &regex::Captures| {
                self.values
                    .get(&c[1])
                    .map(InputValue::render)
                    .unwrap_or_default()
            })
            .into_owned())
    }
}
