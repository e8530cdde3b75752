//! Crew 执行器
//!
//! CrewRunner 是流水线与生成引擎之间的唯一接缝：给定 Crew 定义与输入，返回形态不定的 RawOutput。
//! LlmCrewRunner 顺序执行每一步：Agent 描述拼成 system prompt，任务模板填充后作为 user prompt，
//! 上一步输出作为下一步上下文；结构化任务的最终输出会尽量解析为字段。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::book::strip_markdown_json;
use crate::core::CrewError;
use crate::crew::{
    AgentSpec, CrewInputs, CrewOutput, CrewSpec, CrewStep, OutputFormat, RawOutput, TaskSpec,
};
use crate::llm::{LlmClient, Message};
use crate::tools::ToolRegistry;

#[async_trait]
pub trait CrewRunner: Send + Sync {
    async fn kickoff(&self, crew: &CrewSpec, inputs: &CrewInputs) -> Result<RawOutput, CrewError>;
}

/// 基于 LlmClient 的顺序 Crew 执行器；LLM 客户端由调用方构造并注入
pub struct LlmCrewRunner {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
}

impl LlmCrewRunner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            tools: ToolRegistry::new(),
        }
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// 累计 token 用量，由编排器在运行结束时汇报
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    /// 执行 Agent 声明的工具；工具失败只记日志，研究步骤照常交给 LLM
    async fn tool_results(&self, step: &CrewStep, inputs: &CrewInputs) -> Result<Option<String>, CrewError> {
        let Some(template) = &step.task.search_query else {
            return Ok(None);
        };
        if step.agent.tools.is_empty() || self.tools.is_empty() {
            return Ok(None);
        }
        let query = inputs.interpolate(&step.task.name, template)?;

        let mut sections = Vec::new();
        for name in &step.agent.tools {
            let Some(tool) = self.tools.get(name) else {
                tracing::debug!(task = %step.task.name, tool = %name, "Tool not registered, skipping");
                continue;
            };
            match tool.execute(serde_json::json!({ "query": query })).await {
                Ok(out) => sections.push(format!("[{}] {}\n{}", name, query, out)),
                Err(e) => tracing::warn!(task = %step.task.name, tool = %name, "Tool failed: {}", e),
            }
        }
        Ok((!sections.is_empty()).then(|| sections.join("\n\n")))
    }

    fn system_prompt(agent: &AgentSpec, task: &str, inputs: &CrewInputs) -> Result<String, CrewError> {
        Ok(format!(
            "You are {}. {}\nYour personal goal is: {}",
            inputs.interpolate(task, &agent.role)?,
            inputs.interpolate(task, &agent.backstory)?,
            inputs.interpolate(task, &agent.goal)?,
        ))
    }

    fn task_prompt(
        task: &TaskSpec,
        inputs: &CrewInputs,
        context: Option<&str>,
        tool_results: Option<&str>,
    ) -> Result<String, CrewError> {
        let mut prompt = format!(
            "{}\n\nThis is the expected criteria for your final answer: {}",
            inputs.interpolate(&task.name, &task.description)?,
            inputs.interpolate(&task.name, &task.expected_output)?,
        );
        if let Some(ctx) = context {
            prompt.push_str("\n\nThis is the context you're working with:\n");
            prompt.push_str(ctx);
        }
        if let Some(found) = tool_results {
            prompt.push_str("\n\nTool results:\n");
            prompt.push_str(found);
        }
        if let Some(fmt) = task.output.instructions() {
            prompt.push_str("\n\n");
            prompt.push_str(fmt);
        }
        Ok(prompt)
    }

    /// 结构化任务：剥离围栏后能解析为 JSON 对象时，作为字段暴露
    fn parse_fields(format: OutputFormat, raw: &str) -> serde_json::Map<String, Value> {
        if format == OutputFormat::Text {
            return serde_json::Map::new();
        }
        match serde_json::from_str::<Value>(&strip_markdown_json(raw)) {
            Ok(Value::Object(fields)) => fields,
            Ok(_) => serde_json::Map::new(),
            Err(e) => {
                tracing::debug!("Structured output is not valid JSON, keeping raw only: {}", e);
                serde_json::Map::new()
            }
        }
    }
}

#[async_trait]
impl CrewRunner for LlmCrewRunner {
    async fn kickoff(&self, crew: &CrewSpec, inputs: &CrewInputs) -> Result<RawOutput, CrewError> {
        if crew.steps.is_empty() {
            return Err(CrewError::EmptyCrew(crew.name.clone()));
        }

        let mut tasks_output: Vec<String> = Vec::with_capacity(crew.steps.len());
        for step in &crew.steps {
            let tool_results = self.tool_results(step, inputs).await?;
            let messages = [
                Message::system(Self::system_prompt(&step.agent, &step.task.name, inputs)?),
                Message::user(Self::task_prompt(
                    &step.task,
                    inputs,
                    tasks_output.last().map(String::as_str),
                    tool_results.as_deref(),
                )?),
            ];
            tracing::debug!(crew = %crew.name, task = %step.task.name, "Running task");
            let out = self
                .llm
                .complete(&messages)
                .await
                .map_err(|message| CrewError::Llm {
                    task: step.task.name.clone(),
                    message,
                })?;
            tasks_output.push(out);
        }

        let raw = tasks_output.last().cloned().unwrap_or_default();
        Ok(RawOutput::Crew(CrewOutput {
            fields: Self::parse_fields(crew.output_format(), &raw),
            raw: Some(Value::String(raw)),
            tasks_output,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use std::sync::Mutex;

    /// 记录收到的 prompt，并按顺序返回预设回复
    struct ScriptedLlm {
        replies: Mutex<Vec<String>>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, messages: &[Message]) -> Result<String, String> {
            self.seen
                .lock()
                .unwrap()
                .push(messages.last().unwrap().content.clone());
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                Err("no more replies".to_string())
            } else {
                Ok(replies.remove(0))
            }
        }
    }

    fn inputs() -> CrewInputs {
        CrewInputs::new().text("topic", "Rust").text("goal", "Teach")
    }

    #[tokio::test]
    async fn test_previous_output_becomes_context() {
        let llm = Arc::new(ScriptedLlm {
            replies: Mutex::new(vec!["notes".into(), r#"{"chapters": []}"#.into()]),
            seen: Mutex::new(Vec::new()),
        });
        let runner = LlmCrewRunner::new(llm.clone());
        let out = runner.kickoff(&CrewSpec::outline(), &inputs()).await.unwrap();

        let seen = llm.seen.lock().unwrap();
        assert!(seen[1].contains("This is the context you're working with:\nnotes"));
        assert!(seen[1].contains("\"chapters\""));
        match out {
            RawOutput::Crew(c) => {
                assert_eq!(c.tasks_output.len(), 2);
                assert!(c.fields.get("chapters").unwrap().is_array());
            }
            other => panic!("unexpected output: {}", other.kind()),
        }
    }

    #[tokio::test]
    async fn test_unparseable_structured_output_keeps_raw_only() {
        let llm = Arc::new(ScriptedLlm {
            replies: Mutex::new(vec!["notes".into(), "not json".into()]),
            seen: Mutex::new(Vec::new()),
        });
        let out = LlmCrewRunner::new(llm)
            .kickoff(&CrewSpec::outline(), &inputs())
            .await
            .unwrap();
        match out {
            RawOutput::Crew(c) => {
                assert!(c.fields.is_empty());
                assert_eq!(c.raw, Some(Value::String("not json".into())));
            }
            other => panic!("unexpected output: {}", other.kind()),
        }
    }

    #[tokio::test]
    async fn test_llm_failure_names_the_task() {
        let llm = Arc::new(ScriptedLlm {
            replies: Mutex::new(vec!["notes".into()]),
            seen: Mutex::new(Vec::new()),
        });
        let err = LlmCrewRunner::new(llm)
            .kickoff(&CrewSpec::outline(), &inputs())
            .await
            .unwrap_err();
        assert!(matches!(err, CrewError::Llm { ref task, .. } if task == "generate_outline"));
    }

    /// 记录查询词的搜索工具；查询含 "down" 时失败
    struct ScriptedSearch {
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl crate::tools::Tool for Arc<ScriptedSearch> {
        fn name(&self) -> &str {
            "search"
        }

        fn description(&self) -> &str {
            "scripted search"
        }

        async fn execute(&self, args: Value) -> Result<String, String> {
            let q = args["query"].as_str().unwrap_or_default().to_string();
            self.queries.lock().unwrap().push(q.clone());
            if q.contains("down") {
                Err("search backend down".to_string())
            } else {
                Ok(format!("Top hit for {}", q))
            }
        }
    }

    fn runner_with_search(llm: Arc<ScriptedLlm>) -> (LlmCrewRunner, Arc<ScriptedSearch>) {
        let search = Arc::new(ScriptedSearch {
            queries: Mutex::new(Vec::new()),
        });
        let mut tools = ToolRegistry::new();
        tools.register(search.clone());
        (LlmCrewRunner::new(llm).with_tools(tools), search)
    }

    #[tokio::test]
    async fn test_research_step_runs_search_first() {
        let llm = Arc::new(ScriptedLlm {
            replies: Mutex::new(vec!["notes".into(), r#"{"chapters": []}"#.into()]),
            seen: Mutex::new(Vec::new()),
        });
        let (runner, search) = runner_with_search(llm.clone());
        runner.kickoff(&CrewSpec::outline(), &inputs()).await.unwrap();

        // 只有研究步骤声明了 search
        assert_eq!(search.queries.lock().unwrap().as_slice(), ["Rust"]);
        let seen = llm.seen.lock().unwrap();
        assert!(seen[0].contains("Tool results:\n[search] Rust\nTop hit for Rust"));
        assert!(!seen[1].contains("Tool results:"));
    }

    #[tokio::test]
    async fn test_search_failure_does_not_fail_the_crew() {
        let llm = Arc::new(ScriptedLlm {
            replies: Mutex::new(vec!["notes".into(), r#"{"chapters": []}"#.into()]),
            seen: Mutex::new(Vec::new()),
        });
        let (runner, search) = runner_with_search(llm.clone());
        let inputs = CrewInputs::new().text("topic", "down").text("goal", "Teach");
        assert!(runner.kickoff(&CrewSpec::outline(), &inputs).await.is_ok());

        assert_eq!(search.queries.lock().unwrap().len(), 1);
        assert!(!llm.seen.lock().unwrap()[0].contains("Tool results:"));
    }

    #[tokio::test]
    async fn test_empty_crew_is_rejected() {
        let crew = CrewSpec {
            name: "empty".into(),
            steps: vec![],
        };
        let err = LlmCrewRunner::new(Arc::new(MockLlmClient))
            .kickoff(&crew, &inputs())
            .await
            .unwrap_err();
        assert!(matches!(err, CrewError::EmptyCrew(_)));
    }
}
