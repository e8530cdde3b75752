//! Crew 定义：Agent 角色、Task 模板与顺序执行的任务对
//!
//! 模板中的 `{name}` 占位符在运行时由 CrewInputs 填充。

use serde::{Deserialize, Serialize};

/// Agent 角色描述，拼成 system prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    /// 该 Agent 在执行任务前可调用的工具名（见 ToolRegistry）
    #[serde(default)]
    pub tools: Vec<String>,
}

impl AgentSpec {
    pub fn new(role: &str, goal: &str, backstory: &str) -> Self {
        Self {
            role: role.to_string(),
            goal: goal.to_string(),
            backstory: backstory.to_string(),
            tools: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: &[&str]) -> Self {
        self.tools = tools.iter().map(|t| t.to_string()).collect();
        self
    }
}

/// 任务期望的输出形态；结构化输出会在 prompt 末尾追加 JSON 格式要求
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Outline,
    Chapter,
}

impl OutputFormat {
    pub fn instructions(self) -> Option<&'static str> {
        match self {
            OutputFormat::Text => None,
            OutputFormat::Outline => Some(
                "Respond only with a JSON object of the form \
                 {\"chapters\": [{\"title\": \"...\", \"description\": \"...\"}]}.",
            ),
            OutputFormat::Chapter => Some(
                "Respond only with a JSON object of the form \
                 {\"title\": \"...\", \"content\": \"...\"} where content is the chapter in markdown.",
            ),
        }
    }
}

/// 单个任务模板
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    pub description: String,
    pub expected_output: String,
    #[serde(default)]
    pub output: OutputFormat,
    /// 工具查询模板（如 `{topic}`）；未设置时该任务不调用工具
    #[serde(default)]
    pub search_query: Option<String>,
}

/// Crew 中的一步：由某个 Agent 执行某个 Task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewStep {
    pub agent: AgentSpec,
    pub task: TaskSpec,
}

/// 顺序执行的 Crew：前一步的输出作为后一步的上下文，最后一步的输出即 Crew 结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewSpec {
    pub name: String,
    pub steps: Vec<CrewStep>,
}

impl CrewSpec {
    /// 最终产出的格式（最后一步）
    pub fn output_format(&self) -> OutputFormat {
        self.steps
            .last()
            .map(|s| s.task.output)
            .unwrap_or_default()
    }

    /// 研究主题 → 生成大纲
    pub fn outline() -> Self {
        let researcher = AgentSpec::new(
            "Research Agent",
            "Gather comprehensive information about {topic} that will be used to create an organized and well-structured book outline.",
            "You're a seasoned researcher, known for gathering the best sources and understanding the key elements of any topic.",
        )
        .with_tools(&["search"]);
        let outliner = AgentSpec::new(
            "Book Outlining Agent",
            "Based on the research, generate a book outline about {topic}. The outline should include all chapters in sequential order and provide a title and description for each chapter.",
            "You are a skilled organizer, great at turning scattered information into a structured format.",
        );
        Self {
            name: "outline_book_crew".to_string(),
            steps: vec![
                CrewStep {
                    agent: researcher,
                    task: TaskSpec {
                        name: "research_topic".to_string(),
                        description: "Research the provided topic of {topic} to gather the most important information that will be useful in creating a book outline.\n\nThe goal of the book is:\n{goal}".to_string(),
                        expected_output: "A set of key points and important information about {topic} that will be used to create the outline.".to_string(),
                        output: OutputFormat::Text,
                        search_query: Some("{topic}".to_string()),
                    },
                },
                CrewStep {
                    agent: outliner,
                    task: TaskSpec {
                        name: "generate_outline".to_string(),
                        description: "Create a book outline with chapters in sequential order based on the research findings. Ensure that each chapter has a title and a brief description that highlights the topics and subtopics to be covered.\n\nThe topic of the book is:\n{topic}\n\nThe goal of the book is:\n{goal}".to_string(),
                        expected_output: "An outline of chapters, with titles and descriptions of what each chapter will contain.".to_string(),
                        output: OutputFormat::Outline,
                        search_query: None,
                    },
                },
            ],
        }
    }

    /// 研究章节 → 撰写章节
    pub fn chapter() -> Self {
        let researcher = AgentSpec::new(
            "Research Agent",
            "Gather comprehensive information about {chapter_title} as part of a book about {topic}.",
            "You're a seasoned researcher, known for gathering the best sources and understanding the key elements of any topic.",
        )
        .with_tools(&["search"]);
        let writer = AgentSpec::new(
            "Chapter Writer",
            "Write a well-structured chapter for the book based on the provided chapter title, goal, and outline.",
            "You are an exceptional writer, known for producing engaging, well-researched, and informative content.",
        );
        Self {
            name: "write_book_chapter_crew".to_string(),
            steps: vec![
                CrewStep {
                    agent: researcher,
                    task: TaskSpec {
                        name: "research_chapter".to_string(),
                        description: "Research the provided chapter topic, cover all subtopics, and gather the most important information for writing it.\n\nChapter title: {chapter_title}\nChapter description: {chapter_description}\n\nThe full book outline is:\n{book_outline}".to_string(),
                        expected_output: "A set of key points and important information about {chapter_title} that will be used to write the chapter.".to_string(),
                        output: OutputFormat::Text,
                        search_query: Some("{chapter_title} {topic}".to_string()),
                    },
                },
                CrewStep {
                    agent: writer,
                    task: TaskSpec {
                        name: "write_chapter".to_string(),
                        description: "Write a well-structured chapter based on the research findings. The chapter should be written in markdown and be roughly 3,000 words.\n\nChapter title: {chapter_title}\nChapter description: {chapter_description}\n\nThe topic of the book is:\n{topic}\n\nThe goal of the book is:\n{goal}\n\nThe full book outline is:\n{book_outline}".to_string(),
                        expected_output: "A markdown-formatted chapter of roughly 3,000 words that covers the provided chapter title and outline description.".to_string(),
                        output: OutputFormat::Chapter,
                        search_query: None,
                    },
                },
            ],
        }
    }
}

/// 配置中对单个 Agent 的局部覆盖
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AgentOverride {
    pub role: Option<String>,
    pub goal: Option<String>,
    pub backstory: Option<String>,
    pub tools: Option<Vec<String>>,
}

/// 配置中对单个 Task 的局部覆盖
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TaskOverride {
    pub name: Option<String>,
    pub description: Option<String>,
    pub expected_output: Option<String>,
    pub output: Option<OutputFormat>,
    pub search_query: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CrewStepOverride {
    pub agent: AgentOverride,
    pub task: TaskOverride,
}

/// 配置中对 Crew 的局部覆盖：按下标合并到内置步骤上，未写出的字段保持内置值
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CrewOverride {
    pub name: Option<String>,
    pub steps: Vec<CrewStepOverride>,
}

fn replace<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

impl CrewStep {
    fn apply(&mut self, ov: CrewStepOverride) {
        replace(&mut self.agent.role, ov.agent.role);
        replace(&mut self.agent.goal, ov.agent.goal);
        replace(&mut self.agent.backstory, ov.agent.backstory);
        replace(&mut self.agent.tools, ov.agent.tools);
        replace(&mut self.task.name, ov.task.name);
        replace(&mut self.task.description, ov.task.description);
        replace(&mut self.task.expected_output, ov.task.expected_output);
        replace(&mut self.task.output, ov.task.output);
        if ov.task.search_query.is_some() {
            self.task.search_query = ov.task.search_query;
        }
    }

    /// 超出内置步骤数的覆盖项必须写全必填字段
    fn from_override(ov: CrewStepOverride) -> Result<Self, String> {
        let missing = |field: &str| format!("new crew step is missing '{}'", field);
        Ok(Self {
            agent: AgentSpec {
                role: ov.agent.role.ok_or_else(|| missing("agent.role"))?,
                goal: ov.agent.goal.ok_or_else(|| missing("agent.goal"))?,
                backstory: ov.agent.backstory.ok_or_else(|| missing("agent.backstory"))?,
                tools: ov.agent.tools.unwrap_or_default(),
            },
            task: TaskSpec {
                name: ov.task.name.ok_or_else(|| missing("task.name"))?,
                description: ov.task.description.ok_or_else(|| missing("task.description"))?,
                expected_output: ov
                    .task
                    .expected_output
                    .ok_or_else(|| missing("task.expected_output"))?,
                output: ov.task.output.unwrap_or_default(),
                search_query: ov.task.search_query,
            },
        })
    }
}

impl CrewSpec {
    /// 把局部覆盖合并到当前 Crew 上
    pub fn merged(mut self, ov: CrewOverride) -> Result<Self, String> {
        replace(&mut self.name, ov.name);
        for (i, step) in ov.steps.into_iter().enumerate() {
            match self.steps.get_mut(i) {
                Some(existing) => existing.apply(step),
                None => self.steps.push(CrewStep::from_override(step)?),
            }
        }
        Ok(self)
    }
}
