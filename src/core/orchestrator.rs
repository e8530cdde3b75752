//! 成书流程编排器
//!
//! 负责：按配置构造 LLM 客户端（显式依赖，注入到 Crew 执行器），把三个阶段接成流程图
//! 大纲 → 章节 → 汇总，并提供 kickoff（执行一次）与 plot（只画图）两个入口。

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::book::{ChapterStage, JoinStage, OutlineStage};
use crate::config::{AppConfig, CrewsSection};
use crate::core::{BookError, BookState, CrewError};
use crate::crew::{CrewInputs, CrewRunner, CrewSpec, LlmCrewRunner, RawOutput};
use crate::llm::{
    create_deepseek_client, create_gemini_client, LlmClient, MockLlmClient, OpenAiClient,
};
use crate::tools::{SearchTool, ToolRegistry};
use crate::workflow::{Flow, FlowBuilder, FlowError, FlowRun};

pub const STEP_OUTLINE: &str = "generate_book_outline";
pub const STEP_CHAPTERS: &str = "write_chapters";
pub const STEP_JOIN: &str = "join_and_save_chapter";

const FLOW_NAME: &str = "BookFlow";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

fn resolve_api_key(cfg: &AppConfig, env_var: &'static str) -> Result<String, BookError> {
    let present = |k: &String| !k.trim().is_empty();
    cfg.llm
        .api_key
        .clone()
        .filter(present)
        .or_else(|| std::env::var(env_var).ok().filter(present))
        .ok_or_else(|| BookError::MissingCredential {
            provider: cfg.llm.provider.clone(),
            env_var,
        })
}

/// 根据配置选择 LLM 后端（Gemini / OpenAI 兼容 / DeepSeek / Mock）；缺少凭据直接报错
pub fn create_llm_from_config(cfg: &AppConfig) -> Result<Arc<dyn LlmClient>, BookError> {
    let provider = cfg.llm.provider.to_lowercase();
    let model = cfg.llm.model.as_deref();

    let client = match provider.as_str() {
        "mock" => {
            tracing::warn!("Using Mock LLM; generated content is canned");
            return Ok(Arc::new(MockLlmClient));
        }
        "gemini" => {
            let key = resolve_api_key(cfg, "GEMINI_API_KEY")?;
            match cfg.llm.base_url.as_deref() {
                Some(base) => OpenAiClient::new(Some(base), model.unwrap_or(crate::llm::GEMINI_FLASH), &key),
                None => create_gemini_client(model, &key),
            }
        }
        "deepseek" => {
            let key = resolve_api_key(cfg, "DEEPSEEK_API_KEY")?;
            match cfg.llm.base_url.as_deref() {
                Some(base) => OpenAiClient::new(Some(base), model.unwrap_or(crate::llm::DEEPSEEK_CHAT), &key),
                None => create_deepseek_client(model, &key),
            }
        }
        "openai" => {
            let key = resolve_api_key(cfg, "OPENAI_API_KEY")?;
            OpenAiClient::new(
                cfg.llm.base_url.as_deref(),
                model.unwrap_or(OPENAI_DEFAULT_MODEL),
                &key,
            )
        }
        _ => return Err(BookError::UnknownProvider(cfg.llm.provider.clone())),
    };

    tracing::info!("Using {} LLM ({})", provider, client.model());
    Ok(Arc::new(
        client
            .with_temperature(cfg.llm.temperature)
            .with_request_timeout(cfg.llm.timeouts.request),
    ))
}

/// 只用于画图的执行器：流程不会被执行，任何调用都视为失败
struct Detached;

#[async_trait]
impl CrewRunner for Detached {
    async fn kickoff(&self, crew: &CrewSpec, _inputs: &CrewInputs) -> Result<RawOutput, CrewError> {
        Err(CrewError::Llm {
            task: crew.name.clone(),
            message: "flow was built for plotting only".to_string(),
        })
    }
}

/// 按配置注册研究步骤可用的工具
pub fn create_tools_from_config(cfg: &AppConfig) -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    if cfg.tools.search.enabled {
        tracing::info!(
            "Web search enabled for research steps ({})",
            cfg.tools.search.endpoint
        );
        tools.register(SearchTool::from_config(&cfg.tools.search));
    }
    tools
}

/// 成书流程：持有流程图与 Crew 执行器（用于结束时汇报 token 用量）
pub struct BookFlow {
    flow: Flow<BookState>,
    runner: Option<Arc<LlmCrewRunner>>,
    output_path: PathBuf,
}

impl BookFlow {
    /// 按配置构造完整流程；缺少凭据或后端未知时返回错误，不执行任何阶段
    pub fn from_config(cfg: &AppConfig) -> Result<Self, BookError> {
        let llm = create_llm_from_config(cfg)?;
        let runner = Arc::new(LlmCrewRunner::new(llm).with_tools(create_tools_from_config(cfg)));
        let mut flow = Self::new(runner.clone(), cfg.crews.clone(), cfg.app.output_path())?;
        flow.runner = Some(runner);
        Ok(flow)
    }

    pub fn new(
        runner: Arc<dyn CrewRunner>,
        crews: CrewsSection,
        output_path: impl Into<PathBuf>,
    ) -> Result<Self, BookError> {
        let output_path = output_path.into();
        let flow = FlowBuilder::<BookState>::new(FLOW_NAME)
            .start(STEP_OUTLINE, OutlineStage::new(Arc::clone(&runner), crews.outline))
            .listen(
                STEP_CHAPTERS,
                STEP_OUTLINE,
                ChapterStage::new(runner, crews.chapter),
            )
            .listen(STEP_JOIN, STEP_CHAPTERS, JoinStage::new(output_path.clone()))
            .build()?;

        Ok(Self {
            flow,
            runner: None,
            output_path,
        })
    }

    pub fn output_path(&self) -> &std::path::Path {
        &self.output_path
    }

    /// 执行一次完整流程，返回最终状态与成书文本
    pub async fn kickoff(&self, mut state: BookState) -> Result<(BookState, String), BookError> {
        tracing::info!(
            "Kickoff the Book Flow: title='{}', topic='{}'",
            state.title,
            state.topic
        );
        let run: FlowRun = self.flow.kickoff(&mut state).await?;

        let document = run
            .outputs
            .get(STEP_JOIN)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| FlowError::StepNotFound(STEP_JOIN.to_string()))?;

        if let Some(runner) = &self.runner {
            let (prompt, completion, total) = runner.token_usage();
            tracing::info!(
                "Token usage: prompt={}, completion={}, total={}",
                prompt,
                completion,
                total
            );
        }
        tracing::info!(
            "Book Flow finished: {} chapters, saved to {}",
            state.book.len(),
            self.output_path.display()
        );
        Ok((state, document))
    }

    /// 渲染流程图（Mermaid）
    pub fn plot(&self) -> Result<String, BookError> {
        Ok(self.flow.plot()?)
    }

    /// 不构造 LLM 客户端、不执行任何阶段，直接渲染配置对应的流程图
    pub fn plot_from_config(cfg: &AppConfig) -> Result<String, BookError> {
        Self::new(Arc::new(Detached), cfg.crews.clone(), cfg.app.output_path())?.plot()
    }
}
