//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 `.env`（若存在），再读 TOML 文件，最后用环境变量 `BOOKFLOW__*` 覆盖
//! （双下划线表示嵌套，如 `BOOKFLOW__LLM__PROVIDER=mock`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::crew::{CrewOverride, CrewSpec};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub book: BookSection,
    pub crews: CrewsSection,
    pub tools: ToolsSection,
}

/// [app] 段：输出位置
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_output_file")]
    pub output_file: String,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_output_file() -> String {
    "book.md".to_string()
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            output_file: default_output_file(),
        }
    }
}

impl AppSection {
    /// 成书落盘路径：{output_dir}/{output_file}
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_file)
    }
}

/// [llm] 段：后端选择、采样温度与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：gemini / openai / deepseek / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    /// 未设置时使用各后端的默认模型
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// 优先于环境变量中的 API Key
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_temperature() -> f32 {
    0.75
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: None,
            api_key: None,
            temperature: default_temperature(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    /// 单次请求超时（秒），0 表示不限
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

/// [book] 段：书名、主题与目标（流程状态的初始值）
#[derive(Debug, Clone, Deserialize)]
pub struct BookSection {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_goal")]
    pub goal: String,
}

fn default_title() -> String {
    "The Current State of AI in 2025".to_string()
}

fn default_topic() -> String {
    "Exploring the latest trends in AI across different industries as of 2025".to_string()
}

fn default_goal() -> String {
    "The goal of this book is to provide a comprehensive overview of the current state of \
     artificial intelligence including OpenAI, Gemini, Watsonx, Deepseek etc. in May 2025. \
     It will delve into the latest trends impacting various industries, analyze significant \
     advancements, and discuss potential future developments. The book aims to inform readers \
     about cutting-edge AI technologies and prepare them for upcoming innovations in the field."
        .to_string()
}

impl Default for BookSection {
    fn default() -> Self {
        Self {
            title: default_title(),
            topic: default_topic(),
            goal: default_goal(),
        }
    }
}

/// [crews] 段：大纲 Crew 与章节 Crew 的 Agent / Task 模板
///
/// 配置里只需写出要改的字段，其余沿用内置模板；`steps` 按下标合并。
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "CrewsOverride")]
pub struct CrewsSection {
    pub outline: CrewSpec,
    pub chapter: CrewSpec,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CrewsOverride {
    outline: CrewOverride,
    chapter: CrewOverride,
}

impl TryFrom<CrewsOverride> for CrewsSection {
    type Error = String;

    fn try_from(ov: CrewsOverride) -> Result<Self, Self::Error> {
        Ok(Self {
            outline: CrewSpec::outline().merged(ov.outline)?,
            chapter: CrewSpec::chapter().merged(ov.chapter)?,
        })
    }
}

impl Default for CrewsSection {
    fn default() -> Self {
        Self {
            outline: CrewSpec::outline(),
            chapter: CrewSpec::chapter(),
        }
    }
}

/// [tools] 段：研究步骤可用的工具
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ToolsSection {
    #[serde(default)]
    pub search: SearchSection,
}

/// [tools.search] 段：网页搜索的开关、查询地址、超时、最大字符数与域名白名单
#[derive(Debug, Clone, Deserialize)]
pub struct SearchSection {
    /// 默认关闭；开启后研究步骤会先联网搜索再交给 LLM
    #[serde(default)]
    pub enabled: bool,
    /// 查询地址，查询词以 `q` 参数附加
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_result_chars")]
    pub max_result_chars: usize,
    #[serde(default = "default_allowed_domains")]
    pub allowed_domains: Vec<String>,
}

fn default_search_endpoint() -> String {
    "https://html.duckduckgo.com/html/".to_string()
}

fn default_search_timeout_secs() -> u64 {
    15
}

fn default_max_result_chars() -> usize {
    4000
}

fn default_allowed_domains() -> Vec<String> {
    vec!["html.duckduckgo.com".into(), "en.wikipedia.org".into()]
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_search_endpoint(),
            timeout_secs: default_search_timeout_secs(),
            max_result_chars: default_max_result_chars(),
            allowed_domains: default_allowed_domains(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 BOOKFLOW__* 可覆盖
///
/// 1. 加载 `.env`（不存在则忽略），使其中的 API Key 与 BOOKFLOW__* 对后续步骤可见
/// 2. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 3. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 4. 最后叠加环境变量 BOOKFLOW__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            tracing::warn!("Failed to load .env: {}", e);
        }
    }

    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("BOOKFLOW")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
