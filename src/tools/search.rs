//! 网页搜索工具：域名白名单、超时、结果大小限制
//!
//! 查询词以 `q` 参数拼到配置的搜索地址上发起 GET；只允许白名单中的域名。
//! HTML 响应用 html2text 转为可读文本，超过 max_result_chars 时截断并追加 ...[truncated]。
//! 实际的 HTTP 请求经由 Fetcher 完成，测试中可替换为脚本化实现。

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::{Client, Url};
use serde_json::Value;

use crate::config::SearchSection;
use crate::tools::Tool;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// 取回 URL 的正文
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get(&self, url: &str) -> Result<String, String>;
}

/// 基于 reqwest 的 Fetcher，带超时与浏览器 UA
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &str) -> Result<String, String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        resp.text().await.map_err(|e| format!("Read body: {}", e))
    }
}

pub struct SearchTool {
    fetcher: Arc<dyn Fetcher>,
    endpoint: String,
    allowed_domains: HashSet<String>,
    max_result_chars: usize,
}

fn looks_like_html(s: &str) -> bool {
    let head: String = s.trim_start().chars().take(512).collect::<String>().to_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html") || head.contains("<body") || head.contains("<head")
}

/// html2text 失败时的回退：去掉标签并压缩空白
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl SearchTool {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        endpoint: impl Into<String>,
        allowed_domains: Vec<String>,
        max_result_chars: usize,
    ) -> Self {
        Self {
            fetcher,
            endpoint: endpoint.into(),
            allowed_domains: allowed_domains.into_iter().map(|d| d.to_lowercase()).collect(),
            max_result_chars,
        }
    }

    pub fn from_config(cfg: &SearchSection) -> Self {
        Self::new(
            Arc::new(HttpFetcher::new(cfg.timeout_secs)),
            cfg.endpoint.clone(),
            cfg.allowed_domains.clone(),
            cfg.max_result_chars,
        )
    }

    /// 拼出查询 URL 并检查域名白名单
    fn search_url(&self, query: &str) -> Result<Url, String> {
        let url = Url::parse_with_params(&self.endpoint, &[("q", query)])
            .map_err(|e| format!("Invalid search endpoint '{}': {}", self.endpoint, e))?;
        let host = url
            .host_str()
            .map(str::to_lowercase)
            .ok_or_else(|| format!("Search endpoint has no host: {}", self.endpoint))?;
        if !self.allowed_domains.contains(&host) {
            return Err(format!("Domain not in allowlist: {}", host));
        }
        Ok(url)
    }

    fn readable(&self, body: String) -> String {
        let body = body.trim_start_matches('\u{FEFF}');
        let text = if looks_like_html(body) {
            match html2text::from_read(body.as_bytes(), 120) {
                Ok(text) if !text.trim().is_empty() => text,
                _ => strip_tags(body),
            }
        } else {
            body.to_string()
        };

        if text.chars().count() > self.max_result_chars {
            text.chars().take(self.max_result_chars).collect::<String>() + "\n...[truncated]"
        } else {
            text
        }
    }

    pub async fn search(&self, query: &str) -> Result<String, String> {
        let url = self.search_url(query)?;
        tracing::info!(url = %url, "search tool fetch");
        let body = self.fetcher.get(url.as_str()).await?;
        Ok(self.readable(body))
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search the web and return readable result text. Args: {\"query\": \"...\"}."
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim();
        if query.is_empty() {
            return Err("Missing query".to_string());
        }
        self.search(query).await
    }
}
