//! 可观测性：日志订阅器初始化（只由二进制入口调用一次）
//!
//! 以 `otel` feature 编译且设置了 OTEL_EXPORTER_OTLP_ENDPOINT 时，额外挂一层
//! tracing-opentelemetry，把 span 经 OTLP/HTTP 导出；否则只输出到 stderr。

#[cfg(feature = "otel")]
mod otel;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const OTLP_ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// 空白的 endpoint 视为未设置
pub fn otlp_endpoint(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// 只输出日志，不导出 span；可在 tokio 运行时之外调用
pub fn init_logs() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// 默认 info，可通过 RUST_LOG 覆盖；需在 tokio 运行时内调用（导出器使用批处理任务）
pub fn init() {
    let endpoint = otlp_endpoint(std::env::var(OTLP_ENDPOINT_ENV).ok());
    let registry = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(std::io::stderr));

    #[cfg(feature = "otel")]
    {
        let (layer, error) = match endpoint.as_deref() {
            Some(_) => match otel::layer() {
                Ok(layer) => (Some(layer), None),
                Err(e) => (None, Some(e)),
            },
            None => (None, None),
        };
        let exporting = layer.is_some();
        registry.with(layer).init();
        if let Some(e) = error {
            tracing::warn!("OpenTelemetry export disabled: {}", e);
        } else if exporting {
            tracing::info!("Exporting traces to {}", endpoint.unwrap_or_default());
        }
    }

    #[cfg(not(feature = "otel"))]
    {
        registry.init();
        if let Some(endpoint) = endpoint {
            tracing::warn!(
                "{} is set ({}) but bookflow was built without the `otel` feature; traces are not exported",
                OTLP_ENDPOINT_ENV,
                endpoint
            );
        }
    }
}

/// 刷出尚未导出的 span；未启用导出时什么也不做
pub fn shutdown() {
    #[cfg(feature = "otel")]
    otel::shutdown();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_endpoint_is_unset() {
        assert_eq!(otlp_endpoint(None), None);
        assert_eq!(otlp_endpoint(Some("   ".to_string())), None);
        assert_eq!(
            otlp_endpoint(Some(" http://localhost:4318 ".to_string())),
            Some("http://localhost:4318".to_string())
        );
    }

    #[test]
    fn test_shutdown_without_exporter_is_a_no_op() {
        shutdown();
        shutdown();
    }
}
