//! Bookflow - 成书流水线
//!
//! 入口：初始化日志、加载配置、构造成书流程并执行一次。

use std::path::PathBuf;

use anyhow::Context;
use bookflow::{config::load_config, observability, BookFlow, BookState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();
    let result = run().await;
    observability::shutdown();
    result
}

async fn run() -> anyhow::Result<()> {
    // 可选参数：配置文件路径
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load config")?;

    let flow = BookFlow::from_config(&cfg).context("Failed to create book flow")?;
    let (state, _document) = flow
        .kickoff(BookState::from_config(&cfg.book))
        .await
        .context("Book flow run failed")?;

    println!(
        "Book '{}' written with {} chapters: {}",
        state.title,
        state.book.len(),
        flow.output_path().display()
    );
    Ok(())
}
