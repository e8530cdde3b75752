//! 画出成书流程图（Mermaid），不调用 LLM，也不写书
//!
//! 用法：bookflow-plot [输出路径]；省略路径时打印到 stdout。

use anyhow::Context;
use bookflow::{config::load_config, observability, BookFlow};

fn main() -> anyhow::Result<()> {
    observability::init_logs();

    let cfg = load_config(None).context("Failed to load config")?;
    let chart = BookFlow::plot_from_config(&cfg).context("Failed to build flow graph")?;

    match std::env::args().nth(1) {
        Some(path) => {
            std::fs::write(&path, &chart).with_context(|| format!("Failed to write {}", path))?;
            tracing::info!("Flow chart saved as {}", path);
        }
        None => print!("{}", chart),
    }
    Ok(())
}
