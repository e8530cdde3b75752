pub mod builder;
pub mod engine;
pub mod graph;
pub mod types;

pub use builder::FlowBuilder;
pub use engine::FlowStep;
pub use graph::FlowGraph;
pub use types::*;
