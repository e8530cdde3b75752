//! Crew 层：生成引擎的薄封装（Agent / Task 模板、顺序执行、原始输出）

pub mod inputs;
pub mod output;
pub mod runner;
pub mod spec;

pub use inputs::{CrewInputs, InputValue};
pub use output::{CrewOutput, RawOutput, Record};
pub use runner::{CrewRunner, LlmCrewRunner};
pub use spec::{
    AgentOverride, AgentSpec, CrewOverride, CrewSpec, CrewStep, CrewStepOverride, OutputFormat,
    TaskOverride, TaskSpec,
};
