//! 流程类型定义
//!
//! 定义流程、步骤、触发关系等核心数据类型

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::workflow::engine::FlowStep;

pub type FlowId = String;
pub type StepId = String;

/// 流程状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowStatus {
    /// 正在执行
    Running,
    /// 已完成
    Completed,
    /// 执行失败
    Failed,
}

/// 步骤状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepState {
    /// 等待触发
    Waiting,
    /// 正在执行
    Running,
    /// 已完成
    Completed,
    /// 失败
    Failed,
    /// 流程结束时仍未被触发
    Skipped,
}

/// 步骤的触发条件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    /// 流程入口，启动即执行
    Start,
    /// 指定步骤完成后执行
    After(StepId),
}

impl Trigger {
    pub fn upstream(&self) -> Option<&StepId> {
        match self {
            Trigger::Start => None,
            Trigger::After(id) => Some(id),
        }
    }
}

/// 流程中的步骤节点
pub struct FlowNode<S> {
    pub id: StepId,
    pub step: Arc<dyn FlowStep<S>>,
    pub trigger: Trigger,
}

/// 流程定义：节点按声明顺序保存，同时就绪的步骤按此顺序执行
pub struct Flow<S> {
    pub id: FlowId,
    pub name: String,
    pub nodes: Vec<FlowNode<S>>,
}

/// 一次 kickoff 的执行记录
#[derive(Debug, Clone)]
pub struct FlowRun {
    pub flow_id: FlowId,
    pub status: FlowStatus,
    pub step_states: HashMap<StepId, StepState>,
    /// 各步骤的返回值
    pub outputs: HashMap<StepId, serde_json::Value>,
    /// 最后一个完成的步骤的返回值
    pub final_output: Option<serde_json::Value>,
    pub started_at: i64,
    pub completed_at: Option<i64>,
}

/// 流程错误类型
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Step not found: {0}")]
    StepNotFound(StepId),
    #[error("Duplicate step: {0}")]
    DuplicateStep(StepId),
    #[error("Cyclic dependency detected")]
    CyclicDependency,
    #[error("Invalid flow configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Step '{step}' failed: {reason}")]
    StepFailed { step: StepId, reason: String },
}
