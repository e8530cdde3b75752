//! 流程引擎
//!
//! 事件驱动执行：入口步骤先跑，每个步骤完成后触发监听它的下游步骤。
//! 状态以 `&mut S` 在步骤之间传递，同一时刻只有一个步骤持有它；步骤内部可自行并发。

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;

use crate::workflow::graph::FlowGraph;
use crate::workflow::types::*;

/// 流程步骤 trait
#[async_trait]
pub trait FlowStep<S>: Send + Sync {
    /// 执行步骤，返回值记录在 FlowRun.outputs 中
    async fn run(&self, state: &mut S) -> Result<serde_json::Value, FlowError>;
}

impl<S: Send> Flow<S> {
    pub fn graph(&self) -> Result<FlowGraph, FlowError> {
        let graph = FlowGraph::new(self.nodes.iter().map(|n| (&n.id, &n.trigger)))?;
        graph.validate()?;
        Ok(graph)
    }

    /// 渲染流程图（Mermaid），不执行任何步骤
    pub fn plot(&self) -> Result<String, FlowError> {
        Ok(self.graph()?.to_mermaid(&self.name))
    }

    /// 从入口步骤开始执行到没有可触发的步骤为止
    pub async fn kickoff(&self, state: &mut S) -> Result<FlowRun, FlowError> {
        let mut graph = self.graph()?;
        let steps: HashMap<&StepId, &FlowNode<S>> =
            self.nodes.iter().map(|n| (&n.id, n)).collect();

        let mut run = FlowRun {
            flow_id: self.id.clone(),
            status: FlowStatus::Running,
            step_states: self
                .nodes
                .iter()
                .map(|n| (n.id.clone(), StepState::Waiting))
                .collect(),
            outputs: HashMap::new(),
            final_output: None,
            started_at: chrono::Utc::now().timestamp_millis(),
            completed_at: None,
        };
        tracing::info!(flow = %self.name, flow_id = %self.id, "Flow started");

        let mut queue: VecDeque<StepId> = graph.get_ready_steps(&run.step_states).into();
        while let Some(step_id) = queue.pop_front() {
            let node = steps
                .get(&step_id)
                .ok_or_else(|| FlowError::StepNotFound(step_id.clone()))?;

            run.step_states.insert(step_id.clone(), StepState::Running);
            tracing::info!(flow = %self.name, step = %step_id, "Step started");

            match node.step.run(state).await {
                Ok(output) => {
                    run.step_states.insert(step_id.clone(), StepState::Completed);
                    run.outputs.insert(step_id.clone(), output.clone());
                    run.final_output = Some(output);
                    tracing::info!(flow = %self.name, step = %step_id, "Step completed");

                    for next in graph.mark_completed(&step_id) {
                        if run.step_states.get(&next) == Some(&StepState::Waiting) {
                            queue.push_back(next);
                        }
                    }
                }
                Err(e) => {
                    run.step_states.insert(step_id.clone(), StepState::Failed);
                    run.status = FlowStatus::Failed;
                    run.completed_at = Some(chrono::Utc::now().timestamp_millis());
                    tracing::error!(flow = %self.name, step = %step_id, "Step failed: {}", e);
                    return Err(match e {
                        FlowError::StepFailed { .. } => e,
                        other => FlowError::StepFailed {
                            step: step_id,
                            reason: other.to_string(),
                        },
                    });
                }
            }
        }

        for st in run.step_states.values_mut() {
            if *st == StepState::Waiting {
                *st = StepState::Skipped;
            }
        }
        run.status = FlowStatus::Completed;
        run.completed_at = Some(chrono::Utc::now().timestamp_millis());
        tracing::info!(
            flow = %self.name,
            elapsed_ms = run.completed_at.unwrap_or(run.started_at) - run.started_at,
            "Flow completed"
        );
        Ok(run)
    }
}
