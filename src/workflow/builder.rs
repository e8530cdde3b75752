//! 流程构建器
//!
//! 提供流畅的API来声明入口步骤与监听关系

use std::sync::Arc;

use crate::workflow::engine::FlowStep;
use crate::workflow::graph::FlowGraph;
use crate::workflow::types::*;

/// 流程构建器
pub struct FlowBuilder<S> {
    id: FlowId,
    name: String,
    nodes: Vec<FlowNode<S>>,
}

impl<S: Send + 'static> FlowBuilder<S> {
    /// 创建新的流程构建器
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: format!("flow_{}", uuid::Uuid::new_v4()),
            name: name.into(),
            nodes: Vec::new(),
        }
    }

    fn node(mut self, id: impl Into<StepId>, trigger: Trigger, step: impl FlowStep<S> + 'static) -> Self {
        self.nodes.push(FlowNode {
            id: id.into(),
            step: Arc::new(step),
            trigger,
        });
        self
    }

    /// 添加入口步骤
    pub fn start(self, id: impl Into<StepId>, step: impl FlowStep<S> + 'static) -> Self {
        self.node(id, Trigger::Start, step)
    }

    /// 添加监听步骤：`after` 完成后执行
    pub fn listen(
        self,
        id: impl Into<StepId>,
        after: impl Into<StepId>,
        step: impl FlowStep<S> + 'static,
    ) -> Self {
        self.node(id, Trigger::After(after.into()), step)
    }

    /// 构建流程：校验步骤唯一、上游存在、有入口且无环
    pub fn build(self) -> Result<Flow<S>, FlowError> {
        if self.nodes.is_empty() {
            return Err(FlowError::InvalidConfiguration("flow has no steps".to_string()));
        }

        FlowGraph::new(self.nodes.iter().map(|n| (&n.id, &n.trigger)))?.validate()?;

        Ok(Flow {
            id: self.id,
            name: self.name,
            nodes: self.nodes,
        })
    }
}
