//! 流程依赖图
//!
//! 使用邻接表和入度表实现 DAG：校验环路、求就绪步骤、完成后触发下游、输出 Mermaid 图

use std::collections::{HashMap, HashSet, VecDeque};

use crate::workflow::types::*;

/// 流程依赖图
pub struct FlowGraph {
    /// 声明顺序
    pub order: Vec<StepId>,
    /// 触发条件
    pub triggers: HashMap<StepId, Trigger>,
    /// 邻接表：步骤 ID -> 监听该步骤的步骤列表
    pub adjacency: HashMap<StepId, Vec<StepId>>,
    /// 入度表：步骤 ID -> 未满足的上游数
    pub in_degree: HashMap<StepId, usize>,
}

impl FlowGraph {
    /// 创建依赖图；上游不存在或重复声明时报错
    pub fn new<'a>(
        nodes: impl IntoIterator<Item = (&'a StepId, &'a Trigger)>,
    ) -> Result<Self, FlowError> {
        let mut order: Vec<StepId> = Vec::new();
        let mut triggers: HashMap<StepId, Trigger> = HashMap::new();
        for (id, trigger) in nodes {
            if triggers.insert(id.clone(), trigger.clone()).is_some() {
                return Err(FlowError::DuplicateStep(id.clone()));
            }
            order.push(id.clone());
        }

        let mut adjacency: HashMap<StepId, Vec<StepId>> = HashMap::new();
        let mut in_degree: HashMap<StepId, usize> = HashMap::new();
        for id in &order {
            in_degree.insert(id.clone(), 0);
            adjacency.insert(id.clone(), Vec::new());
        }

        for id in &order {
            let trigger = &triggers[id];
            if let Some(dep) = trigger.upstream() {
                adjacency
                    .get_mut(dep)
                    .ok_or_else(|| FlowError::StepNotFound(dep.clone()))?
                    .push(id.clone());
            }
            in_degree.insert(id.clone(), usize::from(trigger.upstream().is_some()));
        }

        Ok(Self {
            order,
            triggers,
            adjacency,
            in_degree,
        })
    }

    /// Kahn 拓扑排序检测环路
    pub fn validate(&self) -> Result<(), FlowError> {
        if !self.triggers.values().any(|t| *t == Trigger::Start) {
            return Err(FlowError::InvalidConfiguration(
                "flow has no start step".to_string(),
            ));
        }

        let mut degree = self.in_degree.clone();
        let mut queue: VecDeque<&StepId> = self
            .order
            .iter()
            .filter(|id| degree[*id] == 0)
            .collect();
        let mut visited: HashSet<&StepId> = HashSet::new();

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            for next in &self.adjacency[id] {
                if let Some(d) = degree.get_mut(next) {
                    *d = d.saturating_sub(1);
                    if *d == 0 {
                        queue.push_back(next);
                    }
                }
            }
        }

        if visited.len() == self.order.len() {
            Ok(())
        } else {
            Err(FlowError::CyclicDependency)
        }
    }

    /// 获取可执行的步骤（入度为 0 且未执行），按声明顺序
    pub fn get_ready_steps(&self, states: &HashMap<StepId, StepState>) -> Vec<StepId> {
        self.order
            .iter()
            .filter(|id| {
                self.in_degree.get(*id) == Some(&0)
                    && matches!(states.get(*id), Some(StepState::Waiting) | None)
            })
            .cloned()
            .collect()
    }

    /// 标记步骤完成，返回新变为可执行的步骤
    pub fn mark_completed(&mut self, completed: &StepId) -> Vec<StepId> {
        let mut newly_ready = Vec::new();

        let dependents = self.adjacency.get(completed).cloned().unwrap_or_default();
        for dependent in dependents {
            if let Some(degree) = self.in_degree.get_mut(&dependent) {
                if *degree == 0 {
                    continue;
                }
                *degree -= 1;
                if *degree == 0 {
                    newly_ready.push(dependent);
                }
            }
        }

        newly_ready
    }

    /// 渲染为 Mermaid flowchart 文本（不执行任何步骤）
    pub fn to_mermaid(&self, title: &str) -> String {
        let mut out = format!("---\ntitle: {}\n---\nflowchart TD\n", title);
        for id in &self.order {
            match self.triggers[id] {
                Trigger::Start => out.push_str(&format!("    {id}([\"{id}\"])\n")),
                _ => out.push_str(&format!("    {id}[\"{id}\"]\n")),
            }
        }
        for id in &self.order {
            if let Some(dep) = self.triggers[id].upstream() {
                out.push_str(&format!("    {dep} --> {id}\n"));
            }
        }
        out
    }
}
