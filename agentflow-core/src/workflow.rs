//! ABOUTME: Workflow: the unit of persistent state for one user request
//! ABOUTME: Status state machine (invariant W2) and results append-with-replace (invariant W1)

use crate::checkpoint::Checkpoint;
use crate::context::WorkflowContext;
use crate::error::{CoreError, Result};
use crate::ids::{StepId, WorkflowId};
use crate::result::{StepResult, WorkflowError};
use crate::step::Step;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowStatus {
    Pending,
    Planning,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
    RollingBack,
}

impl WorkflowStatus {
    /// Invariant W2: pending -> planning -> running -> (paused <-> running)*
    /// -> (completed | failed | cancelled | rolling-back -> failed). No
    /// transition out of completed/cancelled.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        if matches!(self, Self::Completed | Self::Cancelled) {
            return false;
        }
        matches!(
            (self, next),
            (Self::Pending, Self::Planning)
                | (Self::Pending, Self::Cancelled)
                | (Self::Planning, Self::Running)
                | (Self::Planning, Self::Failed)
                | (Self::Planning, Self::Cancelled)
                | (Self::Running, Self::Paused)
                | (Self::Paused, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
                | (Self::Running, Self::Cancelled)
                | (Self::Paused, Self::Cancelled)
                | (Self::Running, Self::RollingBack)
                | (Self::RollingBack, Self::Failed)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    pub description: String,
    pub original_request: String,
    pub status: WorkflowStatus,
    pub steps: Vec<Step>,
    pub current_step_index: usize,
    pub context: WorkflowContext,
    pub results: Vec<StepResult>,
    pub checkpoints: Vec<Checkpoint>,
    pub error: Option<WorkflowError>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub can_rollback: bool,
}

impl Workflow {
    #[must_use]
    pub fn new(name: String, description: String, original_request: String, context: WorkflowContext) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: WorkflowId::new(),
            name,
            description,
            original_request,
            status: WorkflowStatus::Pending,
            steps: Vec::new(),
            current_step_index: 0,
            context,
            results: Vec::new(),
            checkpoints: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            can_rollback: true,
        }
    }

    /// Enforces invariant W2. Callers (the executor) are the only writers of
    /// `status`; this is the single choke point for that mutation.
    pub fn transition_to(&mut self, next: WorkflowStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::IllegalStateTransition {
                from: format!("{:?}", self.status),
                to: format!("{:?}", next),
            });
        }
        self.status = next;
        self.updated_at = chrono::Utc::now();
        match next {
            WorkflowStatus::Running if self.started_at.is_none() => {
                self.started_at = Some(self.updated_at);
            }
            WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Cancelled => {
                self.completed_at = Some(self.updated_at);
            }
            _ => {}
        }
        Ok(())
    }

    /// Invariant W1: `results` contains at most one terminal entry per step
    /// id; a retry's final result replaces the prior entry rather than
    /// appending a duplicate.
    pub fn record_result(&mut self, result: StepResult) {
        if let Some(existing) = self.results.iter_mut().find(|r| r.step_id == result.step_id) {
            *existing = result;
        } else {
            self.results.push(result);
        }
    }

    #[must_use]
    pub fn step(&self, id: StepId) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn step_mut(&mut self, id: StepId) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.id == id)
    }

    #[must_use]
    pub fn result_for(&self, id: StepId) -> Option<&StepResult> {
        self.results.iter().find(|r| r.step_id == id)
    }

    /// Invariant S2: every dependency id, and every id referenced by a
    /// variant payload's branch/fan-out/loop-body lists, must resolve to
    /// another step in this workflow; no step depends on itself.
    pub fn validate_step_references(&self) -> Result<()> {
        let ids: std::collections::HashSet<StepId> = self.steps.iter().map(|s| s.id).collect();
        for step in &self.steps {
            if step.dependencies.contains(&step.id) {
                return Err(CoreError::SelfDependency {
                    step: step.id.to_string(),
                });
            }
            for dep in &step.dependencies {
                if !ids.contains(dep) {
                    return Err(CoreError::InvalidDependency {
                        step: step.id.to_string(),
                        dependency: dep.to_string(),
                    });
                }
            }
            for referenced in step.variant.referenced_step_ids() {
                if !ids.contains(&referenced) {
                    return Err(CoreError::InvalidDependency {
                        step: step.id.to_string(),
                        dependency: referenced.to_string(),
                    });
                }
            }
        }
        detect_cycle(&self.steps)
    }
}

/// Transitive-cycle detection via DFS with a recursion stack, independent
/// of the direct self-loop check already done per-step above.
fn detect_cycle(steps: &[Step]) -> Result<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InStack,
        Done,
    }

    let index_of: std::collections::HashMap<StepId, usize> =
        steps.iter().enumerate().map(|(i, s)| (s.id, i)).collect();
    let mut marks = vec![Mark::Unvisited; steps.len()];
    let mut path = Vec::new();

    fn visit(
        i: usize,
        steps: &[Step],
        index_of: &std::collections::HashMap<StepId, usize>,
        marks: &mut [Mark],
        path: &mut Vec<usize>,
    ) -> Result<()> {
        match marks[i] {
            Mark::Done => return Ok(()),
            Mark::InStack => {
                let cycle: Vec<String> = path
                    .iter()
                    .skip_while(|&&j| j != i)
                    .map(|&j| steps[j].id.to_string())
                    .collect();
                return Err(CoreError::Cycle { cycle });
            }
            Mark::Unvisited => {}
        }
        marks[i] = Mark::InStack;
        path.push(i);
        for dep in &steps[i].dependencies {
            if let Some(&j) = index_of.get(dep) {
                visit(j, steps, index_of, marks, path)?;
            }
        }
        path.pop();
        marks[i] = Mark::Done;
        Ok(())
    }

    for i in 0..steps.len() {
        visit(i, steps, &index_of, &mut marks, &mut path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepVariant;
    use std::path::PathBuf;

    fn wf() -> Workflow {
        Workflow::new(
            "test".into(),
            "desc".into(),
            "do the thing".into(),
            WorkflowContext::new(PathBuf::from(".")),
        )
    }

    #[test]
    fn status_transitions_follow_w2() {
        let mut w = wf();
        assert!(w.transition_to(WorkflowStatus::Planning).is_ok());
        assert!(w.transition_to(WorkflowStatus::Running).is_ok());
        assert!(w.transition_to(WorkflowStatus::Completed).is_ok());
        // No transition out of completed.
        assert!(w.transition_to(WorkflowStatus::Running).is_err());
    }

    #[test]
    fn pause_resume_round_trip() {
        let mut w = wf();
        w.transition_to(WorkflowStatus::Planning).unwrap();
        w.transition_to(WorkflowStatus::Running).unwrap();
        w.transition_to(WorkflowStatus::Paused).unwrap();
        w.transition_to(WorkflowStatus::Running).unwrap();
        assert_eq!(w.status, WorkflowStatus::Running);
    }

    #[test]
    fn record_result_replaces_by_step_id_not_appends() {
        use crate::result::StepResult;
        use std::time::Duration;

        let mut w = wf();
        let step_id = StepId::new();
        w.record_result(StepResult::success(step_id, serde_json::json!(1), Duration::ZERO, 0));
        w.record_result(StepResult::success(step_id, serde_json::json!(2), Duration::ZERO, 1));
        assert_eq!(w.results.len(), 1);
        assert_eq!(w.results[0].retry_count, 1);
    }

    #[test]
    fn self_dependency_is_rejected() {
        let mut w = wf();
        let mut step = Step::new(StepVariant::Checkpoint);
        let id = step.id;
        step.dependencies.insert(id);
        w.steps.push(step);
        assert!(matches!(
            w.validate_step_references(),
            Err(CoreError::SelfDependency { .. })
        ));
    }

    #[test]
    fn transitive_cycle_is_detected() {
        let mut w = wf();
        let a = Step::new(StepVariant::Checkpoint);
        let b = Step::new(StepVariant::Checkpoint).with_dependency(a.id);
        let a_id = a.id;
        let b_id = b.id;
        let a_circular = Step { dependencies: [b_id].into(), ..a };
        w.steps.push(a_circular);
        w.steps.push(b);
        let _ = a_id;
        assert!(matches!(w.validate_step_references(), Err(CoreError::Cycle { .. })));
    }

    #[test]
    fn missing_dependency_is_rejected() {
        let mut w = wf();
        let missing = StepId::new();
        w.steps.push(Step::new(StepVariant::Checkpoint).with_dependency(missing));
        assert!(matches!(
            w.validate_step_references(),
            Err(CoreError::InvalidDependency { .. })
        ));
    }
}
