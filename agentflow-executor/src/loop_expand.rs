//! ABOUTME: Materializes one iteration of a Loop step's body into concrete, scheduled steps
//! ABOUTME: Iterations run strictly sequentially, chained by dependency, since the body shares one context slot for `item_key`

use agentflow_core::{Step, StepId, StepStatus, Workflow};
use std::collections::HashMap;

/// Clones the steps named in `body_steps` into fresh steps with
/// deterministic, iteration-suffixed ids, remaps their internal
/// dependencies to the clones, chains the first clone onto `depends_on`,
/// and appends them to `workflow.steps`. Returns the id of the clone that
/// should be watched for completion before either the next iteration is
/// expanded or the loop is finalized.
///
/// Iteration suffixing is deterministic (`StepId::from_name`) so re-running
/// this against the same loop step and iteration index always produces the
/// same ids, matching how the planner already derives synthetic step ids.
pub fn expand_iteration(
    workflow: &mut Workflow,
    loop_step_id: StepId,
    body_steps: &[StepId],
    iteration: usize,
    depends_on: StepId,
) -> Option<StepId> {
    if body_steps.is_empty() {
        return None;
    }

    let mut id_map: HashMap<StepId, StepId> = HashMap::new();
    for template_id in body_steps {
        let clone_id = StepId::from_name(&format!("{loop_step_id}_iter{iteration}_{template_id}"));
        id_map.insert(*template_id, clone_id);
    }

    let mut last_id = None;
    for template_id in body_steps {
        let Some(template) = workflow.step(*template_id) else {
            continue;
        };
        let clone_id = id_map[template_id];
        let mut clone = clone_step_with_new_id(template, clone_id);

        // Internal body dependencies point at the previous template id;
        // remap them to this iteration's clones so the chain stays inside
        // the iteration.
        let remapped: std::collections::HashSet<StepId> = clone
            .dependencies
            .iter()
            .map(|dep| id_map.get(dep).copied().unwrap_or(*dep))
            .collect();
        clone.dependencies = remapped;

        // A clone with no in-body predecessor is the iteration's entry
        // point; it must wait for the previous iteration (or the Loop step
        // itself) to finish first.
        let has_in_body_dep = clone.dependencies.iter().any(|d| id_map.values().any(|v| v == d));
        if !has_in_body_dep {
            clone.dependencies.insert(depends_on);
        }

        workflow.steps.push(clone);
        last_id = Some(clone_id);
    }
    last_id
}

fn clone_step_with_new_id(template: &Step, new_id: StepId) -> Step {
    Step {
        id: new_id,
        variant: template.variant.clone(),
        dependencies: template.dependencies.clone(),
        status: StepStatus::Pending,
        retry_config: template.retry_config,
        rollback_action: template.rollback_action.clone(),
        started_at: None,
        completed_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentflow_core::{StepVariant, WorkflowContext};
    use std::path::PathBuf;

    fn wf() -> Workflow {
        Workflow::new("n".into(), "d".into(), "r".into(), WorkflowContext::new(PathBuf::from(".")))
    }

    #[test]
    fn expands_a_single_body_step_chained_to_depends_on() {
        let mut workflow = wf();
        let loop_id = StepId::new();
        let body = Step::new(StepVariant::Tool { name: "t".into(), parameters: Default::default() });
        let body_id = body.id;
        workflow.steps.push(body);

        let last = expand_iteration(&mut workflow, loop_id, &[body_id], 0, loop_id).unwrap();
        let clone = workflow.step(last).unwrap();
        assert!(clone.dependencies.contains(&loop_id));
        assert_ne!(last, body_id);
    }

    #[test]
    fn same_iteration_index_is_deterministic() {
        let mut workflow = wf();
        let loop_id = StepId::new();
        let body = Step::new(StepVariant::Tool { name: "t".into(), parameters: Default::default() });
        let body_id = body.id;
        workflow.steps.push(body);

        let first = expand_iteration(&mut workflow, loop_id, &[body_id], 3, loop_id);
        let second = expand_iteration(&mut workflow, loop_id, &[body_id], 3, loop_id);
        assert_eq!(first, second);
    }

    #[test]
    fn chains_two_body_steps_internally() {
        let mut workflow = wf();
        let loop_id = StepId::new();
        let a = Step::new(StepVariant::Tool { name: "a".into(), parameters: Default::default() });
        let a_id = a.id;
        let b = Step::new(StepVariant::Tool { name: "b".into(), parameters: Default::default() }).with_dependency(a_id);
        let b_id = b.id;
        workflow.steps.push(a);
        workflow.steps.push(b);

        let before = workflow.steps.len();
        let last = expand_iteration(&mut workflow, loop_id, &[a_id, b_id], 0, loop_id).unwrap();
        assert_eq!(workflow.steps.len(), before + 2);
        let clone_b = workflow.step(last).unwrap();
        assert!(!clone_b.dependencies.contains(&a_id));
        assert!(!clone_b.dependencies.contains(&loop_id));
    }
}
