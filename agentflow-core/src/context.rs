//! ABOUTME: Workflow context: shared state threaded through step execution
//! ABOUTME: Owned by one workflow; mutated only by the step runner under the scheduler's single-writer discipline

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeChangeType {
    Create,
    Modify,
    Delete,
    Rename,
}

/// Invariant C1: this log is append-only during forward execution; a
/// rollback may truncate its suffix to a checkpoint's high-water mark but
/// never edits existing entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeChange {
    pub file: PathBuf,
    pub change_type: CodeChangeType,
    pub original_path: Option<PathBuf>,
    pub diff: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitOperation {
    pub operation_type: String,
    pub details: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub commit_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub content: Option<String>,
    pub language: Option<String>,
    pub original_content: Option<String>,
}

/// Shared state the steps read and write. Field-for-field this is the
/// typed replacement for a dynamic-language `Record<string, unknown>`
/// context: `parameters`/`stepOutputs` values are `serde_json::Value`, with
/// the tool registry's per-tool schema being the source of truth for
/// further coercion at the boundary.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkflowContext {
    pub user_input: HashMap<String, Value>,
    pub step_outputs: HashMap<String, Value>,
    pub files: Vec<FileRecord>,
    pub code_changes: Vec<CodeChange>,
    pub git_operations: Vec<GitOperation>,
    pub working_directory: PathBuf,
    pub environment: HashMap<String, String>,
}

impl WorkflowContext {
    #[must_use]
    pub fn new(working_directory: PathBuf) -> Self {
        Self {
            working_directory,
            ..Default::default()
        }
    }

    /// Writes a step output, returning `true` if this overwrote an existing
    /// key. The executor uses the return value to emit a
    /// `DuplicateOutputKey` warning.
    pub fn write_output(&mut self, key: impl Into<String>, value: Value) -> bool {
        self.step_outputs.insert(key.into(), value).is_some()
    }

    #[must_use]
    pub fn distinct_code_change_paths(&self) -> Vec<PathBuf> {
        let mut seen = Vec::new();
        for change in &self.code_changes {
            if !seen.contains(&change.file) {
                seen.push(change.file.clone());
            }
        }
        seen
    }

    /// Truncate `code_changes` at the first entry whose timestamp is `>=`
    /// the given checkpoint timestamp; entries with equal timestamps do not
    /// survive a restore.
    pub fn truncate_code_changes_at(&mut self, checkpoint_timestamp: chrono::DateTime<chrono::Utc>) {
        if let Some(cut) = self
            .code_changes
            .iter()
            .position(|c| c.timestamp >= checkpoint_timestamp)
        {
            self.code_changes.truncate(cut);
        }
    }
}

/// Renders `{{key}}` placeholders in a template string by looking up `key`
/// first in `step_outputs`, falling back to `user_input`. Used by both the
/// tool-parameter substitution and the oracle-prompt substitution paths.
#[must_use]
pub fn substitute_placeholders(template: &str, context: &WorkflowContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        if let Some(end) = after.find("}}") {
            let key = after[..end].trim();
            let replacement = context
                .step_outputs
                .get(key)
                .or_else(|| context.user_input.get(key))
                .map(value_to_display_string)
                .unwrap_or_default();
            out.push_str(&replacement);
            rest = &after[end + 2..];
        } else {
            out.push_str("{{");
            rest = after;
        }
    }
    out.push_str(rest);
    out
}

fn value_to_display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_output_reports_overwrite() {
        let mut ctx = WorkflowContext::new(PathBuf::from("."));
        assert!(!ctx.write_output("a", Value::from(1)));
        assert!(ctx.write_output("a", Value::from(2)));
    }

    #[test]
    fn substitution_prefers_step_outputs_over_user_input() {
        let mut ctx = WorkflowContext::new(PathBuf::from("."));
        ctx.user_input.insert("name".into(), Value::from("user"));
        ctx.step_outputs.insert("name".into(), Value::from("step"));
        assert_eq!(substitute_placeholders("hello {{name}}", &ctx), "hello step");
    }

    #[test]
    fn substitution_leaves_unknown_keys_blank() {
        let ctx = WorkflowContext::new(PathBuf::from("."));
        assert_eq!(substitute_placeholders("hi {{missing}}!", &ctx), "hi !");
    }

    #[test]
    fn truncate_drops_entries_at_or_after_checkpoint_time() {
        let mut ctx = WorkflowContext::new(PathBuf::from("."));
        let t0 = chrono::Utc::now();
        let t1 = t0 + chrono::Duration::seconds(1);
        ctx.code_changes.push(CodeChange {
            file: "a".into(),
            change_type: CodeChangeType::Create,
            original_path: None,
            diff: None,
            timestamp: t0,
        });
        ctx.code_changes.push(CodeChange {
            file: "b".into(),
            change_type: CodeChangeType::Create,
            original_path: None,
            diff: None,
            timestamp: t1,
        });
        ctx.truncate_code_changes_at(t1);
        assert_eq!(ctx.code_changes.len(), 1);
        assert_eq!(ctx.code_changes[0].file, PathBuf::from("a"));
    }
}
