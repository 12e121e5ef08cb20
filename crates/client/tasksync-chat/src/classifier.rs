//! Heuristic detection of task-mutating assistant replies.
//!
//! The resource service offers no change-notification channel, so this
//! classifier is the sole trigger for the dashboard refresh. It is a plain
//! substring heuristic, not semantic parsing: false positives and false
//! negatives are expected and accepted.

/// Exact multi-word phrases describing a completed task operation.
const OPERATION_PHRASES: &[&str] = &[
    "task added",
    "task created",
    "task deleted",
    "task removed",
    "task updated",
    "task edited",
    "task completed",
    "task marked as done",
    "added task",
    "created task",
    "deleted task",
    "removed task",
    "updated task",
    "edited task",
    "completed task",
    "marked task",
    "added a task",
    "created a task",
    "deleted a task",
    "removed a task",
    "updated a task",
    "edited a task",
    "completed a task",
    "marked a task",
    "will be added",
    "will be created",
    "will be deleted",
    "will be removed",
    "has been added",
    "has been created",
    "has been deleted",
    "has been removed",
    "was added",
    "was created",
    "was deleted",
    "was removed",
    "marked as complete",
    "marked as completed",
    "marked as done",
    "marked as finished",
    "marked complete",
    "marked completed",
    "marked done",
    "set as complete",
    "set as completed",
    "set as done",
    "set as finished",
    "completed successfully",
    "successfully completed",
    "completion successful",
    "created successfully",
    "successfully created",
    "creation successful",
    "deleted successfully",
    "successfully deleted",
    "deletion successful",
    "updated successfully",
    "successfully updated",
    "update successful",
];

/// Fallback pairing test: an action verb plus a task-context noun.
const ACTION_VERBS: &[&str] = &[
    "add", "create", "delete", "remove", "update", "edit", "complete", "done", "finished",
    "marked",
];

const CONTEXT_NOUNS: &[&str] = &["task", "tasks", "to-do", "todo", "item", "items"];

/// True if the assistant reply likely describes a task mutation.
pub fn mentions_task_mutation(text: &str) -> bool {
    let lower = text.to_lowercase();

    if OPERATION_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
        return true;
    }

    let has_verb = ACTION_VERBS.iter().any(|verb| lower.contains(verb));
    let has_noun = CONTEXT_NOUNS.iter().any(|noun| lower.contains(noun));
    has_verb && has_noun
}
