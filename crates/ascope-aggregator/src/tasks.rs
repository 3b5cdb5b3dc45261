use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub subject: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub active_form: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub blocked_by: Vec<String>,
    pub blocks: Vec<String>,
    pub associated_tool_calls: Vec<String>,
    pub is_subagent: bool,
    pub subagent_type: Option<String>,
    pub is_goal_gate: bool,
}

impl Task {
    fn new(id: impl Into<String>, subject: impl Into<String>, status: TaskStatus, now: DateTime<Utc>) -> Self {
        let mut task = Task {
            id: id.into(),
            subject: subject.into(),
            description: None,
            status,
            active_form: None,
            created_at: now,
            updated_at: now,
            blocked_by: Vec::new(),
            blocks: Vec::new(),
            associated_tool_calls: Vec::new(),
            is_subagent: false,
            subagent_type: None,
            is_goal_gate: false,
        };
        task.recompute_goal_gate();
        task
    }

    fn recompute_goal_gate(&mut self) {
        self.is_goal_gate = self.blocks.len() >= 3
            || matches_goal_gate_keywords(&self.subject)
            || self.description.as_deref().is_some_and(matches_goal_gate_keywords);
    }
}

/// Approximates `(?i)\b(CRITICAL|MUST|blocker|required|must.?complete|goal.?gate|essential|do.?not.?skip|blocking)\b`
/// without pulling in a regex engine: single-word keywords are matched on
/// word boundaries by splitting on non-alphanumerics, and the handful of
/// keywords that tolerate an optional separator (`must complete`, `must-complete`,
/// `goal gate`, `do not skip`) are matched against the text with all
/// non-alphanumeric characters collapsed out.
fn matches_goal_gate_keywords(text: &str) -> bool {
    let lower = text.to_lowercase();
    let collapsed: String = lower.chars().filter(|c| c.is_alphanumeric()).collect();
    if collapsed.contains("mustcomplete") || collapsed.contains("goalgate") || collapsed.contains("donotskip") {
        return true;
    }

    const SINGLE_WORD_KEYWORDS: &[&str] = &["critical", "must", "blocker", "required", "essential", "blocking"];
    lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| SINGLE_WORD_KEYWORDS.contains(&word))
}

const BLOCKING_PHRASES: &[&str] = &["blocked by", "depends on", "waiting on", "requires"];

#[derive(Debug, Clone)]
struct PendingCreate {
    subject: String,
    description: Option<String>,
}

/// Derived from every tool the two bundled producers use to manage task
/// state: `TaskCreate`/`TaskUpdate`/`Task` (subagent spawn) on the Claude
/// side, `TodoWrite` on both, `UpdatePlan` on the Codex side. At most one
/// task has status `InProgress` and is referenced by `active_task_id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskBoard {
    pub tasks: Vec<Task>,
    pub active_task_id: Option<String>,

    /// `TaskCreate` calls awaiting their `tool_result` before a numeric task
    /// id can be extracted from it. Transient, like the aggregator's own
    /// pending-tool-call map: dropped on reset/restore.
    #[serde(skip)]
    pending_creates: HashMap<String, PendingCreate>,
}

impl TaskBoard {
    /// Replace the set of non-subagent tasks wholesale from a `TodoWrite`
    /// tool call's `input` payload: `{"todos": [{"content": "...", "status": "pending", ...}]}`.
    /// Subagent tasks survive a `TodoWrite` untouched; they are a separate
    /// lifecycle driven by the `Task` tool.
    pub fn apply_todo_write(&mut self, input: &Value, now: DateTime<Utc>) {
        let Some(todos) = input.get("todos").and_then(|v| v.as_array()) else {
            return;
        };

        let mut todo_tasks: Vec<Task> = todos
            .iter()
            .enumerate()
            .map(|(idx, todo)| {
                let content = todo.get("content").and_then(|v| v.as_str()).unwrap_or_default();
                let status = match todo.get("status").and_then(|v| v.as_str()) {
                    Some("in_progress") => TaskStatus::InProgress,
                    Some("completed") => TaskStatus::Completed,
                    _ => TaskStatus::Pending,
                };
                let active_form = todo.get("activeForm").and_then(|v| v.as_str()).map(|s| s.to_string());
                let mut task = Task::new(format!("todo-{idx}"), content, status, now);
                task.active_form = active_form;
                task
            })
            .collect();

        derive_blocking_edges(&mut todo_tasks);
        for task in &mut todo_tasks {
            task.recompute_goal_gate();
        }

        let active_from_todos = todo_tasks.iter().find(|t| t.status == TaskStatus::InProgress).map(|t| t.id.clone());

        self.tasks.retain(|t| t.is_subagent);
        self.tasks.extend(todo_tasks);

        self.active_task_id = active_from_todos.or_else(|| {
            self.active_task_id
                .clone()
                .filter(|id| self.tasks.iter().any(|t| &t.id == id && t.status == TaskStatus::InProgress))
        });
    }

    /// `TaskCreate` tool_use: stash the proposed subject/description until the
    /// matching `tool_result` reveals the provider-assigned numeric id.
    pub fn begin_task_create(&mut self, tool_use_id: &str, input: &Value) {
        let subject = input.get("subject").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let description = input.get("description").and_then(|v| v.as_str()).map(|s| s.to_string());
        self.pending_creates.insert(tool_use_id.to_string(), PendingCreate { subject, description });
    }

    /// `TaskCreate`'s matching `tool_result`. A numeric id is extracted from
    /// free text (`"Task #N created"`) or a JSON body (`{"taskId": N}`); a
    /// failed creation (`is_error`) or an unparseable result id discards the
    /// pending entry without materializing a task.
    pub fn complete_task_create(&mut self, tool_use_id: &str, is_error: bool, result_text: &str, now: DateTime<Utc>) {
        let Some(pending) = self.pending_creates.remove(tool_use_id) else {
            return;
        };
        if is_error {
            return;
        }
        let Some(number) = extract_task_number(result_text) else {
            return;
        };
        let mut task = Task::new(format!("task-{number}"), pending.subject, TaskStatus::Pending, now);
        task.description = pending.description;
        task.recompute_goal_gate();
        self.tasks.push(task);
    }

    /// `TaskUpdate` tool_use: applied immediately rather than on its result,
    /// since the update itself (not a provider-reported outcome) is the
    /// state change. An id with no existing task creates a placeholder so a
    /// later-arriving `TaskCreate` result does not collide.
    pub fn apply_task_update(&mut self, input: &Value, now: DateTime<Utc>) {
        let Some(id_value) = input.get("task_id").or_else(|| input.get("taskId")) else {
            return;
        };
        let id = match id_value {
            Value::String(s) => format!("task-{s}"),
            Value::Number(n) => format!("task-{n}"),
            _ => return,
        };

        if !self.tasks.iter().any(|t| t.id == id) {
            self.tasks.push(Task::new(id.clone(), "", TaskStatus::Pending, now));
        }

        let new_status = input.get("status").and_then(|v| v.as_str()).map(|s| match s {
            "in_progress" => TaskStatus::InProgress,
            "completed" => TaskStatus::Completed,
            "deleted" => TaskStatus::Deleted,
            _ => TaskStatus::Pending,
        });

        if new_status == Some(TaskStatus::Deleted) {
            self.tasks.retain(|t| t.id != id);
            if self.active_task_id.as_deref() == Some(id.as_str()) {
                self.active_task_id = None;
            }
            return;
        }

        let was_active = self.active_task_id.as_deref() == Some(id.as_str());
        if let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) {
            if let Some(subject) = input.get("subject").and_then(|v| v.as_str()) {
                task.subject = subject.to_string();
            }
            if let Some(description) = input.get("description").and_then(|v| v.as_str()) {
                task.description = Some(description.to_string());
            }
            if let Some(active_form) = input.get("active_form").and_then(|v| v.as_str()) {
                task.active_form = Some(active_form.to_string());
            }
            if let Some(blocked_by) = input.get("blocked_by").and_then(|v| v.as_array()) {
                task.blocked_by.extend(blocked_by.iter().filter_map(|v| v.as_str()).map(|s| s.to_string()));
            }
            if let Some(blocks) = input.get("blocks").and_then(|v| v.as_array()) {
                task.blocks.extend(blocks.iter().filter_map(|v| v.as_str()).map(|s| s.to_string()));
            }
            if let Some(status) = new_status {
                task.status = status;
            }
            task.updated_at = now;
            task.recompute_goal_gate();
        }

        if new_status == Some(TaskStatus::InProgress) {
            self.active_task_id = Some(id);
        } else if was_active && new_status.is_some() {
            self.active_task_id = None;
        }
    }

    /// `Task` tool_use spawning a subagent: synthesizes `agent-<tool_use_id>`,
    /// immediately `InProgress` (a subagent call is, by construction, already
    /// running once issued).
    pub fn begin_subagent(&mut self, tool_use_id: &str, input: &Value, now: DateTime<Utc>) {
        let subagent_type = input.get("subagent_type").and_then(|v| v.as_str()).map(|s| s.to_string());
        let description = input.get("description").and_then(|v| v.as_str()).unwrap_or("subagent").to_string();
        let mut task = Task::new(format!("agent-{tool_use_id}"), description, TaskStatus::InProgress, now);
        task.is_subagent = true;
        task.subagent_type = subagent_type;
        task.recompute_goal_gate();
        self.tasks.push(task);
    }

    /// The subagent's matching `tool_result`: `Completed` normally, `Deleted`
    /// on error (an abandoned subagent is not a task still worth tracking).
    pub fn complete_subagent(&mut self, tool_use_id: &str, is_error: bool, now: DateTime<Utc>) {
        let id = format!("agent-{tool_use_id}");
        if is_error {
            self.tasks.retain(|t| t.id != id);
            return;
        }
        if let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) {
            task.status = TaskStatus::Completed;
            task.updated_at = now;
        }
    }

    /// A Codex `UpdatePlan` tool call also mirrors its steps into the task
    /// board as `plan-{i}` entries, dually with [`crate::PlanState`].
    pub fn apply_update_plan(&mut self, input: &Value, now: DateTime<Utc>) {
        let Some(steps) = input.get("plan").and_then(|v| v.as_array()) else {
            return;
        };
        let plan_tasks: Vec<Task> = steps
            .iter()
            .enumerate()
            .map(|(idx, step)| {
                let description = step
                    .get("step")
                    .or_else(|| step.get("description"))
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                let status = match step.get("status").and_then(|v| v.as_str()) {
                    Some("in_progress") => TaskStatus::InProgress,
                    Some("completed") | Some("complete") => TaskStatus::Completed,
                    _ => TaskStatus::Pending,
                };
                Task::new(format!("plan-{idx}"), description, status, now)
            })
            .collect();

        self.active_task_id = plan_tasks.iter().find(|t| t.status == TaskStatus::InProgress).map(|t| t.id.clone());
        self.tasks.retain(|t| !t.id.starts_with("plan-"));
        self.tasks.extend(plan_tasks);
    }

    /// True if `active_task_id` names a task currently on the board with
    /// status `InProgress`, or is `None`.
    pub fn is_valid_active_task(&self) -> bool {
        match &self.active_task_id {
            None => true,
            Some(id) => self.tasks.iter().any(|t| &t.id == id && t.status == TaskStatus::InProgress),
        }
    }

    pub fn completion_rate(&self) -> f64 {
        if self.tasks.is_empty() {
            return 0.0;
        }
        let completed = self.tasks.iter().filter(|t| t.status == TaskStatus::Completed).count();
        completed as f64 / self.tasks.len() as f64
    }

    pub fn reset(&mut self) {
        self.tasks.clear();
        self.active_task_id = None;
        self.pending_creates.clear();
    }
}

fn extract_task_number(text: &str) -> Option<u64> {
    if let Ok(value) = serde_json::from_str::<Value>(text)
        && let Some(n) = value.get("taskId").and_then(|v| v.as_u64())
    {
        return Some(n);
    }
    let marker = "Task #";
    let pos = text.find(marker)?;
    let rest = &text[pos + marker.len()..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() { None } else { digits.parse().ok() }
}

/// For each task, scans its subject for one of the blocking-reference
/// phrases (`blocked by`, `depends on`, `waiting on`, `requires`) and checks
/// whether the text following it contains another task's subject as a
/// case-insensitive substring; if so, the referrer is `blocked_by` the
/// referee and the referee `blocks` the referrer.
fn derive_blocking_edges(tasks: &mut [Task]) {
    let lower_subjects: Vec<String> = tasks.iter().map(|t| t.subject.to_lowercase()).collect();
    let mut edges = Vec::new();

    for (i, subject) in lower_subjects.iter().enumerate() {
        let Some(marker_end) = BLOCKING_PHRASES.iter().find_map(|phrase| subject.find(phrase).map(|pos| pos + phrase.len())) else {
            continue;
        };
        let suffix = &subject[marker_end..];
        for (j, other_subject) in lower_subjects.iter().enumerate() {
            let trimmed = other_subject.trim();
            if i != j && !trimmed.is_empty() && suffix.contains(trimmed) {
                edges.push((i, j));
            }
        }
    }

    for (referrer, referee) in edges {
        let referee_id = tasks[referee].id.clone();
        tasks[referrer].blocked_by.push(referee_id);
        let referrer_id = tasks[referrer].id.clone();
        tasks[referee].blocks.push(referrer_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn replaces_board_wholesale_and_tracks_active_task() {
        let mut board = TaskBoard::default();
        board.apply_todo_write(
            &json!({
                "todos": [
                    {"content": "write spec", "status": "completed"},
                    {"content": "implement", "status": "in_progress"},
                    {"content": "test", "status": "pending"},
                ]
            }),
            now(),
        );
        assert_eq!(board.tasks.len(), 3);
        assert_eq!(board.active_task_id.as_deref(), Some("todo-1"));
        assert!((board.completion_rate() - (1.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn blocking_references_are_parsed_from_todo_text() {
        let mut board = TaskBoard::default();
        board.apply_todo_write(
            &json!({"todos": [
                {"content": "A", "status": "pending"},
                {"content": "B (blocked by A)", "status": "pending"},
                {"content": "C", "status": "pending"},
            ]}),
            now(),
        );
        assert_eq!(board.tasks[1].blocked_by, vec!["todo-0"]);
        assert_eq!(board.tasks[0].blocks, vec!["todo-1"]);
        assert!(board.tasks[2].blocked_by.is_empty());
    }

    #[test]
    fn todo_write_preserves_subagent_tasks() {
        let mut board = TaskBoard::default();
        board.begin_subagent("call-1", &json!({"subagent_type": "researcher"}), now());
        board.apply_todo_write(&json!({"todos": [{"content": "a", "status": "pending"}]}), now());
        assert_eq!(board.tasks.len(), 2);
        assert!(board.tasks.iter().any(|t| t.is_subagent));
    }

    #[test]
    fn second_write_fully_replaces_non_subagent_tasks() {
        let mut board = TaskBoard::default();
        board.apply_todo_write(&json!({"todos": [{"content": "a", "status": "pending"}]}), now());
        board.apply_todo_write(&json!({"todos": [{"content": "b", "status": "completed"}]}), now());
        assert_eq!(board.tasks.len(), 1);
        assert_eq!(board.tasks[0].subject, "b");
    }

    #[test]
    fn task_create_materializes_on_matching_result() {
        let mut board = TaskBoard::default();
        board.begin_task_create("call-1", &json!({"subject": "fix the bug"}));
        board.complete_task_create("call-1", false, "Task #7 created", now());
        assert_eq!(board.tasks.len(), 1);
        assert_eq!(board.tasks[0].id, "task-7");
        assert_eq!(board.tasks[0].subject, "fix the bug");
    }

    #[test]
    fn failed_task_create_result_discards_pending_entry() {
        let mut board = TaskBoard::default();
        board.begin_task_create("call-1", &json!({"subject": "x"}));
        board.complete_task_create("call-1", true, "error", now());
        assert!(board.tasks.is_empty());
    }

    #[test]
    fn task_update_moves_status_and_sets_active_task() {
        let mut board = TaskBoard::default();
        board.apply_task_update(&json!({"task_id": "7", "status": "in_progress"}), now());
        assert_eq!(board.active_task_id.as_deref(), Some("task-7"));

        board.apply_task_update(&json!({"task_id": "7", "status": "completed"}), now());
        assert!(board.active_task_id.is_none());
    }

    #[test]
    fn task_update_deleted_removes_task_and_clears_active() {
        let mut board = TaskBoard::default();
        board.apply_task_update(&json!({"task_id": "7", "status": "in_progress"}), now());
        board.apply_task_update(&json!({"task_id": "7", "status": "deleted"}), now());
        assert!(board.tasks.is_empty());
        assert!(board.active_task_id.is_none());
    }

    #[test]
    fn subagent_lifecycle_completes_or_deletes_on_error() {
        let mut board = TaskBoard::default();
        board.begin_subagent("call-1", &json!({"subagent_type": "reviewer"}), now());
        assert_eq!(board.tasks[0].status, TaskStatus::InProgress);
        board.complete_subagent("call-1", false, now());
        assert_eq!(board.tasks[0].status, TaskStatus::Completed);

        board.begin_subagent("call-2", &json!({}), now());
        board.complete_subagent("call-2", true, now());
        assert!(board.tasks.iter().all(|t| t.id != "agent-call-2"));
    }

    #[test]
    fn goal_gate_set_by_keyword_or_by_blocking_three_tasks() {
        let mut board = TaskBoard::default();
        board.apply_task_update(&json!({"task_id": "1", "subject": "MUST fix before release"}), now());
        assert!(board.tasks[0].is_goal_gate);

        board.apply_task_update(&json!({"task_id": "2", "subject": "ordinary task"}), now());
        board.apply_task_update(&json!({"task_id": "2", "blocks": ["a", "b", "c"]}), now());
        assert!(board.tasks.iter().find(|t| t.id == "task-2").unwrap().is_goal_gate);
    }

    #[test]
    fn active_task_id_invalid_after_reset() {
        let mut board = TaskBoard::default();
        board.apply_todo_write(&json!({"todos": [{"content": "a", "status": "in_progress"}]}), now());
        assert!(board.is_valid_active_task());
        board.reset();
        assert!(board.tasks.is_empty());
        assert!(board.active_task_id.is_none());
    }

    #[test]
    fn malformed_input_without_todos_array_is_ignored() {
        let mut board = TaskBoard::default();
        board.apply_todo_write(&json!({"not_todos": []}), now());
        assert!(board.tasks.is_empty());
    }
}
