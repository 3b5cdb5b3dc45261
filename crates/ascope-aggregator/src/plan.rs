use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: String,
    pub description: String,
    pub status: PlanStepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub tokens_used: Option<u64>,
    pub tool_calls: Option<u64>,
    pub output: Option<String>,
    pub error_message: Option<String>,
    pub complexity: Option<String>,
}

impl PlanStep {
    fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            status: PlanStepStatus::Pending,
            started_at: None,
            completed_at: None,
            duration_ms: None,
            tokens_used: None,
            tool_calls: None,
            output: None,
            error_message: None,
            complexity: None,
        }
    }
}

/// Codex-style `UpdatePlan` snapshots and Claude-style `EnterPlanMode` /
/// `ExitPlanMode` transitions both converge on this one structure; the two
/// producers disagree on *when* a plan exists but not on *what* one looks
/// like once materialized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanState {
    pub active: bool,
    pub steps: Vec<PlanStep>,
    pub title: Option<String>,
    pub source: Option<String>,
    pub entered_at: Option<DateTime<Utc>>,
    pub exited_at: Option<DateTime<Utc>>,
    pub total_duration_ms: Option<i64>,
    pub completion_rate: f64,
    pub revision: u32,
    pub raw_markdown: Option<String>,

    /// Assistant text accumulated while `active`, joined as the fallback plan
    /// source if no plan file was written during this revision. Not part of
    /// the round-trip snapshot's observable surface beyond what it produces
    /// on exit, but kept here (not skipped) since a mid-session restore must
    /// not lose an in-progress plan draft.
    collected_text: Vec<String>,
    /// Content of the most recent `.claude/plans/*.md` `Write` during this
    /// plan-mode revision, preferred over `collected_text` on exit.
    written_markdown: Option<String>,
}

impl PlanState {
    pub fn enter(&mut self, timestamp: DateTime<Utc>) {
        if self.active {
            self.revision += 1;
        }
        self.active = true;
        self.entered_at = Some(timestamp);
        self.collected_text.clear();
        self.written_markdown = None;
    }

    pub fn collect_assistant_text(&mut self, text: &str) {
        if self.active && !text.trim().is_empty() {
            self.collected_text.push(text.to_string());
        }
    }

    /// Called for every `Write` tool call while a plan is active; only a
    /// write under `.claude/plans/` ending in `.md` is treated as the plan
    /// document.
    pub fn note_plan_file_write(&mut self, path: &str, content: &str) {
        if self.active && path.contains(".claude/plans/") && path.ends_with(".md") {
            self.written_markdown = Some(content.to_string());
        }
    }

    /// Materializes the plan from, in order of preference: a plan file
    /// written during this revision, the accumulated assistant text, or a
    /// host-provided fallback read of the last-seen edit target.
    pub fn exit(&mut self, timestamp: DateTime<Utc>, fallback_read: impl FnOnce() -> Option<String>) {
        let source_text = self
            .written_markdown
            .take()
            .or_else(|| {
                if self.collected_text.is_empty() {
                    None
                } else {
                    Some(self.collected_text.join("\n"))
                }
            })
            .or_else(fallback_read);

        self.active = false;
        self.exited_at = Some(timestamp);
        self.total_duration_ms = self
            .entered_at
            .map(|entered| (timestamp - entered).num_milliseconds());

        if let Some(markdown) = source_text {
            let (title, step_descriptions) = parse_plan_markdown(&markdown);
            self.title = title;
            self.steps = step_descriptions
                .into_iter()
                .enumerate()
                .map(|(idx, desc)| PlanStep::new(format!("step-{idx}"), desc))
                .collect();
            self.raw_markdown = Some(markdown);
        }
        self.recompute_completion_rate();
    }

    /// A Codex `UpdatePlan` tool call replaces the step list wholesale with
    /// the producer's own view of plan progress.
    pub fn apply_update_plan(&mut self, input: &Value) {
        let Some(steps) = input.get("plan").and_then(|v| v.as_array()) else {
            return;
        };
        self.active = true;
        self.source = Some("codex_update_plan".to_string());
        self.steps = steps
            .iter()
            .enumerate()
            .map(|(idx, step)| {
                let description = step
                    .get("step")
                    .or_else(|| step.get("description"))
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let status = match step.get("status").and_then(|v| v.as_str()) {
                    Some("in_progress") => PlanStepStatus::InProgress,
                    Some("completed") | Some("complete") => PlanStepStatus::Completed,
                    Some("failed") => PlanStepStatus::Failed,
                    Some("skipped") => PlanStepStatus::Skipped,
                    _ => PlanStepStatus::Pending,
                };
                let mut step = PlanStep::new(format!("step-{idx}"), description);
                step.status = status;
                step
            })
            .collect();
        self.recompute_completion_rate();
    }

    /// On session end: unfinished steps are finalized rather than left
    /// dangling mid-state.
    pub fn finalize(&mut self, last_error: Option<&str>) {
        for step in &mut self.steps {
            match step.status {
                PlanStepStatus::InProgress => {
                    step.status = PlanStepStatus::Failed;
                    step.error_message = last_error.map(|s| s.to_string());
                }
                PlanStepStatus::Pending => step.status = PlanStepStatus::Skipped,
                _ => {}
            }
        }
        self.recompute_completion_rate();
    }

    fn recompute_completion_rate(&mut self) {
        self.completion_rate = if self.steps.is_empty() {
            0.0
        } else {
            let completed = self.steps.iter().filter(|s| s.status == PlanStepStatus::Completed).count();
            completed as f64 / self.steps.len() as f64
        };
    }

    pub fn reset(&mut self) {
        *self = PlanState::default();
    }
}

/// Extracts a title (first `# ` heading line) and ordered step descriptions
/// (lines starting with `-`, `*`, or `N.`) from a plan document.
fn parse_plan_markdown(markdown: &str) -> (Option<String>, Vec<String>) {
    let mut title = None;
    let mut steps = Vec::new();

    for line in markdown.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if title.is_none() {
            if let Some(heading) = trimmed.strip_prefix("# ") {
                title = Some(heading.trim().to_string());
                continue;
            }
        }
        if let Some(item) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
            steps.push(item.trim().to_string());
        } else if let Some(rest) = trimmed.split_once(". ")
            && rest.0.chars().all(|c| c.is_ascii_digit())
            && !rest.0.is_empty()
        {
            steps.push(rest.1.trim().to_string());
        }
    }

    (title, steps)
}
