//! Task instance identity and log path rendering.

use serde::{Deserialize, Serialize};

/// Identifies one task run. Its logs are addressed per try.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskInstanceKey {
    pub dag_id: String,
    pub task_id: String,
    /// Logical date of the run, already formatted.
    pub execution_date: String,
    /// Current try, starting at 1.
    pub try_number: u32,
}

impl TaskInstanceKey {
    /// Create a task instance key.
    #[must_use]
    pub fn new(
        dag_id: impl Into<String>,
        task_id: impl Into<String>,
        execution_date: impl Into<String>,
        try_number: u32,
    ) -> Self {
        Self {
            dag_id: dag_id.into(),
            task_id: task_id.into(),
            execution_date: execution_date.into(),
            try_number,
        }
    }

    /// Render the relative log path of `try_number` from `template`.
    ///
    /// Recognized placeholders are `{dag_id}`, `{task_id}`, `{execution_date}`
    /// and `{try_number}`; anything else is copied through. The template is
    /// scanned once, so substituted values are never expanded again.
    #[must_use]
    pub fn render_filename(&self, template: &str, try_number: u32) -> String {
        let mut rendered = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find('{') {
            rendered.push_str(&rest[..start]);
            let tail = &rest[start..];

            let value = tail.find('}').and_then(|end| {
                let value = match &tail[1..end] {
                    "dag_id" => self.dag_id.clone(),
                    "task_id" => self.task_id.clone(),
                    "execution_date" => self.execution_date.clone(),
                    "try_number" => try_number.to_string(),
                    _ => return None,
                };
                Some((value, end))
            });

            match value {
                Some((value, end)) => {
                    rendered.push_str(&value);
                    rest = &tail[end + 1..];
                }
                None => {
                    rendered.push('{');
                    rest = &tail[1..];
                }
            }
        }

        rendered.push_str(rest);
        rendered
    }
}

/// Join a base location and a relative path with exactly one `/` between them.
#[must_use]
pub fn join_location(base: &str, relative: &str) -> String {
    if base.is_empty() {
        return relative.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}
