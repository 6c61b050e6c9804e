//! A stand-in research worker.
//!
//! [`SimulatedResearcher`] walks `max_iterations` steps with a fixed delay,
//! reporting proportional progress and checking for cancellation between
//! steps. With `create_report` set it writes a Markdown report into the
//! reports directory and lists the file as an artifact.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use research_tasks::{ResearchWorker, TaskContext, TaskId, TaskInput, TaskOutput, WorkError};
use serde_json::json;

/// Default pause between research iterations.
pub const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(500);

const REPORT_SLUG_CHARS: usize = 40;

/// Simulated research worker.
#[derive(Debug, Clone)]
pub struct SimulatedResearcher {
    reports_dir: PathBuf,
    step_delay: Duration,
}

impl SimulatedResearcher {
    /// Creates a researcher writing reports into `reports_dir`.
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
            step_delay: DEFAULT_STEP_DELAY,
        }
    }

    /// Sets the pause between iterations.
    pub fn with_step_delay(mut self, step_delay: Duration) -> Self {
        self.step_delay = step_delay;
        self
    }

    /// Pause between iterations.
    pub fn step_delay(&self) -> Duration {
        self.step_delay
    }

    /// Directory reports are written into.
    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    async fn write_report(
        &self,
        task_id: TaskId,
        query: &str,
        findings: &[String],
    ) -> Result<String, WorkError> {
        tokio::fs::create_dir_all(&self.reports_dir)
            .await
            .map_err(|e| {
                WorkError::failed(format!(
                    "could not create reports directory {}: {e}",
                    self.reports_dir.display()
                ))
            })?;

        let now = Utc::now();
        let filename = format!(
            "{}_{}_{}.md",
            slug(query),
            now.format("%Y%m%d_%H%M%S"),
            &task_id.to_string()[..8]
        );
        let mut content = format!(
            "# {query}\n\n**Generated:** {}\n\n## Research Findings\n\n",
            now.format("%Y-%m-%d %H:%M:%S")
        );
        for finding in findings {
            content.push_str("- ");
            content.push_str(finding);
            content.push('\n');
        }
        content.push_str("\n---\n*Generated by research-tasks*\n");

        let path = self.reports_dir.join(&filename);
        tokio::fs::write(&path, content).await.map_err(|e| {
            WorkError::failed(format!("could not write report {}: {e}", path.display()))
        })?;
        tracing::info!(task_id = %task_id, report = %filename, "research report written");
        Ok(filename)
    }
}

#[async_trait]
impl ResearchWorker for SimulatedResearcher {
    async fn run(&self, input: TaskInput, ctx: TaskContext) -> Result<TaskOutput, WorkError> {
        let total = input.max_iterations;
        let mut findings = Vec::with_capacity(total as usize);

        for step in 1..=total {
            tokio::select! {
                () = ctx.cancelled() => {
                    tracing::debug!(task_id = %ctx.task_id(), step, "research stopped on cancellation");
                    return Err(WorkError::Cancelled);
                },
                () = tokio::time::sleep(self.step_delay) => {},
            }
            findings.push(format!(
                "Iteration {step}: reviewed sources on \"{}\"",
                input.query
            ));
            ctx.report_fraction(step, total);
        }

        let summary = format!(
            "Simulated research on \"{}\" completed in {total} iterations.",
            input.query
        );
        let mut output = TaskOutput::new(json!({
            "query": input.query,
            "summary": summary,
            "iterations": total,
            "findings": findings,
        }));

        if input.create_report {
            let report = self
                .write_report(ctx.task_id(), &input.query, &findings)
                .await?;
            output = output.with_artifact(report);
        }
        Ok(output)
    }
}

fn slug(query: &str) -> String {
    let slug: String = query
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-')
        .take(REPORT_SLUG_CHARS)
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    if slug.is_empty() {
        "research".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast(dir: &Path) -> SimulatedResearcher {
        SimulatedResearcher::new(dir).with_step_delay(Duration::from_millis(1))
    }

    #[test]
    fn slug_strips_punctuation() {
        assert_eq!(slug("What is Rust's ownership?"), "What_is_Rusts_ownership");
        assert_eq!(slug("???"), "research");
    }

    #[tokio::test]
    async fn produces_summary_without_report() {
        let dir = tempfile::tempdir().unwrap();
        let output = fast(dir.path())
            .run(
                TaskInput::new("async rust").with_max_iterations(3),
                TaskContext::detached(TaskId::new()),
            )
            .await
            .unwrap();
        assert_eq!(output.payload["iterations"], 3);
        assert!(output.artifacts.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn writes_report_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        let reports = dir.path().join("reports");
        let output = fast(&reports)
            .run(
                TaskInput::new("memory allocators")
                    .with_max_iterations(2)
                    .with_report(true),
                TaskContext::detached(TaskId::new()),
            )
            .await
            .unwrap();
        assert_eq!(output.artifacts.len(), 1);
        let content = std::fs::read_to_string(reports.join(&output.artifacts[0])).unwrap();
        assert!(content.starts_with("# memory allocators"));
        assert!(content.contains("Iteration 2"));
    }

    #[tokio::test]
    async fn unwritable_reports_dir_fails_the_task() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file in the way").unwrap();
        let err = fast(&blocker)
            .run(
                TaskInput::new("doomed report").with_max_iterations(1).with_report(true),
                TaskContext::detached(TaskId::new()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkError::Failed(msg) if msg.contains("reports directory")));
    }
}
