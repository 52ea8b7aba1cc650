//! Run summaries logged and emailed after each job.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Outcome of a single job run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Job name ("import" or "export").
    pub job: String,
    /// Unique id for this run, for log correlation.
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Named counters in display order.
    pub counters: Vec<(String, u64)>,
}

impl RunSummary {
    /// Start timing a run.
    #[must_use]
    pub fn start(job: &str) -> RunSummaryBuilder {
        RunSummaryBuilder {
            job: job.to_string(),
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            counters: Vec::new(),
        }
    }

    /// Wall-clock duration of the run.
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Plain-text rendering used for the summary email body.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = format!(
            "Job: {}\nRun id: {}\nStarted: {}\nFinished: {}\nDuration: {}s\n",
            self.job,
            self.run_id,
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.finished_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.duration().num_seconds(),
        );
        for (name, value) in &self.counters {
            out.push_str(&format!("{name}: {value}\n"));
        }
        out
    }
}

/// In-progress summary; finished with [`RunSummaryBuilder::finish`].
#[derive(Debug, Clone)]
pub struct RunSummaryBuilder {
    job: String,
    run_id: Uuid,
    started_at: DateTime<Utc>,
    counters: Vec<(String, u64)>,
}

impl RunSummaryBuilder {
    /// Record a named counter.
    pub fn counter(&mut self, name: &str, value: u64) -> &mut Self {
        self.counters.push((name.to_string(), value));
        self
    }

    /// Stamp the end time and produce the summary.
    #[must_use]
    pub fn finish(self) -> RunSummary {
        RunSummary {
            job: self.job,
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            counters: self.counters,
        }
    }
}
