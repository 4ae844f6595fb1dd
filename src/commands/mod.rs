// Commands that change the cluster
pub mod apply;
pub mod destroy;
pub mod import;

// Commands that only read
pub mod refresh;
pub mod status;

use anyhow::Result;
use rayon::prelude::*;
use std::fmt::Write as _;

use crate::state::CredentialDigests;
use crate::ui;
use crate::Context;
use userkit::UserState;

/// Result of reconciling one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyResult {
    /// No changes needed
    NoChange,
    /// User was created
    Created,
    /// User was updated
    Modified { fields: String },
    /// User was deleted
    Removed,
    /// The cluster no longer matches the config
    Drifted { fields: String },
    /// Reconciliation failed
    Failed { error: String, advice: &'static str },
    /// Nothing was sent
    Skipped { reason: String },
}

impl ApplyResult {
    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// Counts of results across a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub created: usize,
    pub modified: usize,
    pub removed: usize,
    pub drifted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub no_change: usize,
}

impl Summary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.modified + self.removed
    }

    /// Check if the run was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, result: &ApplyResult) {
        match result {
            ApplyResult::NoChange => self.no_change += 1,
            ApplyResult::Created => self.created += 1,
            ApplyResult::Modified { .. } => self.modified += 1,
            ApplyResult::Removed => self.removed += 1,
            ApplyResult::Drifted { .. } => self.drifted += 1,
            ApplyResult::Failed { .. } => self.failed += 1,
            ApplyResult::Skipped { .. } => self.skipped += 1,
        }
    }

    /// One-line description, e.g. "1 created, 2 unchanged"
    pub fn line(&self) -> String {
        let mut line = String::new();
        for (count, label) in [
            (self.created, "created"),
            (self.modified, "updated"),
            (self.removed, "deleted"),
            (self.drifted, "drifted"),
            (self.skipped, "planned"),
            (self.failed, "failed"),
            (self.no_change, "unchanged"),
        ] {
            if count > 0 {
                if !line.is_empty() {
                    line.push_str(", ");
                }
                let _ = write!(line, "{count} {label}");
            }
        }
        if line.is_empty() {
            line.push_str("nothing to do");
        }
        line
    }
}

/// What happened to one user, and what to remember about it
#[derive(Debug)]
pub struct UserOutcome {
    pub username: String,
    pub result: ApplyResult,
    pub state: UserState,
    /// Digests of credentials that reached the cluster
    pub credentials: Option<CredentialDigests>,
}

impl UserOutcome {
    pub fn new(username: impl Into<String>, state: UserState, result: ApplyResult) -> Self {
        Self {
            username: username.into(),
            result,
            state,
            credentials: None,
        }
    }

    pub fn failed(username: impl Into<String>, state: UserState, err: &userkit::Error) -> Self {
        let username = username.into();
        let category = err.category();
        log::debug!("{username}: {} error: {err}", category.description());
        Self::new(
            username,
            state,
            ApplyResult::Failed {
                error: err.to_string(),
                advice: category.advice(),
            },
        )
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: CredentialDigests) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

/// Run one task per item on a pool of `jobs` threads.
///
/// Outcomes are returned sorted by username.
pub fn run_parallel<T, F>(items: &[T], jobs: usize, task: F) -> Result<Vec<UserOutcome>>
where
    T: Sync,
    F: Fn(&T) -> UserOutcome + Sync,
{
    let mut outcomes: Vec<UserOutcome> = if jobs <= 1 || items.len() <= 1 {
        items.iter().map(&task).collect()
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create thread pool: {}", e))?;
        pool.install(|| items.par_iter().map(&task).collect())
    };
    outcomes.sort_by(|a, b| a.username.cmp(&b.username));
    Ok(outcomes)
}

/// Print each outcome and tally them
pub fn report(ctx: &Context, outcomes: &[UserOutcome]) -> Summary {
    let mut summary = Summary::default();
    for outcome in outcomes {
        summary.add_result(&outcome.result);
        if ctx.quiet && outcome.result.is_success() {
            continue;
        }
        print_result(ctx, &outcome.username, &outcome.result);
    }
    summary
}

fn print_result(ctx: &Context, username: &str, result: &ApplyResult) {
    match result {
        ApplyResult::NoChange => {
            if ctx.verbose > 0 {
                ui::dim(&format!("{username}: unchanged"));
            }
        }
        ApplyResult::Created => ui::success(&format!("{username}: created")),
        ApplyResult::Modified { fields } => ui::success(&format!("{username}: updated {fields}")),
        ApplyResult::Removed => ui::success(&format!("{username}: deleted")),
        ApplyResult::Drifted { fields } => ui::warn(&format!("{username}: drifted ({fields})")),
        ApplyResult::Skipped { reason } => ui::info(&format!("{username}: {reason}")),
        ApplyResult::Failed { error, advice } => {
            ui::error(&format!("{username}: {error}"));
            ui::dim(advice);
        }
    }
}

/// Print the summary line and fail the command if any user failed
pub fn finish(ctx: &Context, summary: &Summary) -> Result<()> {
    if !ctx.quiet {
        println!();
        ui::kv("Summary", &summary.line());
    }
    if !summary.is_success() {
        anyhow::bail!("{} of {} users failed", summary.failed, summary_total(summary));
    }
    Ok(())
}

fn summary_total(summary: &Summary) -> usize {
    summary.total_changes()
        + summary.drifted
        + summary.skipped
        + summary.failed
        + summary.no_change
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_line() {
        let mut summary = Summary::default();
        assert_eq!(summary.line(), "nothing to do");

        summary.add_result(&ApplyResult::Created);
        summary.add_result(&ApplyResult::NoChange);
        summary.add_result(&ApplyResult::NoChange);
        assert_eq!(summary.line(), "1 created, 2 unchanged");
        assert_eq!(summary.total_changes(), 1);
        assert!(summary.is_success());

        summary.add_result(&ApplyResult::Failed {
            error: "boom".to_string(),
            advice: "retry",
        });
        assert!(!summary.is_success());
        assert_eq!(summary_total(&summary), 4);
    }

    #[test]
    fn test_run_parallel_sorts_outcomes() {
        let names = ["carol", "alice", "bob"];
        for jobs in [1, 3] {
            let outcomes = run_parallel(&names, jobs, |name| {
                UserOutcome::new(*name, UserState::Absent, ApplyResult::NoChange)
            })
            .unwrap();
            let order: Vec<_> = outcomes.iter().map(|o| o.username.as_str()).collect();
            assert_eq!(order, ["alice", "bob", "carol"]);
        }
    }

    #[test]
    fn test_failed_outcome_carries_advice() {
        let err = userkit::Error::UnsupportedClient {
            found: "opensearch".to_string(),
        };
        let outcome = UserOutcome::failed("alice", UserState::Absent, &err);
        match outcome.result {
            ApplyResult::Failed { error, advice } => {
                assert!(error.contains("opensearch"));
                assert_eq!(advice, err.category().advice());
            }
            other => panic!("Expected failure, got {other:?}"),
        }
        assert!(outcome.credentials.is_none());
    }
}
