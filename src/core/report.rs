//! Per-invocation stage outcome.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use super::lock::Stage;

/// Counts reported by one stage invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: String,

    /// Items that moved forward
    pub succeeded: usize,

    /// Items left alone (unchanged, preserved, already present)
    pub skipped: usize,

    /// Items that failed this time round
    pub failed: usize,

    /// Failures needing a human: ceiling reached, write failures, bad targets
    pub permanent_failures: usize,

    /// Another invocation held the stage lock; nothing was done
    pub locked: bool,

    /// File written by digest stages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
}

impl StageReport {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage: stage.lock_name(),
            succeeded: 0,
            skipped: 0,
            failed: 0,
            permanent_failures: 0,
            locked: false,
            artifact: None,
        }
    }

    pub fn locked(stage: Stage) -> Self {
        Self {
            locked: true,
            ..Self::new(stage)
        }
    }

    /// Count a failure; `permanent` also bumps the exit-relevant counter
    pub fn record_failure(&mut self, permanent: bool) {
        self.failed += 1;
        if permanent {
            self.permanent_failures += 1;
        }
    }

    /// Fold another report into this one (multi-type process runs)
    pub fn merge(&mut self, other: StageReport) {
        self.succeeded += other.succeeded;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.permanent_failures += other.permanent_failures;
        self.locked |= other.locked;
        if other.artifact.is_some() {
            self.artifact = other.artifact;
        }
    }

    /// Process exit code: non-zero iff something needs attention
    pub fn exit_code(&self) -> u8 {
        if self.permanent_failures > 0 {
            1
        } else {
            0
        }
    }
}

impl fmt::Display for StageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.locked {
            return write!(f, "{}: locked (another run in progress)", self.stage);
        }
        write!(
            f,
            "{}: {} succeeded, {} skipped, {} failed ({} permanent)",
            self.stage, self.succeeded, self.skipped, self.failed, self.permanent_failures
        )?;
        if let Some(path) = &self.artifact {
            write!(f, " -> {}", path.display())?;
        }
        Ok(())
    }
}
