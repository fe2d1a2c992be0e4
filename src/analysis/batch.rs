//! Per-sample batch runs
//!
//! A failing sample never stops the batch; failures are collected and
//! reported together once every item has been processed.

use log::{debug, warn};
use serde::Serialize;

use crate::bank::SampleId;
use crate::cancel::CancelToken;
use crate::error::AnalysisFailure;

use super::AnalysisResult;

/// Results of a batch, in input order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome<T> {
    pub succeeded: Vec<(SampleId, T)>,
    pub failed: Vec<(SampleId, AnalysisFailure)>,
    /// Items after the cancellation point were not processed
    pub cancelled: bool,
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
            cancelled: false,
        }
    }
}

impl<T> BatchOutcome<T> {
    pub fn processed(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }

    /// Same outcome with every successful value transformed
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> BatchOutcome<U> {
        BatchOutcome {
            succeeded: self
                .succeeded
                .into_iter()
                .map(|(id, value)| (id, f(value)))
                .collect(),
            failed: self.failed,
            cancelled: self.cancelled,
        }
    }
}

/// Run `op` over every item, checking `cancel` between items
///
/// `progress` receives `(done, total)` after each item.
pub fn run_batch<S, T>(
    items: &[(SampleId, S)],
    cancel: &CancelToken,
    mut op: impl FnMut(&S) -> AnalysisResult<T>,
    mut progress: impl FnMut(usize, usize),
) -> BatchOutcome<T> {
    let mut outcome = BatchOutcome::default();
    let total = items.len();
    for (done, (id, item)) in items.iter().enumerate() {
        if cancel.is_cancelled() {
            warn!("Batch cancelled after {} of {} samples", done, total);
            outcome.cancelled = true;
            break;
        }
        match op(item) {
            Ok(value) => outcome.succeeded.push((*id, value)),
            Err(failure) => {
                debug!("{}: {}", id, failure);
                outcome.failed.push((*id, failure));
            }
        }
        progress(done + 1, total);
    }
    outcome
}
