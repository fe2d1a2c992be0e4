//! Background analysis
//!
//! A worker thread runs a batch over a snapshot of samples while the
//! document stays editable. Progress arrives on a channel; the outcome is
//! collected with [`AnalysisWorker::join`] and written back through the
//! regular document commands.

use std::any::Any;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use log::{debug, error};

use crate::analysis::{run_batch, AnalysisResult, BatchOutcome};
use crate::bank::{Sample, SampleId};
use crate::cancel::CancelToken;
use crate::error::{BankError, Result};

use super::document::SharedDocument;

/// Messages from a running worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerEvent {
    Progress { done: usize, total: usize },
}

/// Handle on a batch running in its own thread
pub struct AnalysisWorker<T> {
    handle: JoinHandle<BatchOutcome<T>>,
    events: Receiver<WorkerEvent>,
    cancel: CancelToken,
}

impl<T: Send + 'static> AnalysisWorker<T> {
    /// Start `op` over `items` on a new thread
    pub fn spawn<S, F>(items: Vec<(SampleId, S)>, mut op: F) -> Result<Self>
    where
        S: Send + 'static,
        F: FnMut(&S) -> AnalysisResult<T> + Send + 'static,
    {
        let (tx, rx): (Sender<WorkerEvent>, Receiver<WorkerEvent>) = crossbeam_channel::unbounded();
        let cancel = CancelToken::new();
        let handle = {
            let cancel = cancel.clone();
            thread::Builder::new()
                .name("bank-analysis".to_string())
                .spawn(move || {
                    debug!("Analysis worker started on {} item(s)", items.len());
                    run_batch(&items, &cancel, &mut op, |done, total| {
                        // The receiver may already be gone.
                        let _ = tx.send(WorkerEvent::Progress { done, total });
                    })
                })?
        };
        Ok(Self {
            handle,
            events: rx,
            cancel,
        })
    }

    /// Snapshot `samples` from a shared document and analyse them in the
    /// background; the document is only read-locked while cloning
    pub fn spawn_on<F>(doc: &SharedDocument, samples: &[SampleId], op: F) -> Result<Self>
    where
        F: FnMut(&Sample) -> AnalysisResult<T> + Send + 'static,
    {
        let snapshot = doc.read().snapshot(samples)?;
        Self::spawn(snapshot, op)
    }

    /// Stop before the next item; finished items are kept
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn events(&self) -> &Receiver<WorkerEvent> {
        &self.events
    }

    /// Most recent progress report, without blocking
    pub fn latest_progress(&self) -> Option<(usize, usize)> {
        self.events
            .try_iter()
            .last()
            .map(|WorkerEvent::Progress { done, total }| (done, total))
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the batch to end
    pub fn join(self) -> Result<BatchOutcome<T>> {
        self.handle.join().map_err(|panic| {
            let reason = panic_message(panic.as_ref());
            error!("Analysis worker panicked: {}", reason);
            BankError::WorkerFailed { reason }
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
