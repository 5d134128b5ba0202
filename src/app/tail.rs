// LogTrail - app/tail.rs
//
// Live tail: keeps a checkpoint per tracked file and repeatedly runs read
// passes to surface lines appended since the previous cycle.
//
// Architecture:
//   - `TailSession` owns the tracked files and their checkpoints. One call
//     to `poll` is one cycle: a read pass per file, run in parallel with
//     rayon. Every checkpoint is advanced only by its own pass.
//   - Sequence numbers are assigned after the passes, in file order then
//     line order, from a single counter that never goes backwards.
//   - `TailManager` drives a session on a background thread. An
//     `Arc<AtomicBool>` cancel flag stops it; results go out as
//     `TailProgress` messages over an mpsc channel.
//
// A read error on one file is non-fatal: it is reported for that file and
// the cycle carries on with the rest.

use crate::app::reader::{IncrementalReader, PassOutcome};
use crate::core::model::{FileCheckpoint, LogRecord, TailProgress};
use crate::util::constants::{MAX_TRACKED_FILES, TAIL_CANCEL_CHECK_INTERVAL_MS};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

// =============================================================================
// TailSession
// =============================================================================

/// Result of one poll cycle.
#[derive(Debug, Default)]
pub struct TailCycle {
    /// New records, in sequence order.
    pub records: Vec<LogRecord>,
    /// Files that failed this cycle, with a readable reason.
    pub errors: Vec<(PathBuf, String)>,
    /// Files detected as truncated or rotated this cycle.
    pub rotated: Vec<PathBuf>,
}

/// A set of files read incrementally through one shared reader.
pub struct TailSession {
    reader: Arc<IncrementalReader>,
    checkpoints: Vec<FileCheckpoint>,
    next_sequence: u64,
}

impl TailSession {
    pub fn new(reader: Arc<IncrementalReader>) -> Self {
        Self {
            reader,
            checkpoints: Vec::new(),
            next_sequence: 0,
        }
    }

    /// Track `path` from its beginning. Returns `false` when the file is
    /// already tracked or the tracking limit has been reached.
    pub fn track(&mut self, path: impl Into<PathBuf>) -> bool {
        self.track_from(FileCheckpoint::start(path))
    }

    /// Track a file from a previously saved checkpoint.
    pub fn track_from(&mut self, checkpoint: FileCheckpoint) -> bool {
        if self.is_tracked(checkpoint.path()) {
            tracing::debug!(file = %checkpoint.path.display(), "Already tracked");
            return false;
        }
        if self.checkpoints.len() >= MAX_TRACKED_FILES {
            tracing::warn!(
                file = %checkpoint.path.display(),
                limit = MAX_TRACKED_FILES,
                "Tracked file limit reached; file ignored"
            );
            return false;
        }
        self.checkpoints.push(checkpoint);
        true
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        self.checkpoints.iter().any(|c| c.path() == path)
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    /// Current checkpoint of every tracked file, in tracking order.
    pub fn checkpoints(&self) -> &[FileCheckpoint] {
        &self.checkpoints
    }

    /// Run one read pass per tracked file and collect the new records.
    pub fn poll(&mut self) -> TailCycle {
        let reader = &self.reader;
        let passes: Vec<_> = self
            .checkpoints
            .par_iter()
            .map(|checkpoint| reader.read_incremental(checkpoint))
            .collect();

        let mut cycle = TailCycle::default();
        for (checkpoint, result) in self.checkpoints.iter_mut().zip(passes) {
            match result {
                Ok(pass) => {
                    if pass.outcome == PassOutcome::Rotated {
                        cycle.rotated.push(checkpoint.path.clone());
                    }
                    for mut record in pass.records {
                        record.sequence = self.next_sequence;
                        self.next_sequence += 1;
                        cycle.records.push(record);
                    }
                    *checkpoint = pass.checkpoint;
                }
                Err(e) => {
                    tracing::warn!(file = %checkpoint.path.display(), error = %e, "Tail: read error");
                    cycle.errors.push((checkpoint.path.clone(), e.to_string()));
                }
            }
        }

        if !cycle.records.is_empty() {
            tracing::debug!(
                files = self.checkpoints.len(),
                records = cycle.records.len(),
                next_sequence = self.next_sequence,
                "Tail: new records"
            );
        }
        cycle
    }
}

/// Order records from several files by timestamp, ties broken by sequence.
///
/// Unparsed timestamps sort first.
pub fn merge_by_timestamp(records: &mut [LogRecord]) {
    records.sort_by(|a, b| (a.timestamp, a.sequence).cmp(&(b.timestamp, b.sequence)));
}

// =============================================================================
// TailManager
// =============================================================================

/// Runs a `TailSession` on a background thread.
///
/// The owner keeps the manager and drains `poll_progress` (or reads
/// `progress_rx` directly) to receive records as they arrive.
pub struct TailManager {
    /// Channel receiver for tail progress messages.
    pub progress_rx: Option<mpsc::Receiver<TailProgress>>,
    /// Cancel flag shared with the background thread.
    cancel_flag: Option<Arc<AtomicBool>>,
}

impl TailManager {
    pub fn new() -> Self {
        Self {
            progress_rx: None,
            cancel_flag: None,
        }
    }

    /// Start polling `session` every `poll_interval_ms`.
    ///
    /// If a tail is already running it is stopped first.
    pub fn start_tail(&mut self, session: TailSession, poll_interval_ms: u64) {
        self.stop_tail();

        let (tx, rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));

        self.progress_rx = Some(rx);
        self.cancel_flag = Some(Arc::clone(&cancel));

        let file_count = session.len();
        std::thread::spawn(move || {
            run_tail_watcher(session, poll_interval_ms, tx, cancel);
        });

        tracing::info!(files = file_count, poll_interval_ms, "Live tail started");
    }

    /// Ask the background thread to stop.
    ///
    /// The thread exits within `TAIL_CANCEL_CHECK_INTERVAL_MS`.
    pub fn stop_tail(&mut self) {
        if let Some(flag) = &self.cancel_flag {
            flag.store(true, Ordering::SeqCst);
        }
        self.cancel_flag = None;
        self.progress_rx = None;
    }

    pub fn is_active(&self) -> bool {
        self.cancel_flag.is_some()
    }

    /// Drain all queued progress messages without blocking.
    pub fn poll_progress(&self) -> Vec<TailProgress> {
        let mut messages = Vec::new();
        if let Some(ref rx) = self.progress_rx {
            while let Ok(msg) = rx.try_recv() {
                messages.push(msg);
            }
        }
        messages
    }
}

impl Default for TailManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Background poll loop.
fn run_tail_watcher(
    mut session: TailSession,
    poll_interval_ms: u64,
    tx: mpsc::Sender<TailProgress>,
    cancel: Arc<AtomicBool>,
) {
    macro_rules! send {
        ($msg:expr) => {
            if tx.send($msg).is_err() {
                // Receiver dropped; nobody is listening any more.
                return;
            }
        };
    }

    send!(TailProgress::Started {
        file_count: session.len(),
    });

    // Sleep in slices so the cancel flag is noticed promptly.
    let slices = (poll_interval_ms / TAIL_CANCEL_CHECK_INTERVAL_MS).max(1);
    let slice = Duration::from_millis(poll_interval_ms.min(TAIL_CANCEL_CHECK_INTERVAL_MS));

    loop {
        for _ in 0..slices {
            std::thread::sleep(slice);
            if cancel.load(Ordering::SeqCst) {
                send!(TailProgress::Stopped);
                return;
            }
        }

        let cycle = session.poll();

        for (path, message) in cycle.errors {
            send!(TailProgress::FileError { path, message });
        }

        if !cycle.records.is_empty() {
            send!(TailProgress::NewRecords {
                records: cycle.records,
                checkpoints: session.checkpoints().to_vec(),
            });
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
