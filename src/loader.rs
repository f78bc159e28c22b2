//! Background decoding.
//!
//! Each request runs on its own worker thread and reports back over a
//! channel that the interactive thread drains. The set of live record ids is
//! the only state shared with workers; a worker holds its lock just long
//! enough to check membership and hand the result over, so a record removed
//! mid-decode never receives a bitmap.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, mpsc};
use std::time::{Duration, Instant};

use crate::decode::{self, DecodeKind, Decoded};
use crate::record::RecordId;

pub struct Completion {
    pub id: RecordId,
    pub kind: DecodeKind,
    pub result: anyhow::Result<Decoded>,
}

enum Message {
    Done(Completion),
    Dropped(RecordId),
}

pub struct Loader {
    live: Arc<Mutex<HashSet<RecordId>>>,
    tx: mpsc::Sender<Message>,
    rx: mpsc::Receiver<Message>,
    outstanding: usize,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(live: &Mutex<HashSet<RecordId>>) -> MutexGuard<'_, HashSet<RecordId>> {
    live.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Loader {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            live: Arc::new(Mutex::new(HashSet::new())),
            tx,
            rx,
            outstanding: 0,
        }
    }

    pub fn register(&self, id: RecordId) {
        lock(&self.live).insert(id);
    }

    pub fn unregister(&self, id: RecordId) {
        lock(&self.live).remove(&id);
    }

    pub fn is_live(&self, id: RecordId) -> bool {
        lock(&self.live).contains(&id)
    }

    /// Decodes still running or not yet drained.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn submit(&mut self, id: RecordId, path: PathBuf, kind: DecodeKind, preview_max: u32) {
        self.outstanding += 1;
        tracing::debug!(path = %path.display(), ?kind, "decode submitted");

        let tx = self.tx.clone();
        let live = Arc::clone(&self.live);
        std::thread::spawn(move || {
            let result = decode::decode(&path, kind, preview_max);
            let guard = lock(&live);
            let msg = if guard.contains(&id) {
                Message::Done(Completion { id, kind, result })
            } else {
                tracing::debug!(path = %path.display(), "decode finished for removed image, discarding");
                Message::Dropped(id)
            };
            let _ = tx.send(msg);
            drop(guard);
        });
    }

    fn accept(&mut self, msg: Message, out: &mut Vec<Completion>) {
        self.outstanding = self.outstanding.saturating_sub(1);
        if let Message::Done(c) = msg {
            out.push(c);
        }
    }

    /// Completions that have arrived so far, without blocking.
    pub fn drain(&mut self) -> Vec<Completion> {
        let mut out = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            self.accept(msg, &mut out);
        }
        out
    }

    /// Blocks until every submitted decode has reported or `timeout` passes.
    pub fn wait(&mut self, timeout: Duration) -> Vec<Completion> {
        let deadline = Instant::now() + timeout;
        let mut out = Vec::new();
        while self.outstanding > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.rx.recv_timeout(remaining) {
                Ok(msg) => self.accept(msg, &mut out),
                Err(_) => break,
            }
        }
        out
    }
}
