//! Background thread that performs backend calls for the interactive client.
//!
//! Requests go out over one channel and responses come back over another;
//! the UI drains responses on its tick. Every request is stamped with a
//! generation number so the caller can ignore answers it no longer wants.
//! After [`BackendWorker::cancel`] (or drop) nothing more is delivered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::api::{ApiError, NotesBackend};
use crate::model::{Note, NoteUpdate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    FetchNotes,
    DeleteNote(i64),
    UpdateNote { note_id: i64, update: NoteUpdate },
}

#[derive(Debug)]
pub enum Outcome {
    Notes(Result<Vec<Note>, ApiError>),
    Deleted {
        note_id: i64,
        result: Result<(), ApiError>,
    },
    Updated {
        note_id: i64,
        result: Result<Note, ApiError>,
    },
}

#[derive(Debug)]
pub struct Response {
    pub generation: u64,
    pub outcome: Outcome,
}

struct Envelope {
    generation: u64,
    request: Request,
}

pub struct BackendWorker {
    requests: Option<Sender<Envelope>>,
    responses: Receiver<Response>,
    cancelled: Arc<AtomicBool>,
    next_generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl BackendWorker {
    pub fn spawn(backend: Arc<dyn NotesBackend>) -> Result<Self> {
        let (request_tx, request_rx) = unbounded::<Envelope>();
        let (response_tx, response_rx) = unbounded::<Response>();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let handle = thread::Builder::new()
            .name("neuralnotes-backend".into())
            .spawn(move || run(backend, request_rx, response_tx, flag))
            .context("spawning backend worker thread")?;
        Ok(Self {
            requests: Some(request_tx),
            responses: response_rx,
            cancelled,
            next_generation: 0,
            handle: Some(handle),
        })
    }

    /// Queues `request` and returns the generation it was stamped with.
    pub fn submit(&mut self, request: Request) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        match &self.requests {
            Some(tx) if !self.is_cancelled() => {
                if tx.send(Envelope { generation, request }).is_err() {
                    tracing::warn!(generation, "backend worker is gone, request dropped");
                }
            }
            _ => tracing::debug!(generation, "worker cancelled, request dropped"),
        }
        generation
    }

    /// Responses that arrived since the last call, oldest first.
    pub fn poll(&self) -> Vec<Response> {
        if self.is_cancelled() {
            return Vec::new();
        }
        self.responses.try_iter().collect()
    }

    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.requests = None;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for BackendWorker {
    fn drop(&mut self) {
        self.cancel();
        // A request may still be blocked on the network; the thread exits on
        // its own once that returns, so it is not joined here.
        self.handle.take();
    }
}

fn run(
    backend: Arc<dyn NotesBackend>,
    requests: Receiver<Envelope>,
    responses: Sender<Response>,
    cancelled: Arc<AtomicBool>,
) {
    for Envelope {
        generation,
        request,
    } in requests.iter()
    {
        if cancelled.load(Ordering::SeqCst) {
            break;
        }
        let outcome = execute(backend.as_ref(), request);
        if cancelled.load(Ordering::SeqCst) {
            tracing::debug!(generation, "discarding response after cancellation");
            break;
        }
        if responses.send(Response { generation, outcome }).is_err() {
            break;
        }
    }
    tracing::debug!("backend worker stopped");
}

fn execute(backend: &dyn NotesBackend, request: Request) -> Outcome {
    match request {
        Request::FetchNotes => Outcome::Notes(backend.list_notes()),
        Request::DeleteNote(note_id) => Outcome::Deleted {
            note_id,
            result: backend.delete_note(note_id),
        },
        Request::UpdateNote { note_id, update } => Outcome::Updated {
            note_id,
            result: backend.update_note(note_id, &update),
        },
    }
}
