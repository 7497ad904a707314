//! Engine actor
//!
//! A single task owns the [`MatchingEngine`] and processes commands one at a
//! time from a channel. Submit, cancel and sweep therefore never interleave,
//! which is the only exclusion the book needs. Settlement I/O inside a sweep
//! holds up queued events for the sweep's duration.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use types::wire::OrderEvent;

use crate::book::BookSnapshot;
use crate::engine::MatchingEngine;
use crate::errors::EngineError;
use crate::events::{Dispatched, SweepReport};

enum Command {
    Dispatch {
        event: OrderEvent,
        reply: oneshot::Sender<Result<Dispatched, EngineError>>,
    },
    Sweep {
        reply: oneshot::Sender<Result<SweepReport, EngineError>>,
    },
    Snapshot {
        reply: oneshot::Sender<BookSnapshot>,
    },
    Shutdown,
}

/// Cloneable handle to the engine task
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<Command>,
}

impl EngineHandle {
    /// Move `engine` onto its own task
    ///
    /// The task ends after a shutdown command (once the commands queued
    /// before it are handled) or when every handle is dropped, and returns
    /// the engine.
    pub fn spawn(engine: MatchingEngine, buffer: usize) -> (Self, JoinHandle<MatchingEngine>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let task = tokio::spawn(run(engine, rx));
        (Self { tx }, task)
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, EngineError> {
        let (reply, response) = oneshot::channel();
        self.tx.send(make(reply)).await.map_err(|_| EngineError::Stopped)?;
        response.await.map_err(|_| EngineError::Stopped)
    }

    /// Handle one broker event
    pub async fn dispatch(&self, event: OrderEvent) -> Result<Dispatched, EngineError> {
        self.request(|reply| Command::Dispatch { event, reply }).await?
    }

    /// Run a sweep now
    pub async fn sweep(&self) -> Result<SweepReport, EngineError> {
        self.request(|reply| Command::Sweep { reply }).await?
    }

    /// Copy of the current book
    pub async fn snapshot(&self) -> Result<BookSnapshot, EngineError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Ask the engine task to stop after the commands already queued
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.tx.send(Command::Shutdown).await.map_err(|_| EngineError::Stopped)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

async fn run(mut engine: MatchingEngine, mut rx: mpsc::Receiver<Command>) -> MatchingEngine {
    info!("Engine task started");
    while let Some(command) = rx.recv().await {
        if !handle(&mut engine, command).await {
            // Refuse new commands but finish the ones already queued.
            rx.close();
            while let Some(command) = rx.recv().await {
                handle(&mut engine, command).await;
            }
            break;
        }
    }
    info!(buys = engine.book().buys().len(), sells = engine.book().sells().len(), "Engine task stopped");
    engine
}

/// Returns false on shutdown
async fn handle(engine: &mut MatchingEngine, command: Command) -> bool {
    match command {
        Command::Dispatch { event, reply } => {
            let result = engine.dispatch(event).await;
            if reply.send(result).is_err() {
                debug!("Dispatch caller went away");
            }
        }
        Command::Sweep { reply } => {
            let result = engine.sweep().await;
            let _ = reply.send(result);
        }
        Command::Snapshot { reply } => {
            let _ = reply.send(engine.snapshot());
        }
        Command::Shutdown => return false,
    }
    true
}
