//! Pool cancellation controller.
//!
//! Each pool run gets a fresh [`CancellationToken`] that is handed to every
//! worker at spawn. The controller holds one slot per pool kind and refuses
//! to start a pool while any slot is occupied, so the generation and prompt
//! pools never overlap.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{WorkerError, WorkerResult};

/// The two worker pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    Generation,
    Prompt,
}

impl PoolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolKind::Generation => "generation",
            PoolKind::Prompt => "prompt",
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Default)]
struct Slots {
    generation: Option<CancellationToken>,
    prompt: Option<CancellationToken>,
}

impl Slots {
    fn slot(&mut self, kind: PoolKind) -> &mut Option<CancellationToken> {
        match kind {
            PoolKind::Generation => &mut self.generation,
            PoolKind::Prompt => &mut self.prompt,
        }
    }
}

/// Tracks the active run of each pool.
#[derive(Debug, Default, Clone)]
pub struct PoolController {
    slots: Arc<Mutex<Slots>>,
}

impl PoolController {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a run of `kind`.
    ///
    /// Fails with `PoolBusy` while either pool is running. The returned
    /// guard frees the slot when dropped.
    pub fn begin(&self, kind: PoolKind) -> WorkerResult<PoolRun> {
        let mut slots = self.lock();
        if let Some(active) = [PoolKind::Generation, PoolKind::Prompt]
            .into_iter()
            .find(|k| slots.slot(*k).is_some())
        {
            return Err(WorkerError::PoolBusy(active));
        }

        let token = CancellationToken::new();
        *slots.slot(kind) = Some(token.clone());
        Ok(PoolRun {
            kind,
            token,
            controller: self.clone(),
        })
    }

    /// Ask the active run of `kind` to stop. Returns `false` if idle.
    pub fn cancel(&self, kind: PoolKind) -> bool {
        match self.lock().slot(kind).as_ref() {
            Some(token) => {
                info!(pool = %kind, "Cancellation requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, kind: PoolKind) -> bool {
        self.lock().slot(kind).is_some()
    }

    fn release(&self, kind: PoolKind) {
        *self.lock().slot(kind) = None;
    }
}

/// Guard for an active pool run.
#[derive(Debug)]
pub struct PoolRun {
    kind: PoolKind,
    token: CancellationToken,
    controller: PoolController,
}

impl PoolRun {
    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    /// Token to hand to workers of this run.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for PoolRun {
    fn drop(&mut self) {
        self.controller.release(self.kind);
    }
}
