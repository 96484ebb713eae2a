//! Model Session
//!
//! Owns the single engine handle for the process. Initialization is
//! idempotent and single-flight: while a load is in progress every caller
//! awaits the same shared future, so N concurrent `ensure_ready()` calls cause
//! exactly one `EngineLoader::load`. A failed load is delivered to all of
//! those callers and leaves the session eligible for a fresh attempt. The
//! load settles the session itself when it finishes, so dropping a waiter
//! never strands a finished load in the slot.
//!
//! Once ready, the handle is never replaced for the lifetime of the session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};

use crate::engine::{EngineLoader, InferenceEngine, ProgressCallback};
use crate::error::{ChatError, ChatResult};
use crate::types::LoadProgress;

type SharedLoad = Shared<BoxFuture<'static, ChatResult<Arc<dyn InferenceEngine>>>>;

/// Observable lifecycle of a [`ModelSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Initializing,
    Ready,
    Failed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Initializing => "initializing",
            SessionState::Ready => "ready",
            SessionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

enum Slot {
    Idle,
    Initializing { generation: u64, load: SharedLoad },
    Ready(Arc<dyn InferenceEngine>),
    Failed(ChatError),
}

/// Lazily-initialized, shared engine handle.
pub struct ModelSession {
    loader: Arc<dyn EngineLoader>,
    model_id: String,
    slot: Arc<Mutex<Slot>>,
    generation: AtomicU64,
    progress_tx: Arc<watch::Sender<Option<LoadProgress>>>,
}

impl ModelSession {
    pub fn new(loader: Arc<dyn EngineLoader>, model_id: impl Into<String>) -> Self {
        let (progress_tx, _) = watch::channel(None);
        Self {
            loader,
            model_id: model_id.into(),
            slot: Arc::new(Mutex::new(Slot::Idle)),
            generation: AtomicU64::new(0),
            progress_tx: Arc::new(progress_tx),
        }
    }

    /// Model identifier this session loads.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Backend name of the underlying loader.
    pub fn backend(&self) -> &'static str {
        self.loader.backend()
    }

    /// Latest load progress report; `None` until the first report arrives.
    pub fn subscribe_progress(&self) -> watch::Receiver<Option<LoadProgress>> {
        self.progress_tx.subscribe()
    }

    pub async fn state(&self) -> SessionState {
        match &*self.slot.lock().await {
            Slot::Idle => SessionState::Idle,
            Slot::Initializing { .. } => SessionState::Initializing,
            Slot::Ready(_) => SessionState::Ready,
            Slot::Failed(_) => SessionState::Failed,
        }
    }

    /// Error from the most recent failed load, if the session is failed.
    pub async fn last_error(&self) -> Option<ChatError> {
        match &*self.slot.lock().await {
            Slot::Failed(err) => Some(err.clone()),
            _ => None,
        }
    }

    /// The engine handle if already loaded. Never triggers a load.
    pub async fn engine(&self) -> Option<Arc<dyn InferenceEngine>> {
        match &*self.slot.lock().await {
            Slot::Ready(engine) => Some(Arc::clone(engine)),
            _ => None,
        }
    }

    /// Return the loaded engine, loading it first if necessary.
    pub async fn ensure_ready(&self) -> ChatResult<Arc<dyn InferenceEngine>> {
        let load = {
            let mut slot = self.slot.lock().await;
            match &*slot {
                Slot::Ready(engine) => return Ok(Arc::clone(engine)),
                Slot::Initializing { load, .. } => load.clone(),
                Slot::Idle | Slot::Failed(_) => {
                    let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
                    let load = self.start_load(generation);
                    *slot = Slot::Initializing {
                        generation,
                        load: load.clone(),
                    };
                    load
                }
            }
        };

        load.await
    }

    /// Build the shared load for `generation`.
    ///
    /// The future writes its own outcome into the slot, provided the slot
    /// still belongs to the same generation.
    fn start_load(&self, generation: u64) -> SharedLoad {
        let loader = Arc::clone(&self.loader);
        let model_id = self.model_id.clone();
        let slot = Arc::clone(&self.slot);
        let progress_tx = Arc::clone(&self.progress_tx);
        let log_model = model_id.clone();

        let progress: ProgressCallback = Arc::new(move |report: LoadProgress| {
            tracing::info!(model = %log_model, "Model initialization progress: {}", report);
            progress_tx.send_replace(Some(report));
        });

        async move {
            tracing::info!(
                backend = loader.backend(),
                model = %model_id,
                "Initializing inference engine"
            );
            let result = match loader.load(&model_id, progress).await {
                Ok(engine) => {
                    tracing::info!(model = %model_id, "Inference engine initialized successfully");
                    Ok(engine)
                }
                Err(e) => {
                    tracing::error!(model = %model_id, "Failed to initialize inference engine: {}", e);
                    Err(ChatError::Initialization(e))
                }
            };

            let mut slot = slot.lock().await;
            let settles_current =
                matches!(&*slot, Slot::Initializing { generation: g, .. } if *g == generation);
            if settles_current {
                *slot = match &result {
                    Ok(engine) => Slot::Ready(Arc::clone(engine)),
                    Err(err) => Slot::Failed(err.clone()),
                };
            }

            result
        }
        .boxed()
        .shared()
    }
}
