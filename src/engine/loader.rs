//! Model loading state machine.
//!
//! `Idle -> Loading -> {Ready, Failed}`, with fixed progress checkpoints:
//! engine ready 20, age model constructed 60, gender model constructed 90,
//! warm-up complete 100. Loading runs one-shot on a blocking task; there is
//! no cancellation and no reset within a process lifetime.
//!
//! Observation is push-based: every checkpoint publishes an immutable
//! [`ModelLoadingState`] snapshot on a watch channel. Pollers read the
//! latest snapshot via [`ModelLoader::state`]; either way progress is
//! monotonic and `is_loaded` only ever appears together with progress 100.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info};

use crate::engine::model::{ConvNet, Model};
use crate::engine::preprocess::INPUT_SIZE;
use crate::engine::registry::ModelRegistry;
use crate::engine::tensor::TensorArena;
use crate::error::PipelineError;

const PROGRESS_ENGINE_READY: u8 = 20;
const PROGRESS_AGE_MODEL: u8 = 60;
const PROGRESS_GENDER_MODEL: u8 = 90;
const PROGRESS_WARMED: u8 = 100;

/// Immutable snapshot of the loading lifecycle.
///
/// `is_loaded` and `error` are mutually exclusive and both imply
/// `is_loading == false`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelLoadingState {
    pub is_loading: bool,
    pub is_loaded: bool,
    pub error: Option<String>,
    pub progress: u8,
}

impl ModelLoadingState {
    fn idle() -> Self {
        Self {
            is_loading: false,
            is_loaded: false,
            error: None,
            progress: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.is_loaded || self.error.is_some()
    }
}

/// Builds the two compiled models. The default factory constructs the
/// in-process conv nets; tests inject failing factories.
pub trait ModelFactory: Send + Sync {
    fn build_age_model(&self) -> Result<Arc<dyn Model>, PipelineError>;
    fn build_gender_model(&self) -> Result<Arc<dyn Model>, PipelineError>;
}

/// Factory for the built-in convolutional backend.
pub struct ConvNetFactory;

impl ModelFactory for ConvNetFactory {
    fn build_age_model(&self) -> Result<Arc<dyn Model>, PipelineError> {
        Ok(Arc::new(ConvNet::age()?))
    }

    fn build_gender_model(&self) -> Result<Arc<dyn Model>, PipelineError> {
        Ok(Arc::new(ConvNet::gender()?))
    }
}

/// Owns the loading lifecycle and publishes state snapshots.
pub struct ModelLoader {
    registry: Arc<ModelRegistry>,
    arena: Arc<TensorArena>,
    factory: Arc<dyn ModelFactory>,
    tx: watch::Sender<ModelLoadingState>,
    started: AtomicBool,
}

impl ModelLoader {
    pub fn new(
        registry: Arc<ModelRegistry>,
        arena: Arc<TensorArena>,
        factory: Arc<dyn ModelFactory>,
    ) -> Arc<Self> {
        let (tx, _rx) = watch::channel(ModelLoadingState::idle());
        Arc::new(Self {
            registry,
            arena,
            factory,
            tx,
            started: AtomicBool::new(false),
        })
    }

    /// Kicks off loading on a blocking task. Idempotent: calls after the
    /// first are no-ops, whether loading is in flight or already terminal.
    pub fn start(self: &Arc<Self>) {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        self.publish_progress(0);
        info!("Model loading started");

        let loader = Arc::clone(self);
        tokio::task::spawn_blocking(move || match loader.run_load() {
            Ok(()) => info!("Model loading complete"),
            Err(e) => {
                error!("Model loading failed: {}", e);
                loader.publish_failed(&e);
            }
        });
    }

    /// Latest state snapshot (polling observer path).
    pub fn state(&self) -> ModelLoadingState {
        self.tx.borrow().clone()
    }

    /// Push-based observer path: receives every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ModelLoadingState> {
        self.tx.subscribe()
    }

    /// Waits until the loader reaches `Ready` or `Failed`.
    pub async fn wait_for_terminal(&self) -> ModelLoadingState {
        let mut rx = self.subscribe();
        loop {
            let state = rx.borrow().clone();
            if state.is_terminal() {
                return state;
            }
            if rx.changed().await.is_err() {
                return self.state();
            }
        }
    }

    fn run_load(&self) -> Result<(), PipelineError> {
        // Arena and factory are ready; the inference engine is usable.
        self.publish_progress(PROGRESS_ENGINE_READY);

        let age = self.factory.build_age_model()?;
        self.publish_progress(PROGRESS_AGE_MODEL);

        let gender = self.factory.build_gender_model()?;
        self.publish_progress(PROGRESS_GENDER_MODEL);

        // Warm-up: one pass per model on a zero canvas, so lazily allocated
        // resources materialize before the first real request. On failure
        // both handles drop here, leaving the registry untouched.
        self.warm_up(age.as_ref())?;
        self.warm_up(gender.as_ref())?;

        // Install before publishing the terminal snapshot: anyone who
        // observes is_loaded == true finds a ready registry.
        self.registry.install(age, gender);
        self.tx.send_replace(ModelLoadingState {
            is_loading: false,
            is_loaded: true,
            error: None,
            progress: PROGRESS_WARMED,
        });
        Ok(())
    }

    fn warm_up(&self, model: &dyn Model) -> Result<(), PipelineError> {
        let side = INPUT_SIZE as usize;
        let zeros = self.arena.alloc(&[1, side, side, 3]);
        let output = model.forward(&zeros, &self.arena)?;

        if output.len() != model.output_len() {
            return Err(PipelineError::Load(format!(
                "warm-up for '{}' produced {} values, expected {}",
                model.name(),
                output.len(),
                model.output_len()
            )));
        }
        if output.as_slice().iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::Load(format!(
                "warm-up for '{}' produced non-finite output",
                model.name()
            )));
        }
        info!("Warm-up pass complete for '{}' model", model.name());
        Ok(())
    }

    fn publish_progress(&self, progress: u8) {
        self.tx.send_replace(ModelLoadingState {
            is_loading: true,
            is_loaded: false,
            error: None,
            progress,
        });
    }

    fn publish_failed(&self, err: &PipelineError) {
        let progress = self.tx.borrow().progress;
        self.tx.send_replace(ModelLoadingState {
            is_loading: false,
            is_loaded: false,
            error: Some(err.to_string()),
            progress,
        });
    }
}
