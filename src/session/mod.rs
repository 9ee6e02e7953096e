//! Model session lifecycle
//!
//! A [`ModelSession`] owns the loaded model and moves through
//! `Uninitialized → Downloading → Initialized`, or `Failed` when a load
//! attempt or an inference call goes wrong.
//!
//! Load attempts are single-flight: `init_lock` serializes them, and a
//! caller that waited behind another attempt returns that attempt's result
//! instead of starting its own. Readers clone the `Arc<LoadedModel>` out of
//! a short read lock, so no lock is held while the model runs.

pub mod fetch;
pub mod predictor;

pub use fetch::{ArtifactFetcher, LocalMirror, NoFetch};
pub use predictor::Predictor;

use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use crate::config::VadimaConfig;
use crate::error::{Error, Result};
use crate::inference::{load_labels, BackendLoader, InferenceBackend, LinearLoader};
use crate::tokenizer::{
    BpeTokenizer, Encoder, MergeTable, Strategy, SubwordTokenizer, TextNormalizer, TokenPipeline,
    Vocabulary, WordPieceTokenizer,
};

/// Observable session state.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Uninitialized,
    Downloading,
    Initialized,
    Failed(Error),
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "uninitialized"),
            SessionState::Downloading => write!(f, "downloading"),
            SessionState::Initialized => write!(f, "initialized"),
            SessionState::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

/// Everything one successful load produced. Shared read-only.
pub struct LoadedModel {
    generation: u64,
    labels: Vec<String>,
    encoder: Encoder,
    backend: Box<dyn InferenceBackend>,
    continuation_prefix: String,
}

impl LoadedModel {
    /// Load attempt that produced this model. Increases with every attempt.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub fn vocab(&self) -> &Vocabulary {
        self.encoder.vocab()
    }

    pub fn pipeline(&self) -> &TokenPipeline {
        self.encoder.pipeline()
    }

    pub fn backend(&self) -> &dyn InferenceBackend {
        self.backend.as_ref()
    }

    pub fn continuation_prefix(&self) -> &str {
        &self.continuation_prefix
    }
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("generation", &self.generation)
            .field("labels", &self.labels.len())
            .field("vocab", &self.vocab().len())
            .finish_non_exhaustive()
    }
}

enum Slot {
    Uninitialized,
    Downloading,
    Initialized(Arc<LoadedModel>),
    Failed(Error),
}

struct Inner {
    slot: Slot,
    generation: u64,
}

pub struct ModelSession {
    config: VadimaConfig,
    fetcher: Box<dyn ArtifactFetcher>,
    loader: Box<dyn BackendLoader>,
    inner: RwLock<Inner>,
    init_lock: Mutex<()>,
}

impl ModelSession {
    pub fn new(
        config: VadimaConfig,
        fetcher: Box<dyn ArtifactFetcher>,
        loader: Box<dyn BackendLoader>,
    ) -> Self {
        Self {
            config,
            fetcher,
            loader,
            inner: RwLock::new(Inner {
                slot: Slot::Uninitialized,
                generation: 0,
            }),
            init_lock: Mutex::new(()),
        }
    }

    /// Session with the linear backend and a fetcher chosen by
    /// `model.source`.
    pub fn from_config(config: VadimaConfig) -> Self {
        let fetcher: Box<dyn ArtifactFetcher> = match &config.model.source {
            Some(root) => Box::new(LocalMirror::new(root)),
            None => Box::new(NoFetch),
        };
        Self::new(config, fetcher, Box::new(LinearLoader))
    }

    pub fn config(&self) -> &VadimaConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        match &self.read().slot {
            Slot::Uninitialized => SessionState::Uninitialized,
            Slot::Downloading => SessionState::Downloading,
            Slot::Initialized(_) => SessionState::Initialized,
            Slot::Failed(e) => SessionState::Failed(e.clone()),
        }
    }

    /// The loaded model, if the session is initialized.
    pub fn current(&self) -> Option<Arc<LoadedModel>> {
        match &self.read().slot {
            Slot::Initialized(model) => Some(Arc::clone(model)),
            _ => None,
        }
    }

    /// Return the loaded model, loading it first if needed.
    ///
    /// A failed session keeps failing with the stored error until
    /// [`reinitialize`](Self::reinitialize) is called.
    pub fn initialize(&self) -> Result<Arc<LoadedModel>> {
        if let Some(result) = self.settled() {
            return result;
        }

        let _guard = self.init_lock.lock().unwrap_or_else(|e| e.into_inner());
        // another caller may have finished while we waited
        if let Some(result) = self.settled() {
            return result;
        }
        self.attempt(false)
    }

    /// Fetch the artifact again and reload everything.
    ///
    /// Concurrent callers share one attempt.
    pub fn reinitialize(&self) -> Result<Arc<LoadedModel>> {
        let (observed, in_flight) = {
            let inner = self.read();
            (inner.generation, matches!(inner.slot, Slot::Downloading))
        };

        let _guard = self.init_lock.lock().unwrap_or_else(|e| e.into_inner());
        // an attempt was running when we arrived, or finished while we waited
        if in_flight || self.read().generation != observed {
            if let Some(result) = self.settled() {
                debug!("Reusing concurrent reinitialization result");
                return result;
            }
        }
        self.attempt(true)
    }

    /// Move to `Failed` after an inference error on `model`.
    ///
    /// Ignored when a newer load already replaced `model`. Returns whether
    /// the state changed.
    pub fn mark_failed(&self, model: &LoadedModel, error: Error) -> bool {
        let mut inner = self.write();
        let current = matches!(&inner.slot, Slot::Initialized(m) if m.generation == model.generation);
        if !current {
            debug!(
                "Ignoring stale failure from generation {} (now {})",
                model.generation, inner.generation
            );
            return false;
        }
        warn!("Model session failed: {}", error);
        inner.slot = Slot::Failed(error);
        true
    }

    fn settled(&self) -> Option<Result<Arc<LoadedModel>>> {
        match &self.read().slot {
            Slot::Initialized(model) => Some(Ok(Arc::clone(model))),
            Slot::Failed(e) => Some(Err(e.clone())),
            Slot::Uninitialized | Slot::Downloading => None,
        }
    }

    /// One load attempt. Caller holds `init_lock`.
    fn attempt(&self, force_fetch: bool) -> Result<Arc<LoadedModel>> {
        let generation = {
            let mut inner = self.write();
            inner.generation += 1;
            inner.slot = Slot::Downloading;
            inner.generation
        };
        debug!("Model load attempt {} (forced fetch: {})", generation, force_fetch);

        let result = self.load(generation, force_fetch).map(Arc::new);

        let mut inner = self.write();
        match &result {
            Ok(model) => {
                info!("Model initialized (generation {})", generation);
                inner.slot = Slot::Initialized(Arc::clone(model));
            }
            Err(e) => {
                warn!("Model initialization failed: {}", e);
                inner.slot = Slot::Failed(e.clone());
            }
        }
        result
    }

    fn load(&self, generation: u64, force_fetch: bool) -> Result<LoadedModel> {
        let model_cfg = &self.config.model;

        let artifact_path = model_cfg.artifact_path();
        if force_fetch || !artifact_path.exists() {
            self.fetcher.fetch(&model_cfg.artifact, &artifact_path)?;
        }
        if !artifact_path.is_file() {
            return Err(Error::artifact(
                &model_cfg.artifact,
                format!("{} does not exist", artifact_path.display()),
            ));
        }

        let encoder = build_encoder(&self.config)?;
        let labels = load_labels(&model_cfg.labels_path())?;

        let backend = self.loader.load(&artifact_path)?;
        if backend.label_count() != labels.len() {
            return Err(Error::vocabulary(
                model_cfg.labels_path(),
                format!(
                    "model scores {} labels but the label set has {}",
                    backend.label_count(),
                    labels.len()
                ),
            ));
        }

        Ok(LoadedModel {
            generation,
            labels,
            encoder,
            backend,
            continuation_prefix: self.config.tokenizer.continuation_prefix.clone(),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Vocabulary, subword strategy and encoder described by `config`.
///
/// Needs no model artifact, so token dumps work before a model is installed.
pub fn build_encoder(config: &VadimaConfig) -> Result<Encoder> {
    let model_cfg = &config.model;
    let tok_cfg = &config.tokenizer;
    let inf_cfg = &config.inference;

    let vocab = Arc::new(Vocabulary::load(
        &model_cfg.vocabulary_path(),
        &tok_cfg.unknown_token,
    )?);

    let strategy: Box<dyn SubwordTokenizer> = match tok_cfg.strategy {
        Strategy::Wordpiece => Box::new(
            WordPieceTokenizer::new(Arc::clone(&vocab), tok_cfg.max_word_chars)
                .with_continuation_prefix(tok_cfg.continuation_prefix.clone())
                .with_word_prefix(tok_cfg.word_prefix.clone()),
        ),
        Strategy::Bpe => {
            let path = model_cfg
                .merges_path()
                .ok_or_else(|| Error::Config("bpe strategy needs model.merges".into()))?;
            let merges = MergeTable::load(&path)?;
            Box::new(BpeTokenizer::new(Arc::new(merges), tok_cfg.granularity))
        }
    };

    let pipeline = TokenPipeline::new(
        TextNormalizer::new(tok_cfg.lowercase),
        strategy,
        tok_cfg.special_tokens(),
    );
    Ok(Encoder::new(
        vocab,
        Arc::new(pipeline),
        inf_cfg.max_source_chars,
        inf_cfg.context_limit,
    ))
}
