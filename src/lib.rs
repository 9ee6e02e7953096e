//! vadima - parameter type suggestions from function source
//!
//! Source text is normalized, split into subword tokens and encoded; an
//! opaque classifier scores every type label once per parameter, and the
//! per-parameter rankings are merged into one list of joined labels.
//!
//! ```no_run
//! use std::sync::Arc;
//! use vadima::{config::VadimaConfig, ModelSession, Predictor};
//!
//! let session = Arc::new(ModelSession::from_config(VadimaConfig::default()));
//! let predictor = Predictor::new(session);
//! if let Some(ranked) = predictor.predict("def add(a, b):\n    return a + b", 2)? {
//!     for c in ranked {
//!         println!("{:>6.2}%  {}", c.probability * 100.0, c.label);
//!     }
//! }
//! # Ok::<(), vadima::Error>(())
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod inference;
pub mod session;
pub mod tokenizer;

pub use error::{Error, Result};
pub use inference::{Classification, ClassificationSet};
pub use session::{LoadedModel, ModelSession, Predictor, SessionState};
