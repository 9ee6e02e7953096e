//! Configuration module for vadima
//!
//! This module handles:
//! - Model resource locations (`[model]`)
//! - Tokenizer settings (`[tokenizer]`)
//! - Inference limits (`[inference]`)
//! - Environment overrides and the example file written by `vadima init`

mod vadima_config;

pub use vadima_config::{
    apply_env_overrides, default_model_dir, load_config, user_config_path, InferenceConfig,
    ModelConfig, TokenizerConfig, VadimaConfig, CONFIG_FILE_NAME, EXAMPLE_CONFIG,
};
