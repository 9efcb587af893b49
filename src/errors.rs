// src/errors.rs

//! Crate-wide error taxonomy.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DevflowError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unknown target: {0}")]
    UnknownTarget(String),

    #[error("compile failed for target '{target}': {message}")]
    Compile { target: String, message: String },

    #[error("server did not report ready within {0:?}")]
    StartupTimeout(Duration),

    #[error("server process crashed: {0}")]
    ProcessCrash(String),

    #[error("watch error: {0}")]
    Watch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DevflowError>;
