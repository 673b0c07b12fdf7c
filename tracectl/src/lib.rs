// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Tracing setup shared by the routefleet binaries

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

use tracing_error::ErrorLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

pub use tracing_subscriber::filter::LevelFilter;

pub const DEFAULT_LOGLEVEL: LevelFilter = LevelFilter::INFO;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TraceCtlError {
    #[error("Invalid log filter '{0}': {1}")]
    InvalidFilter(String, String),
    #[error("Tracing was already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Build the log filter. An explicit `directives` string wins over `RUST_LOG`,
/// which wins over [`DEFAULT_LOGLEVEL`].
pub fn build_filter(directives: Option<&str>) -> Result<EnvFilter, TraceCtlError> {
    match directives {
        Some(directives) => EnvFilter::try_new(directives)
            .map_err(|e| TraceCtlError::InvalidFilter(directives.to_owned(), e.to_string())),
        None => Ok(EnvFilter::builder()
            .with_default_directive(DEFAULT_LOGLEVEL.into())
            .from_env_lossy()),
    }
}

/// Install the global subscriber: env filter, fmt output and span traces
/// for errors.
pub fn init(directives: Option<&str>) -> Result<(), TraceCtlError> {
    let filter = build_filter(directives)?;
    let shown = filter.to_string();
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_names(true))
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| TraceCtlError::AlreadyInitialized(e.to_string()))?;
    tracing::debug!("Log filter set to '{shown}'");
    Ok(())
}
