// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::time::Duration;

use selector::SelectorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Failed to list {kind}: {source}")]
    Kube {
        kind: &'static str,
        source: kube::Error,
    },
    #[error("Inventory unavailable: {0}")]
    Unavailable(String),
}

/// A conflict between the fragments applicable to a node, as reported by a
/// [`crate::SemanticValidator`]. The text is forwarded verbatim to the user.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct SemanticError(pub String);

impl From<config::ConfigError> for SemanticError {
    fn from(err: config::ConfigError) -> Self {
        SemanticError(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid node selector in {fragment}: {source}")]
    InvalidSelector {
        fragment: String,
        source: SelectorError,
    },
    #[error("Could not validate: {0}")]
    InventoryUnavailable(#[from] InventoryError),
    #[error("Conflict on node {node}: {source}")]
    SemanticConflict { node: String, source: SemanticError },
    #[error("Validation did not complete within {0:?}")]
    Timeout(Duration),
}
