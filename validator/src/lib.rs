// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Admission-time validation of `RoutingConfiguration` fragments.
//!
//! A fragment being created or updated is accepted only if, on every node its
//! selector matches, it can be combined with the other fragments matching that
//! node. Deletions are always accepted.

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

mod conflict;
mod errors;
mod inventory;
mod semantic;
pub mod webhook;

pub use conflict::{ConflictValidator, NodeFragmentSet, Operation};
pub use errors::{InventoryError, SemanticError, ValidationError};
pub use inventory::{Inventory, KubeInventory, NodeInfo};
pub use semantic::{RouterConfigValidator, SemanticValidator};
