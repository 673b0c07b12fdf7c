// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Routing configuration model.
//!
//! `RoutingConfiguration` fragments are converted into an internal model and
//! composed per node. Composition fails on the first semantic conflict between
//! fragments.

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod compose;
pub mod converters;
pub mod errors;
pub mod internal;

pub use compose::{NodeConfig, compose};
pub use errors::ConfigError;
