// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Label selector matching with a shared, bounded cache of parsed selectors.

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

mod cache;
mod matcher;

pub use cache::{CacheStats, DEFAULT_CACHE_CAPACITY, SelectorCache};
pub use matcher::{Matcher, SelectorError, canonical_key};
