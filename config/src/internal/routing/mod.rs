// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Internal configuration model: routing

pub mod bfd;
pub mod bgp;
