// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Converters from external representations to the internal model

pub mod k8s;
