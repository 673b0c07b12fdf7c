// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Configuration model: BFD

// Defaults applied to unset profile parameters
pub const BFD_DETECT_MULTIPLIER: u32 = 3;
pub const BFD_TRANSMIT_INTERVAL_MS: u32 = 300;
pub const BFD_RECEIVE_INTERVAL_MS: u32 = 300;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BfdProfile {
    pub name: String,
    pub receive_interval: u32,
    pub transmit_interval: u32,
    pub detect_multiplier: u32,
    pub echo_mode: bool,
    pub passive_mode: bool,
}

impl BfdProfile {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            receive_interval: BFD_RECEIVE_INTERVAL_MS,
            transmit_interval: BFD_TRANSMIT_INTERVAL_MS,
            detect_multiplier: BFD_DETECT_MULTIPLIER,
            echo_mode: false,
            passive_mode: false,
        }
    }
}
