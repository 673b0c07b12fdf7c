// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Errors produced when composing the configuration of a node

use thiserror::Error;

use crate::converters::k8s::FromK8sConversionError;

/// Display name of a VRF: the empty name is the default VRF
pub(crate) fn vrf_display(vrf: &str) -> &str {
    if vrf.is_empty() { "default" } else { vrf }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration in {fragment}: {source}")]
    Conversion {
        fragment: String,
        source: FromK8sConversionError,
    },
    #[error(
        "ASN mismatch in VRF {vrf_name}: {fragment} uses {asn}, {other_fragment} uses {other_asn}",
        vrf_name = vrf_display(.vrf)
    )]
    AsnMismatch {
        vrf: String,
        asn: u32,
        fragment: String,
        other_asn: u32,
        other_fragment: String,
    },
    #[error(
        "Router ID mismatch in VRF {vrf_name}: {fragment} uses {id}, {other_fragment} uses {other_id}",
        vrf_name = vrf_display(.vrf)
    )]
    RouterIdMismatch {
        vrf: String,
        id: String,
        fragment: String,
        other_id: String,
        other_fragment: String,
    },
    #[error(
        "Neighbor {neighbor} in VRF {vrf_name} has conflicting {field}: {fragment} sets {value}, {other_fragment} sets {other_value}",
        vrf_name = vrf_display(.vrf)
    )]
    NeighborMismatch {
        vrf: String,
        neighbor: String,
        field: &'static str,
        fragment: String,
        value: String,
        other_fragment: String,
        other_value: String,
    },
    #[error("BFD profile {profile} is defined differently by {fragment} and {other_fragment}")]
    BfdProfileMismatch {
        profile: String,
        fragment: String,
        other_fragment: String,
    },
    #[error(
        "Neighbor {neighbor} in VRF {vrf_name} ({fragment}) references unknown BFD profile {profile}",
        vrf_name = vrf_display(.vrf)
    )]
    UnknownBfdProfile {
        vrf: String,
        neighbor: String,
        profile: String,
        fragment: String,
    },
}
