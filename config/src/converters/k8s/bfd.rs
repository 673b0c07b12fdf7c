// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::converters::k8s::FromK8sConversionError;
use crate::internal::routing::bfd::BfdProfile;

impl TryFrom<&k8s_intf::BfdProfile> for BfdProfile {
    type Error = FromK8sConversionError;

    fn try_from(profile: &k8s_intf::BfdProfile) -> Result<Self, Self::Error> {
        if profile.name.is_empty() {
            return Err(FromK8sConversionError::MissingData(
                "BFD profile without a name".to_string(),
            ));
        }
        let mut bfd = BfdProfile::new(&profile.name);
        if let Some(rx) = profile.receive_interval {
            bfd.receive_interval = rx;
        }
        if let Some(tx) = profile.transmit_interval {
            bfd.transmit_interval = tx;
        }
        if let Some(mult) = profile.detect_multiplier {
            if mult == 0 {
                return Err(FromK8sConversionError::Invalid(format!(
                    "BFD profile {} has detect multiplier 0",
                    profile.name
                )));
            }
            bfd.detect_multiplier = mult;
        }
        bfd.echo_mode = profile.echo_mode.unwrap_or(false);
        bfd.passive_mode = profile.passive_mode.unwrap_or(false);
        Ok(bfd)
    }
}
