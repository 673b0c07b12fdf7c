// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Composition of the routing configuration of a single node out of the
//! `RoutingConfiguration` fragments that apply to it.

use std::collections::BTreeMap;

use k8s_intf::RoutingConfiguration;
use kube::ResourceExt;
use tracing::debug;

use crate::errors::ConfigError;
use crate::internal::routing::bfd::BfdProfile;
use crate::internal::routing::bgp::{BgpNeighType, BgpNeighbor, BgpRouter};

/// Routing configuration of a node, keyed by VRF name ("" is the default VRF)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeConfig {
    pub vrfs: BTreeMap<String, BgpRouter>,
    pub bfd_profiles: BTreeMap<String, BfdProfile>,
}

impl NodeConfig {
    #[must_use]
    pub fn router(&self, vrf: &str) -> Option<&BgpRouter> {
        self.vrfs.get(vrf)
    }
}

/// Identifies a fragment in error messages
fn fragment_id(fragment: &RoutingConfiguration) -> String {
    format!(
        "{}/{}",
        fragment.namespace().unwrap_or_default(),
        fragment.name_any()
    )
}

fn opt_display<T: ToString>(value: Option<&T>) -> String {
    value.map_or_else(|| "<unset>".to_string(), ToString::to_string)
}

struct BfdReference {
    vrf: String,
    neighbor: String,
    profile: String,
    fragment: String,
}

/// Which fragment contributed each piece of the composed config
#[derive(Default)]
struct Origins {
    asn: BTreeMap<String, String>,
    router_id: BTreeMap<String, String>,
    neighbor: BTreeMap<(String, BgpNeighType), String>,
    bfd_profile: BTreeMap<String, String>,
}

#[derive(Default)]
struct Composer {
    config: NodeConfig,
    origins: Origins,
    bfd_refs: Vec<BfdReference>,
}

impl Composer {
    fn add_router(&mut self, router: BgpRouter, fragment: &str) -> Result<(), ConfigError> {
        let vrf = router.vrf.clone();
        let origins = &mut self.origins;
        let existing = self.config.vrfs.entry(vrf.clone()).or_insert_with(|| {
            origins.asn.insert(vrf.clone(), fragment.to_owned());
            BgpRouter::new(router.asn, &vrf)
        });

        if existing.asn != router.asn {
            return Err(ConfigError::AsnMismatch {
                vrf: vrf.clone(),
                asn: router.asn,
                fragment: fragment.to_owned(),
                other_asn: existing.asn,
                other_fragment: origins.asn.get(&vrf).cloned().unwrap_or_default(),
            });
        }
        match (existing.router_id, router.router_id) {
            (Some(current), Some(id)) if current != id => {
                return Err(ConfigError::RouterIdMismatch {
                    vrf: vrf.clone(),
                    id: id.to_string(),
                    fragment: fragment.to_owned(),
                    other_id: current.to_string(),
                    other_fragment: origins.router_id.get(&vrf).cloned().unwrap_or_default(),
                });
            }
            (None, Some(id)) => {
                existing.router_id = Some(id);
                origins.router_id.insert(vrf.clone(), fragment.to_owned());
            }
            _ => {}
        }

        for neighbor in router.neighbors {
            let key = (vrf.clone(), neighbor.ntype.clone());
            if let Some(pos) = existing
                .neighbors
                .iter()
                .position(|n| n.ntype == neighbor.ntype)
            {
                let other_fragment = origins.neighbor.get(&key).cloned().unwrap_or_default();
                check_neighbor(
                    &vrf,
                    &existing.neighbors[pos],
                    &neighbor,
                    fragment,
                    &other_fragment,
                )?;
            } else {
                origins.neighbor.insert(key, fragment.to_owned());
                existing.neighbors.push(neighbor);
            }
        }
        for prefix in router.prefixes {
            if !existing.prefixes.contains(&prefix) {
                existing.prefixes.push(prefix);
            }
        }
        Ok(())
    }

    fn add_bfd_profile(&mut self, profile: BfdProfile, fragment: &str) -> Result<(), ConfigError> {
        match self.config.bfd_profiles.get(&profile.name) {
            Some(existing) if *existing != profile => Err(ConfigError::BfdProfileMismatch {
                profile: profile.name,
                fragment: fragment.to_owned(),
                other_fragment: self
                    .origins
                    .bfd_profile
                    .get(&existing.name)
                    .cloned()
                    .unwrap_or_default(),
            }),
            Some(_) => Ok(()),
            None => {
                self.origins
                    .bfd_profile
                    .insert(profile.name.clone(), fragment.to_owned());
                self.config.bfd_profiles.insert(profile.name.clone(), profile);
                Ok(())
            }
        }
    }

    fn check_bfd_references(&self) -> Result<(), ConfigError> {
        for r in &self.bfd_refs {
            if !self.config.bfd_profiles.contains_key(&r.profile) {
                return Err(ConfigError::UnknownBfdProfile {
                    vrf: r.vrf.clone(),
                    neighbor: r.neighbor.clone(),
                    profile: r.profile.clone(),
                    fragment: r.fragment.clone(),
                });
            }
        }
        Ok(())
    }
}

fn check_neighbor(
    vrf: &str,
    current: &BgpNeighbor,
    new: &BgpNeighbor,
    fragment: &str,
    other_fragment: &str,
) -> Result<(), ConfigError> {
    let mismatch = |field: &'static str, value: String, other_value: String| {
        Err(ConfigError::NeighborMismatch {
            vrf: vrf.to_owned(),
            neighbor: new.ntype.to_string(),
            field,
            fragment: fragment.to_owned(),
            value,
            other_fragment: other_fragment.to_owned(),
            other_value,
        })
    };
    if current.remote_as != new.remote_as {
        return mismatch(
            "remote ASN",
            new.remote_as.to_string(),
            current.remote_as.to_string(),
        );
    }
    if current.port != new.port {
        return mismatch(
            "port",
            opt_display(new.port.as_ref()),
            opt_display(current.port.as_ref()),
        );
    }
    if current.bfd_profile != new.bfd_profile {
        return mismatch(
            "BFD profile",
            opt_display(new.bfd_profile.as_ref()),
            opt_display(current.bfd_profile.as_ref()),
        );
    }
    if current.ebgp_multihop != new.ebgp_multihop {
        return mismatch(
            "eBGP multihop",
            new.ebgp_multihop.to_string(),
            current.ebgp_multihop.to_string(),
        );
    }
    Ok(())
}

/// Compose the configuration of a node from all the fragments that apply to it,
/// in the order given. The first conflict found is returned.
pub fn compose(fragments: &[RoutingConfiguration]) -> Result<NodeConfig, ConfigError> {
    let mut composer = Composer::default();

    for fragment in fragments {
        let id = fragment_id(fragment);
        debug!("Composing fragment {id}");
        let conversion = |source| ConfigError::Conversion {
            fragment: id.clone(),
            source,
        };

        for profile in &fragment.spec.bgp.bfd_profiles {
            let profile = BfdProfile::try_from(profile).map_err(conversion)?;
            composer.add_bfd_profile(profile, &id)?;
        }

        for router in &fragment.spec.bgp.routers {
            let router = BgpRouter::try_from(router).map_err(conversion)?;
            for neighbor in &router.neighbors {
                if let Some(profile) = &neighbor.bfd_profile {
                    composer.bfd_refs.push(BfdReference {
                        vrf: router.vrf.clone(),
                        neighbor: neighbor.ntype.to_string(),
                        profile: profile.clone(),
                        fragment: id.clone(),
                    });
                }
            }
            composer.add_router(router, &id)?;
        }
    }

    composer.check_bfd_references()?;
    Ok(composer.config)
}
