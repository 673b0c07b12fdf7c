// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::net::{IpAddr, Ipv4Addr};

use ipnet::IpNet;
use k8s_intf::{Neighbor, Router};

use crate::converters::k8s::FromK8sConversionError;
use crate::internal::routing::bgp::{BgpNeighType, BgpNeighbor, BgpRouter};

impl TryFrom<&Neighbor> for BgpNeighbor {
    type Error = FromK8sConversionError;

    fn try_from(neighbor: &Neighbor) -> Result<Self, Self::Error> {
        let ntype = match (neighbor.address.as_ref(), neighbor.interface.as_ref()) {
            (Some(addr), None) => BgpNeighType::Host(addr.parse::<IpAddr>().map_err(|e| {
                FromK8sConversionError::ParseError(format!("Invalid neighbor address {addr}: {e}"))
            })?),
            (None, Some(ifname)) if !ifname.is_empty() => BgpNeighType::Interface(ifname.clone()),
            (None, Some(_)) => {
                return Err(FromK8sConversionError::Invalid(
                    "Empty neighbor interface name".to_string(),
                ));
            }
            (Some(addr), Some(ifname)) => {
                return Err(FromK8sConversionError::Invalid(format!(
                    "Neighbor sets both address {addr} and interface {ifname}"
                )));
            }
            (None, None) => {
                return Err(FromK8sConversionError::MissingData(format!(
                    "Missing address or interface in BGP neighbor with ASN {}",
                    neighbor.asn
                )));
            }
        };

        if neighbor.asn == 0 {
            return Err(FromK8sConversionError::Invalid(format!(
                "Invalid ASN 0 for neighbor {ntype}"
            )));
        }

        Ok(BgpNeighbor::new(ntype, neighbor.asn)
            .set_port(neighbor.port)
            .set_bfd_profile(neighbor.bfd_profile.clone())
            .set_ebgp_multihop(neighbor.ebgp_multihop.unwrap_or(false)))
    }
}

impl TryFrom<&Router> for BgpRouter {
    type Error = FromK8sConversionError;

    fn try_from(router: &Router) -> Result<Self, Self::Error> {
        if router.asn == 0 {
            return Err(FromK8sConversionError::Invalid(
                "Invalid router ASN 0".to_string(),
            ));
        }

        let router_id = router
            .id
            .as_ref()
            .map(|id| {
                id.parse::<Ipv4Addr>().map_err(|e| {
                    FromK8sConversionError::ParseError(format!("Invalid router ID {id}: {e}"))
                })
            })
            .transpose()?;

        let mut bgp = BgpRouter::new(router.asn, router.vrf.as_deref().unwrap_or_default())
            .set_router_id(router_id);

        for neighbor in &router.neighbors {
            bgp.add_neighbor(BgpNeighbor::try_from(neighbor)?);
        }
        for prefix in &router.prefixes {
            let prefix = prefix.parse::<IpNet>().map_err(|e| {
                FromK8sConversionError::ParseError(format!("Invalid prefix {prefix}: {e}"))
            })?;
            bgp.add_prefix(prefix);
        }
        Ok(bgp)
    }
}
