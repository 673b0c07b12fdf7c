// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Configuration model: BGP

use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr};

use ipnet::IpNet;

/// How a neighbor is reached: by address, or over an interface (unnumbered)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BgpNeighType {
    Host(IpAddr),
    Interface(String),
}

impl Display for BgpNeighType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BgpNeighType::Host(addr) => write!(f, "{addr}"),
            BgpNeighType::Interface(ifname) => write!(f, "{ifname}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BgpNeighbor {
    pub ntype: BgpNeighType,
    pub remote_as: u32,
    pub port: Option<u16>,
    pub bfd_profile: Option<String>,
    pub ebgp_multihop: bool,
}

impl BgpNeighbor {
    #[must_use]
    pub fn new(ntype: BgpNeighType, remote_as: u32) -> Self {
        Self {
            ntype,
            remote_as,
            port: None,
            bfd_profile: None,
            ebgp_multihop: false,
        }
    }

    #[must_use]
    pub fn set_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn set_bfd_profile(mut self, profile: Option<String>) -> Self {
        self.bfd_profile = profile;
        self
    }

    #[must_use]
    pub fn set_ebgp_multihop(mut self, value: bool) -> Self {
        self.ebgp_multihop = value;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BgpRouter {
    pub asn: u32,
    pub router_id: Option<Ipv4Addr>,
    /// empty for the default VRF
    pub vrf: String,
    pub neighbors: Vec<BgpNeighbor>,
    pub prefixes: Vec<IpNet>,
}

impl BgpRouter {
    #[must_use]
    pub fn new(asn: u32, vrf: &str) -> Self {
        Self {
            asn,
            router_id: None,
            vrf: vrf.to_owned(),
            neighbors: vec![],
            prefixes: vec![],
        }
    }

    #[must_use]
    pub fn set_router_id(mut self, router_id: Option<Ipv4Addr>) -> Self {
        self.router_id = router_id;
        self
    }

    pub fn add_neighbor(&mut self, neighbor: BgpNeighbor) {
        self.neighbors.push(neighbor);
    }

    pub fn add_prefix(&mut self, prefix: IpNet) {
        self.prefixes.push(prefix);
    }
}
