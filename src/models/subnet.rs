//! Subnet data model.

use super::{Ipv4, Token};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role classification of a subnet group.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubnetTier {
    /// Direct route to the internet gateway.
    Public,
    /// Outbound-only through the zone's NAT gateway.
    Private,
    /// Same routing as [`SubnetTier::Private`], reserved for managed services.
    Services,
}

impl SubnetTier {
    /// Allocation order of the subnet groups.
    pub const ALL: [SubnetTier; 3] = [SubnetTier::Public, SubnetTier::Private, SubnetTier::Services];

    /// Suffix of the subnet group name, `{env}-{suffix}`.
    pub fn group_suffix(&self) -> &'static str {
        match self {
            SubnetTier::Public => "PublicSubnet",
            SubnetTier::Private => "PrivateSubnet",
            SubnetTier::Services => "ServicesSubnet",
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self, SubnetTier::Public)
    }

    /// Subnet type as the engine knows it.
    pub fn subnet_type(&self) -> &'static str {
        match self {
            SubnetTier::Public => "Public",
            SubnetTier::Private | SubnetTier::Services => "Private",
        }
    }
}

impl fmt::Display for SubnetTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubnetTier::Public => "public",
            SubnetTier::Private => "private",
            SubnetTier::Services => "services",
        };
        write!(f, "{name}")
    }
}

/// One availability zone the VPC spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    /// Zero-based position in the zone list.
    pub index: usize,
    /// Resolved zone name or a lookup in the ambient region.
    pub availability_zone: Token,
}

impl Zone {
    pub fn new(index: usize, region: Option<&str>) -> Zone {
        let availability_zone = match region {
            Some(region) => Token::literal(format!("{region}{}", zone_letter(index))),
            None => Token::SelectAz(index),
        };
        Zone {
            index,
            availability_zone,
        }
    }

    /// Lowercase letter for the zone (`a`, `b`, `c`, ...).
    pub fn letter(&self) -> char {
        zone_letter(self.index)
    }

    /// One-based number followed by the zone letter, e.g. `1a`.
    pub fn label(&self) -> String {
        format!("{}{}", self.index + 1, self.letter())
    }
}

/// Letter suffix derived from a zero-based zone index.
pub fn zone_letter(index: usize) -> char {
    (b'a' + (index % 26) as u8) as char
}

/// Where a route sends its traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    InternetGateway(String),
    NatGateway(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub logical_id: String,
    pub destination: Ipv4,
    pub target: RouteTarget,
}

/// Route table owned by the VPC and referenced by a subnet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    /// Logical id; an empty id means the table is not usable as a reference.
    pub route_table_id: String,
    pub routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(route_table_id: impl Into<String>) -> RouteTable {
        RouteTable {
            route_table_id: route_table_id.into(),
            routes: vec![],
        }
    }
}

/// A subnet of the VPC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subnet {
    /// Logical id of the subnet resource.
    pub subnet_id: String,
    /// Subnet group name, e.g. `staging-PublicSubnet`.
    pub group_name: String,
    pub tier: SubnetTier,
    pub zone: Zone,
    pub cidr: Ipv4,
    pub route_table: Option<RouteTable>,
}

impl Subnet {
    /// Id of the attached route table, unless absent or empty.
    pub fn route_table_id(&self) -> Option<&str> {
        self.route_table
            .as_ref()
            .map(|rt| rt.route_table_id.as_str())
            .filter(|id| !id.is_empty())
    }
}
