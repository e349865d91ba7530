//! Virtual private cloud (VPC) data model.

use super::{Ipv4, Subnet, SubnetTier, Token, Zone};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternetGateway {
    pub logical_id: String,
    /// Logical id of the gateway-to-VPC attachment.
    pub attachment_id: String,
}

/// NAT gateway serving the private subnets of one zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NatGateway {
    pub logical_id: String,
    /// Elastic IP the gateway translates to.
    pub eip_id: String,
    /// Public subnet the gateway lives in.
    pub subnet_id: String,
    pub zone_index: usize,
}

/// Represents a VPC with its subnets and gateways.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vpc {
    pub logical_id: String,
    pub cidr: Ipv4,
    pub zones: Vec<Zone>,
    /// Subnets in allocation order: every zone of one tier before the next tier.
    pub subnets: Vec<Subnet>,
    pub internet_gateway: Option<InternetGateway>,
    pub nat_gateways: Vec<NatGateway>,
}

impl Vpc {
    /// Subnets of one tier, ordered by zone.
    pub fn subnets_of(&self, tier: SubnetTier) -> impl Iterator<Item = &Subnet> {
        self.subnets.iter().filter(move |s| s.tier == tier)
    }

    pub fn public_subnets(&self) -> impl Iterator<Item = &Subnet> {
        self.subnets_of(SubnetTier::Public)
    }

    pub fn private_subnets(&self) -> impl Iterator<Item = &Subnet> {
        self.subnets_of(SubnetTier::Private)
    }

    pub fn services_subnets(&self) -> impl Iterator<Item = &Subnet> {
        self.subnets_of(SubnetTier::Services)
    }

    /// Logical id of the internet gateway, failing when the VPC has none.
    pub fn internet_gateway_id(&self) -> Result<&str, Box<dyn std::error::Error>> {
        self.internet_gateway
            .as_ref()
            .map(|igw| igw.logical_id.as_str())
            .ok_or_else(|| format!("VPC {} has no internet gateway", self.logical_id).into())
    }
}

impl fmt::Display for Vpc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] ({} subnets, {} zones)",
            self.logical_id,
            self.cidr,
            self.subnets.len(),
            self.zones.len()
        )
    }
}

/// Managed service reachable through a gateway endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointService {
    S3,
    DynamoDb,
}

impl EndpointService {
    pub fn service(&self) -> &'static str {
        match self {
            EndpointService::S3 => "s3",
            EndpointService::DynamoDb => "dynamodb",
        }
    }

    /// Regional service name, using the deploy-time region when none is configured.
    pub fn service_name(&self, region: Option<&str>) -> Token {
        match region {
            Some(region) => Token::literal(format!("com.amazonaws.{region}.{}", self.service())),
            None => Token::Sub(format!("com.amazonaws.${{AWS::Region}}.{}", self.service())),
        }
    }
}

/// Gateway endpoint scoped to a set of route tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayEndpoint {
    pub logical_id: String,
    pub service: EndpointService,
    pub service_name: Token,
    pub route_table_ids: Vec<String>,
}
