//! Domain models for the VPC topology.
//!
//! This module contains the data structures the builder produces:
//! - [`Ipv4`] - CIDR block arithmetic
//! - [`Subnet`], [`RouteTable`] and [`Zone`] - subnet layout
//! - [`Vpc`] and [`GatewayEndpoint`] - the network and its service endpoints
//! - [`SecurityGroup`] and [`Rule`] - traffic policy between roles
//! - [`Token`] - deploy-time values
//! - [`Topology`] - the finished graph

mod ipv4;
mod security_group;
mod subnet;
mod token;
mod topology;
mod vpc;

// Re-export public types
pub use ipv4::{
    broadcast_addr, cut_addr, get_cidr_mask, ip_after_subnet, next_subnet_ipv4, num_aws_hosts,
    Ipv4, AWS_RESERVED_ADDRESSES, MAX_LENGTH,
};
pub use security_group::{Direction, GroupRole, Peer, PortSpec, Protocol, Rule, SecurityGroup};
pub use subnet::{zone_letter, Route, RouteTable, RouteTarget, Subnet, SubnetTier, Zone};
pub use token::Token;
pub use topology::{Output, Topology};
pub use vpc::{EndpointService, GatewayEndpoint, InternetGateway, NatGateway, Vpc};
