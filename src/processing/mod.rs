//! Topology construction logic.
//!
//! This module contains the builder and the helpers it is made of:
//! - [`route_tables`] - Stable de-duplication of subnet route tables
//! - [`subnet_plan`] - CIDR allocation, route tables and gateways
//! - [`security_groups`] - The security group rule graph
//! - [`topology`] - The builder tying it together, plus exports
//! - [`checks`] - Post-build consistency checks

pub mod checks;
pub mod route_tables;
pub mod security_groups;
pub mod subnet_plan;
pub mod topology;

// Re-export public functions
pub use checks::{
    check_topology, find_asymmetric_rules, find_overlapping_subnets, find_subnets_outside_vpc,
};
pub use route_tables::all_route_table_ids;
pub use security_groups::{plan_security_groups, SecurityGroupPlan};
pub use subnet_plan::plan_vpc;
pub use topology::{build_topology, collect_outputs, plan_gateway_endpoints};
