//! Consistency checks over a finished topology.
//!
//! The builder itself never validates. These run afterwards and report what
//! the provisioning engine would reject or what would leave traffic half open.

use crate::models::{Direction, Peer, Rule, SecurityGroup, Topology, Vpc};
use colored::Colorize;
use std::collections::HashSet;
use std::error::Error;

/// Two subnets whose blocks share addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlapConflict {
    pub first: String,
    pub second: String,
}

/// An egress rule toward a group that the group does not accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsymmetricRule {
    /// Group holding the egress rule.
    pub source: String,
    /// Group the rule points at.
    pub target: String,
    pub rule: Rule,
}

/// Find pairs of subnets with overlapping CIDR blocks.
pub fn find_overlapping_subnets(vpc: &Vpc) -> Vec<OverlapConflict> {
    let mut conflicts = vec![];
    for (i, a) in vpc.subnets.iter().enumerate() {
        for b in vpc.subnets.iter().skip(i + 1) {
            if a.cidr.overlaps(&b.cidr) {
                conflicts.push(OverlapConflict {
                    first: format!("{} {}", a.subnet_id, a.cidr),
                    second: format!("{} {}", b.subnet_id, b.cidr),
                });
            }
        }
    }
    conflicts
}

/// Subnets not contained in the VPC block.
pub fn find_subnets_outside_vpc(vpc: &Vpc) -> Vec<String> {
    vpc.subnets
        .iter()
        .filter(|s| !vpc.cidr.contains(&s.cidr))
        .map(|s| format!("{} {}", s.subnet_id, s.cidr))
        .collect()
}

/// Egress rules with a group peer that lack the matching ingress on the peer.
///
/// A match is an ingress rule on the target group whose peer is the source
/// group, with the same protocol and port range.
pub fn find_asymmetric_rules(groups: &[SecurityGroup]) -> Vec<AsymmetricRule> {
    let accepted: HashSet<_> = groups
        .iter()
        .flat_map(|g| {
            g.ingress.iter().filter_map(move |r| match r.peer {
                Peer::Group(source) => Some((source, g.role, r.port)),
                _ => None,
            })
        })
        .collect();

    let mut missing = vec![];
    for group in groups {
        for rule in &group.egress {
            let Peer::Group(target) = rule.peer else {
                continue;
            };
            if !accepted.contains(&(group.role, target, rule.port)) {
                missing.push(AsymmetricRule {
                    source: group.logical_id.clone(),
                    target: target.logical_id().to_string(),
                    rule: rule.clone(),
                });
            }
        }
    }
    missing
}

/// Run every check, log the findings and fail if there were any.
pub fn check_topology(topology: &Topology) -> Result<(), Box<dyn Error>> {
    let overlaps = find_overlapping_subnets(&topology.vpc);
    for conflict in &overlaps {
        log::warn!(
            "{} subnet {} overlaps {}",
            "OVERLAP".on_red(),
            conflict.first,
            conflict.second
        );
    }

    let outside = find_subnets_outside_vpc(&topology.vpc);
    for subnet in &outside {
        log::warn!(
            "{} subnet {} is outside VPC block {}",
            "OUTSIDE".on_red(),
            subnet,
            topology.vpc.cidr
        );
    }

    let asymmetric = find_asymmetric_rules(&topology.security_groups);
    for missing in &asymmetric {
        log::warn!(
            "{} {} {} {} has no matching {} on {}",
            "ASYMMETRIC".on_red(),
            missing.source,
            Direction::Egress,
            missing.rule.port,
            Direction::Ingress,
            missing.target
        );
    }

    let problems = overlaps.len() + outside.len() + asymmetric.len();
    if problems > 0 {
        return Err(format!(
            "Topology check failed: {} overlap(s), {} subnet(s) outside the VPC, {} asymmetric rule(s)",
            overlaps.len(),
            outside.len(),
            asymmetric.len()
        )
        .into());
    }
    log::info!("Topology checks passed");
    Ok(())
}
