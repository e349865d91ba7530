//! Terminal output utilities.
//!
//! Provides formatting helpers for terminal output.

use crate::models::Topology;
use colored::Colorize;

/// Format a value as a quoted, right-aligned field.
///
/// # Arguments
/// * `value` - The value to format
/// * `width` - The minimum width of the field
///
/// # Returns
/// A quoted, right-aligned string
pub fn format_field<T: ToString>(value: T, width: usize) -> String {
    let quoted = format!("\"{}\"", value.to_string());
    format!("{quoted:>width$}")
}

/// One-line summary of a topology.
pub fn summary_line(topology: &Topology) -> String {
    format!(
        "{stack} [{env}] vpc {cidr}: {zones} zone(s), {subnets} subnets, {endpoints} endpoints, {groups} security groups, {outputs} outputs",
        stack = topology.stack_name,
        env = topology.environment,
        cidr = topology.vpc.cidr,
        zones = topology.vpc.zones.len(),
        subnets = topology.vpc.subnets.len(),
        endpoints = topology.endpoints.len(),
        groups = topology.security_groups.len(),
        outputs = topology.outputs.len(),
    )
}

/// Print the summary with a highlighted marker.
pub fn print_summary(topology: &Topology) {
    println!("#{}# {}", "TOPOLOGY".on_blue(), summary_line(topology));
}
