//! CSV output of the declared topology.

use crate::models::{broadcast_addr, num_aws_hosts, Topology};
use itertools::Itertools;
use std::error::Error;

use super::terminal::format_field;

/// One subnet, ready for printing.
#[derive(Debug)]
pub struct SubnetPrintRow {
    pub zone: String,
    pub tier: String,
    pub subnet_cidr: String,
    pub broadcast: String,
    /// Usable host addresses after the AWS reservation.
    pub aws_hosts: u64,
    pub group_name: String,
    pub route_table: String,
    pub subnet_id: String,
}

/// One declared rule, duplicates included.
#[derive(Debug)]
pub struct RulePrintRow {
    pub group: String,
    pub direction: String,
    pub peer: String,
    pub port: String,
    pub description: String,
}

pub fn subnet_rows(topology: &Topology) -> Result<Vec<SubnetPrintRow>, Box<dyn Error>> {
    topology
        .vpc
        .subnets
        .iter()
        .map(|s| -> Result<SubnetPrintRow, Box<dyn Error>> {
            Ok(SubnetPrintRow {
                zone: s.zone.label(),
                tier: s.tier.to_string(),
                subnet_cidr: s.cidr.to_string(),
                broadcast: broadcast_addr(s.cidr.addr, s.cidr.mask)?.to_string(),
                aws_hosts: num_aws_hosts(s.cidr.mask)?,
                group_name: s.group_name.clone(),
                route_table: s.route_table_id().unwrap_or("None").to_string(),
                subnet_id: s.subnet_id.clone(),
            })
        })
        .collect()
}

pub fn rule_rows(topology: &Topology) -> Vec<RulePrintRow> {
    topology
        .security_groups
        .iter()
        .flat_map(|g| {
            g.rules().map(move |r| RulePrintRow {
                group: g.role.to_string(),
                direction: r.direction.to_string(),
                peer: r.peer.to_string(),
                port: r.port.to_string(),
                description: r.describe(),
            })
        })
        .collect()
}

fn format_subnet_row(row: &SubnetPrintRow) -> String {
    format!(
        r#"{zone},{tier},{subnet_cidr},{broadcast},{group_name},{route_table},{subnet_id}"#,
        zone = format_field(&row.zone, 6),
        tier = format_field(&row.tier, 10),
        subnet_cidr = format_field(&row.subnet_cidr, 15),
        broadcast = format_field(format!("{}_br({}h)", row.broadcast, row.aws_hosts), 22),
        group_name = format_field(&row.group_name, 24),
        route_table = format_field(&row.route_table, 50),
        subnet_id = format_field(&row.subnet_id, 46),
    )
}

fn format_rule_row(row: &RulePrintRow) -> String {
    format!(
        r#"{group},{direction},{peer},{port},{description}"#,
        group = format_field(&row.group, 15),
        direction = format_field(&row.direction, 9),
        peer = format_field(&row.peer, 18),
        port = format_field(&row.port, 20),
        description = format_field(&row.description, 40),
    )
}

/// Print every subnet as CSV to stdout.
pub fn subnet_print(topology: &Topology) -> Result<(), Box<dyn Error>> {
    log::info!(
        "#Start subnet_print() {} subnets in {}",
        topology.vpc.subnets.len(),
        topology.vpc
    );
    println!(r#""zone","tier","subnet_cidr","broadcast","group_name","route_table","subnet_id""#);
    for row in subnet_rows(topology)? {
        println!("{}", format_subnet_row(&row));
    }
    Ok(())
}

/// Print every declared rule as CSV to stdout.
pub fn rule_print(topology: &Topology) {
    let rows = rule_rows(topology);
    log::info!("#Start rule_print() {} rules", rows.len());
    println!(r#""group","direction","peer","port","description""#);
    for row in rows {
        println!("{}", format_rule_row(&row));
    }
}

/// Print the export map as `key,value` pairs.
pub fn outputs_print(topology: &Topology) {
    println!(r#""output","value""#);
    println!(
        "{}",
        topology
            .outputs
            .iter()
            .map(|o| format!("{},{}", format_field(&o.key, 30), format_field(&o.value, 50)))
            .join("\n")
    );
}
