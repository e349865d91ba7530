//! Subnet planning.
//!
//! Carves the VPC block into one /24 per tier per zone, allocated group by
//! group from the bottom of the block, and wires each subnet's route table to
//! the internet gateway or its zone's NAT gateway.

use crate::config::{StackConfig, SUBNET_CIDR_MASK};
use crate::models::{
    next_subnet_ipv4, InternetGateway, Ipv4, NatGateway, Route, RouteTable, RouteTarget, Subnet,
    SubnetTier, Vpc, Zone,
};
use regex::Regex;
use std::error::Error;
use std::sync::OnceLock;

/// Logical id of the VPC resource.
pub const VPC_LOGICAL_ID: &str = "ControlTowerVpc";

static LOGICAL_ID_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_logical_id_regex() -> &'static Regex {
    LOGICAL_ID_REGEX.get_or_init(|| Regex::new(r"[^A-Za-z0-9]").expect("Invalid Regex"))
}

/// Strip everything a logical id may not contain.
pub fn sanitize_logical_id(input: &str) -> String {
    get_logical_id_regex().replace_all(input, "").into_owned()
}

/// Subnet group name, e.g. `staging-PrivateSubnet`.
pub fn group_name(environment: &str, tier: SubnetTier) -> String {
    format!("{environment}-{}", tier.group_suffix())
}

/// Common prefix of every resource belonging to one subnet.
fn subnet_base_id(group_name: &str, zone: &Zone) -> String {
    format!(
        "{VPC_LOGICAL_ID}{}Subnet{}",
        sanitize_logical_id(group_name),
        zone.index + 1
    )
}

/// Hands out consecutive blocks of one prefix length inside the VPC block.
struct CidrAllocator {
    vpc_cidr: Ipv4,
    next: Option<Ipv4>,
}

impl CidrAllocator {
    fn new(vpc_cidr: Ipv4, mask: u8) -> Result<CidrAllocator, Box<dyn Error>> {
        let vpc_cidr = vpc_cidr.network();
        let first = vpc_cidr.first_subnet(mask)?;
        Ok(CidrAllocator {
            vpc_cidr,
            next: Some(first),
        })
    }

    fn allocate(&mut self) -> Result<Ipv4, Box<dyn Error>> {
        let cidr = self
            .next
            .take()
            .ok_or_else(|| format!("Address space of {} exhausted", self.vpc_cidr))?;
        if !self.vpc_cidr.contains(&cidr) {
            return Err(format!("{cidr} does not fit in VPC block {}", self.vpc_cidr).into());
        }
        // the block after the last one may not exist; only fail if it is asked for
        self.next = next_subnet_ipv4(cidr, None).ok();
        Ok(cidr)
    }
}

/// Plan the VPC: zones, subnets, route tables and gateways.
///
/// # Arguments
/// * `config` - Deployment target; only the environment, region, CIDR and zone count are used
///
/// # Returns
/// * `Ok(Vpc)` - The planned network
/// * `Err` - If the VPC block cannot hold every subnet
pub fn plan_vpc(config: &StackConfig) -> Result<Vpc, Box<dyn Error>> {
    let zones: Vec<Zone> = (0..config.az_count())
        .map(|i| Zone::new(i, config.region.as_deref()))
        .collect();
    log::info!(
        "Planning VPC {} over {} zone(s) in {}",
        config.vpc_cidr,
        zones.len(),
        config.target()
    );

    let internet_gateway = InternetGateway {
        logical_id: format!("{VPC_LOGICAL_ID}IGW"),
        attachment_id: format!("{VPC_LOGICAL_ID}VPCGW"),
    };

    let mut allocator = CidrAllocator::new(config.vpc_cidr, SUBNET_CIDR_MASK)?;
    let mut subnets = Vec::with_capacity(zones.len() * SubnetTier::ALL.len());
    let mut nat_gateways = Vec::with_capacity(zones.len());

    for tier in SubnetTier::ALL {
        let group = group_name(&config.environment, tier);
        for zone in &zones {
            let cidr = allocator.allocate()?;
            let base_id = subnet_base_id(&group, zone);

            let target = if tier.is_public() {
                nat_gateways.push(NatGateway {
                    logical_id: format!("{base_id}NATGateway"),
                    eip_id: format!("{base_id}EIP"),
                    subnet_id: format!("{base_id}Subnet"),
                    zone_index: zone.index,
                });
                RouteTarget::InternetGateway(internet_gateway.logical_id.clone())
            } else {
                let nat = nat_gateways
                    .iter()
                    .find(|nat| nat.zone_index == zone.index)
                    .ok_or_else(|| format!("No NAT gateway in zone {}", zone.label()))?;
                RouteTarget::NatGateway(nat.logical_id.clone())
            };

            let route_table = RouteTable {
                route_table_id: format!("{base_id}RouteTable"),
                routes: vec![Route {
                    logical_id: format!("{base_id}DefaultRoute"),
                    destination: Ipv4::any(),
                    target,
                }],
            };

            log::debug!(
                "subnet {group} zone={} cidr={cidr} route_table={}",
                zone.label(),
                route_table.route_table_id
            );
            subnets.push(Subnet {
                subnet_id: format!("{base_id}Subnet"),
                group_name: group.clone(),
                tier,
                zone: zone.clone(),
                cidr,
                route_table: Some(route_table),
            });
        }
    }

    log::info!(
        "Planned {} subnets and {} NAT gateway(s)",
        subnets.len(),
        nat_gateways.len()
    );

    Ok(Vpc {
        logical_id: VPC_LOGICAL_ID.to_string(),
        cidr: config.vpc_cidr.network(),
        zones,
        subnets,
        internet_gateway: Some(internet_gateway),
        nat_gateways,
    })
}
