//! Topology builder.
//!
//! One linear pass: plan the VPC, scope the gateway endpoints, plan the
//! security groups, then collect the exports. Any failure aborts the build
//! and nothing is returned.

use super::route_tables::all_route_table_ids;
use super::security_groups::plan_security_groups;
use super::subnet_plan::plan_vpc;
use crate::config::StackConfig;
use crate::models::{
    EndpointService, GatewayEndpoint, GroupRole, Output, SecurityGroup, Token, Topology, Vpc,
};
use std::error::Error;

/// Endpoints created for every VPC, by logical id.
pub const GATEWAY_ENDPOINTS: [(&str, EndpointService); 2] = [
    ("S3VpcEndpoint", EndpointService::S3),
    ("DynamoVpcEndpoint", EndpointService::DynamoDb),
];

/// Build the whole topology for one deployment target.
///
/// The same config always gives the same topology.
pub fn build_topology(config: &StackConfig) -> Result<Topology, Box<dyn Error>> {
    log::info!(
        "#Start build_topology() stack={} environment={}",
        config.stack_name,
        config.environment
    );

    let vpc = plan_vpc(config)?;
    let endpoints = plan_gateway_endpoints(&vpc, config.region.as_deref());
    let security_groups = plan_security_groups(config)?;
    let outputs = collect_outputs(&vpc, &security_groups)?;

    log::info!(
        "Built {vpc} with {} endpoint(s), {} security group(s), {} output(s)",
        endpoints.len(),
        security_groups.len(),
        outputs.len()
    );

    Ok(Topology {
        stack_name: config.stack_name.clone(),
        environment: config.environment.clone(),
        vpc,
        endpoints,
        security_groups,
        outputs,
    })
}

/// Gateway endpoints reachable from the public and private tiers.
///
/// The services tier is left out on purpose: it has no endpoint routes.
pub fn plan_gateway_endpoints(vpc: &Vpc, region: Option<&str>) -> Vec<GatewayEndpoint> {
    GATEWAY_ENDPOINTS
        .iter()
        .map(|(logical_id, service)| {
            let route_table_ids =
                all_route_table_ids(vpc.public_subnets().chain(vpc.private_subnets()));
            log::debug!(
                "endpoint {logical_id} -> {} route table(s)",
                route_table_ids.len()
            );
            GatewayEndpoint {
                logical_id: logical_id.to_string(),
                service: *service,
                service_name: service.service_name(region),
                route_table_ids,
            }
        })
        .collect()
}

/// Named exports, in a fixed order.
///
/// # Returns
/// * `Ok(Vec<Output>)` - vpc, internet gateway, public subnets with route tables,
///   private subnets, then the exported security groups
/// * `Err` - If the VPC has no internet gateway or a public subnet lacks a route table
pub fn collect_outputs(
    vpc: &Vpc,
    security_groups: &[SecurityGroup],
) -> Result<Vec<Output>, Box<dyn Error>> {
    let mut outputs = vec![
        output("vpc", Token::reference(&vpc.logical_id)),
        output("internetGateway", Token::reference(vpc.internet_gateway_id()?)),
    ];

    for subnet in vpc.public_subnets() {
        let key = format!("PublicSubnet{}", subnet.zone.label());
        let route_table_id = subnet
            .route_table_id()
            .ok_or_else(|| format!("Public subnet {} has no route table", subnet.subnet_id))?;
        outputs.push(output(
            &format!("{key}RouteTable"),
            Token::reference(route_table_id),
        ));
        outputs.push(output(&key, Token::reference(&subnet.subnet_id)));
    }

    for subnet in vpc.private_subnets() {
        outputs.push(output(
            &format!("PrivateSubnet{}", subnet.zone.label()),
            Token::reference(&subnet.subnet_id),
        ));
    }

    for role in GroupRole::ALL {
        let Some(key) = role.output_key() else {
            continue;
        };
        let group = security_groups
            .iter()
            .find(|g| g.role == role)
            .ok_or_else(|| format!("Security group {role} missing from the plan"))?;
        outputs.push(output(key, Token::get_att(&group.logical_id, "GroupId")));
    }

    Ok(outputs)
}

fn output(key: &str, value: Token) -> Output {
    Output {
        key: key.to_string(),
        value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubnetTier;

    fn staging() -> StackConfig {
        StackConfig::for_environment("staging")
    }

    #[test]
    fn test_endpoints_exclude_services_tier() {
        let topology = build_topology(&staging()).unwrap();
        let expected: Vec<String> = topology
            .vpc
            .subnets
            .iter()
            .filter(|s| s.tier != SubnetTier::Services)
            .filter_map(|s| s.route_table_id().map(str::to_string))
            .collect();
        assert_eq!(expected.len(), 6);

        assert_eq!(topology.endpoints.len(), 2);
        for endpoint in &topology.endpoints {
            assert_eq!(endpoint.route_table_ids, expected, "{}", endpoint.logical_id);
        }
        assert_eq!(topology.endpoints[0].service, EndpointService::S3);
        assert_eq!(topology.endpoints[1].service, EndpointService::DynamoDb);
    }

    #[test]
    fn test_output_keys_in_order() {
        let topology = build_topology(&staging()).unwrap();
        assert_eq!(
            topology.output_keys(),
            vec![
                "vpc",
                "internetGateway",
                "PublicSubnet1aRouteTable",
                "PublicSubnet1a",
                "PublicSubnet2bRouteTable",
                "PublicSubnet2b",
                "PublicSubnet3cRouteTable",
                "PublicSubnet3c",
                "PrivateSubnet1a",
                "PrivateSubnet2b",
                "PrivateSubnet3c",
                "SecurityGroupBastionOutput",
                "SecurityGroupPostgresOutput",
                "SecurityGroupRedisOutput",
                "SecurityGroupMemcacheOutput",
            ]
        );
        assert_eq!(
            topology.output("SecurityGroupRedisOutput"),
            Some(&Token::get_att("SecurityGroupRedis", "GroupId"))
        );
        assert_eq!(
            topology.output("internetGateway"),
            Some(&Token::reference("ControlTowerVpcIGW"))
        );
    }

    #[test]
    fn test_missing_internet_gateway_aborts() {
        let config = staging();
        let mut vpc = plan_vpc(&config).unwrap();
        vpc.internet_gateway = None;
        let groups = plan_security_groups(&config).unwrap();
        assert!(collect_outputs(&vpc, &groups).is_err());
    }

    #[test]
    fn test_missing_public_route_table_aborts() {
        let config = staging();
        let mut vpc = plan_vpc(&config).unwrap();
        vpc.subnets[0].route_table = None;
        let groups = plan_security_groups(&config).unwrap();
        let err = collect_outputs(&vpc, &groups).unwrap_err();
        assert!(err.to_string().contains("has no route table"), "{err}");
    }

    #[test]
    fn test_build_is_deterministic() {
        let config = StackConfig {
            region: Some("us-east-1".to_string()),
            ..staging()
        };
        assert_eq!(build_topology(&config).unwrap(), build_topology(&config).unwrap());
    }

    #[test]
    fn test_failed_allocation_yields_no_topology() {
        let config = StackConfig {
            vpc_cidr: "10.0.0.0/23".parse().unwrap(),
            ..staging()
        };
        assert!(build_topology(&config).is_err());
    }
}
