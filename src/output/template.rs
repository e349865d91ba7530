//! Template synthesis.
//!
//! Renders a finished [`Topology`] as a CloudFormation template in one pass.
//! Logical ids must be unique in a template, so repeated rule declarations
//! collapse into a single resource here; the topology itself keeps them.

use crate::models::{
    Direction, Peer, PortSpec, Protocol, Rule, RouteTarget, SecurityGroup, Subnet, Token, Topology,
};
use itertools::Itertools;
use serde_json::{json, Map, Value};
use std::error::Error;
use std::path::Path;

/// Egress rule that matches nothing, for groups that may not send at all.
fn disallow_all_egress() -> Value {
    json!({
        "CidrIp": "255.255.255.255/32",
        "Description": "Disallow all traffic",
        "FromPort": 252,
        "IpProtocol": "icmp",
        "ToPort": 86
    })
}

fn tags(pairs: &[(&str, &str)]) -> Value {
    let tags: Vec<Value> = pairs
        .iter()
        .sorted_by_key(|(key, _)| *key)
        .map(|(key, value)| json!({"Key": key, "Value": value}))
        .collect();
    Value::Array(tags)
}

fn name_tag(name: &str) -> Value {
    tags(&[("Name", name)])
}

/// Resources keyed by logical id; the first declaration of an id wins.
#[derive(Default)]
struct Resources {
    map: Map<String, Value>,
    skipped: usize,
}

impl Resources {
    fn add(&mut self, logical_id: &str, resource_type: &str, properties: Value) {
        self.add_resource(
            logical_id,
            json!({"Type": resource_type, "Properties": properties}),
        );
    }

    fn add_resource(&mut self, logical_id: &str, resource: Value) {
        if self.map.contains_key(logical_id) {
            log::debug!("skipping repeated declaration of {logical_id}");
            self.skipped += 1;
            return;
        }
        self.map.insert(logical_id.to_string(), resource);
    }
}

/// Id fragment for a port spec, e.g. `Tcp6443`, `Tcp0to65535`, `IcmpAll`, `Icmp3Any`.
fn port_id(port: &PortSpec) -> String {
    let protocol = match port.protocol {
        Protocol::Tcp => "Tcp",
        Protocol::Udp => "Udp",
        Protocol::Icmp => "Icmp",
    };
    match (port.from, port.to) {
        (-1, _) => format!("{protocol}All"),
        (from, to) if from == to => format!("{protocol}{from}"),
        (from, -1) => format!("{protocol}{from}Any"),
        (from, to) => format!("{protocol}{from}to{to}"),
    }
}

fn group_id(logical_id: &str) -> Token {
    Token::get_att(logical_id, "GroupId")
}

/// Inline rule for a CIDR peer.
fn inline_rule(rule: &Rule) -> Option<Value> {
    let cidr = rule.peer.cidr()?;
    Some(json!({
        "CidrIp": cidr.to_string(),
        "Description": rule.describe(),
        "FromPort": rule.port.from,
        "IpProtocol": rule.port.protocol.ip_protocol(),
        "ToPort": rule.port.to
    }))
}

fn inline_rules<'a>(rules: impl Iterator<Item = &'a Rule>) -> Vec<Value> {
    rules
        .filter(|r| r.peer.cidr().is_some())
        .unique_by(|r| (r.peer, r.port))
        .filter_map(inline_rule)
        .collect()
}

fn add_security_group(resources: &mut Resources, topology: &Topology, group: &SecurityGroup) {
    let mut properties = json!({
        "GroupDescription": group.description,
        "VpcId": Token::reference(&topology.vpc.logical_id),
    });

    // group-peer egress lives in separate resources; an empty inline list would allow all
    let mut egress = inline_rules(group.egress.iter());
    if egress.is_empty() {
        egress.push(disallow_all_egress());
    }
    properties["SecurityGroupEgress"] = Value::Array(egress);

    let ingress = inline_rules(group.ingress.iter());
    if !ingress.is_empty() {
        properties["SecurityGroupIngress"] = Value::Array(ingress);
    }
    if let Some(name) = &group.name_tag {
        properties["Tags"] = name_tag(name);
    }
    resources.add(&group.logical_id, "AWS::EC2::SecurityGroup", properties);

    for rule in group.rules() {
        let Peer::Group(peer) = rule.peer else {
            continue;
        };
        let peer_id = peer.logical_id();
        let mut properties = json!({
            "Description": rule.describe(),
            "FromPort": rule.port.from,
            "GroupId": group_id(&group.logical_id),
            "IpProtocol": rule.port.protocol.ip_protocol(),
            "ToPort": rule.port.to,
        });
        let (logical_id, resource_type) = match rule.direction {
            Direction::Ingress => {
                properties["SourceSecurityGroupId"] = json!(group_id(peer_id));
                (
                    format!("{}From{peer_id}{}", group.logical_id, port_id(&rule.port)),
                    "AWS::EC2::SecurityGroupIngress",
                )
            }
            Direction::Egress => {
                properties["DestinationSecurityGroupId"] = json!(group_id(peer_id));
                (
                    format!("{}To{peer_id}{}", group.logical_id, port_id(&rule.port)),
                    "AWS::EC2::SecurityGroupEgress",
                )
            }
        };
        resources.add(&logical_id, resource_type, properties);
    }
}

fn add_subnet(resources: &mut Resources, topology: &Topology, subnet: &Subnet) {
    let vpc = &topology.vpc;
    let path = format!(
        "{}/{}/{}Subnet{}",
        topology.stack_name,
        vpc.logical_id,
        subnet.group_name,
        subnet.zone.index + 1
    );
    let subnet_tags = tags(&[
        ("Name", path.as_str()),
        ("subnet-name", subnet.group_name.as_str()),
        ("subnet-type", subnet.tier.subnet_type()),
    ]);

    resources.add(
        &subnet.subnet_id,
        "AWS::EC2::Subnet",
        json!({
            "AvailabilityZone": subnet.zone.availability_zone,
            "CidrBlock": subnet.cidr.to_string(),
            "MapPublicIpOnLaunch": subnet.tier.is_public(),
            "Tags": subnet_tags,
            "VpcId": Token::reference(&vpc.logical_id),
        }),
    );

    let Some(route_table) = &subnet.route_table else {
        return;
    };
    if route_table.route_table_id.is_empty() {
        return;
    }
    resources.add(
        &route_table.route_table_id,
        "AWS::EC2::RouteTable",
        json!({
            "Tags": name_tag(&path),
            "VpcId": Token::reference(&vpc.logical_id),
        }),
    );
    resources.add(
        &format!("{}Association", route_table.route_table_id),
        "AWS::EC2::SubnetRouteTableAssociation",
        json!({
            "RouteTableId": Token::reference(&route_table.route_table_id),
            "SubnetId": Token::reference(&subnet.subnet_id),
        }),
    );

    for route in &route_table.routes {
        let mut properties = json!({
            "DestinationCidrBlock": route.destination.to_string(),
            "RouteTableId": Token::reference(&route_table.route_table_id),
        });
        let mut resource = Map::new();
        resource.insert("Type".to_string(), json!("AWS::EC2::Route"));
        match &route.target {
            RouteTarget::InternetGateway(igw) => {
                properties["GatewayId"] = json!(Token::reference(igw));
                if let Some(gateway) = &vpc.internet_gateway {
                    resource.insert("DependsOn".to_string(), json!([gateway.attachment_id]));
                }
            }
            RouteTarget::NatGateway(nat) => {
                properties["NatGatewayId"] = json!(Token::reference(nat));
            }
        }
        resource.insert("Properties".to_string(), properties);
        resources.add_resource(&route.logical_id, Value::Object(resource));
    }
}

/// Render the topology as a template document.
pub fn synthesize(topology: &Topology) -> Value {
    log::info!("#Start synthesize() stack={}", topology.stack_name);
    let vpc = &topology.vpc;
    let mut resources = Resources::default();

    resources.add(
        &vpc.logical_id,
        "AWS::EC2::VPC",
        json!({
            "CidrBlock": vpc.cidr.to_string(),
            "EnableDnsHostnames": true,
            "EnableDnsSupport": true,
            "InstanceTenancy": "default",
            "Tags": name_tag(&format!("{}/{}", topology.stack_name, vpc.logical_id)),
        }),
    );

    for subnet in &vpc.subnets {
        add_subnet(&mut resources, topology, subnet);
    }

    for nat in &vpc.nat_gateways {
        let name = format!("{}/{}", topology.stack_name, nat.logical_id);
        resources.add(
            &nat.eip_id,
            "AWS::EC2::EIP",
            json!({"Domain": "vpc", "Tags": name_tag(&name)}),
        );
        resources.add(
            &nat.logical_id,
            "AWS::EC2::NatGateway",
            json!({
                "AllocationId": Token::get_att(&nat.eip_id, "AllocationId"),
                "SubnetId": Token::reference(&nat.subnet_id),
                "Tags": name_tag(&name),
            }),
        );
    }

    if let Some(igw) = &vpc.internet_gateway {
        resources.add(
            &igw.logical_id,
            "AWS::EC2::InternetGateway",
            json!({"Tags": name_tag(&format!("{}/{}", topology.stack_name, vpc.logical_id))}),
        );
        resources.add(
            &igw.attachment_id,
            "AWS::EC2::VPCGatewayAttachment",
            json!({
                "InternetGatewayId": Token::reference(&igw.logical_id),
                "VpcId": Token::reference(&vpc.logical_id),
            }),
        );
    }

    for endpoint in &topology.endpoints {
        let route_table_ids: Vec<Token> = endpoint
            .route_table_ids
            .iter()
            .map(Token::reference)
            .collect();
        resources.add(
            &endpoint.logical_id,
            "AWS::EC2::VPCEndpoint",
            json!({
                "RouteTableIds": route_table_ids,
                "ServiceName": endpoint.service_name,
                "VpcEndpointType": "Gateway",
                "VpcId": Token::reference(&vpc.logical_id),
            }),
        );
    }

    for group in &topology.security_groups {
        add_security_group(&mut resources, topology, group);
    }

    let mut outputs = Map::new();
    for output in &topology.outputs {
        outputs.insert(output.key.clone(), json!({"Value": output.value}));
    }

    log::info!(
        "Synthesized {} resources and {} outputs ({} repeated declarations skipped)",
        resources.map.len(),
        outputs.len(),
        resources.skipped
    );

    json!({
        "Description": format!(
            "{} network topology ({})",
            topology.environment, topology.stack_name
        ),
        "Resources": Value::Object(resources.map),
        "Outputs": Value::Object(outputs),
    })
}

/// Write a template as pretty JSON, creating parent directories as needed.
pub fn write_template(template: &Value, path: &str) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Error creating directory {}: {e}", parent.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(template)
        .map_err(|e| format!("Error serializing template: {e}"))?;
    std::fs::write(path, json).map_err(|e| format!("Error writing template {path}: {e}"))?;
    log::info!("Wrote template to {path}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackConfig;
    use crate::models::GroupRole;
    use crate::processing::build_topology;

    fn template() -> Value {
        let topology = build_topology(&StackConfig::for_environment("staging")).unwrap();
        synthesize(&topology)
    }

    fn count_type(template: &Value, resource_type: &str) -> usize {
        template["Resources"]
            .as_object()
            .unwrap()
            .values()
            .filter(|r| r["Type"] == resource_type)
            .count()
    }

    #[test]
    fn test_resource_counts() {
        let template = template();
        assert_eq!(count_type(&template, "AWS::EC2::VPC"), 1);
        assert_eq!(count_type(&template, "AWS::EC2::Subnet"), 9);
        assert_eq!(count_type(&template, "AWS::EC2::RouteTable"), 9);
        assert_eq!(count_type(&template, "AWS::EC2::SubnetRouteTableAssociation"), 9);
        assert_eq!(count_type(&template, "AWS::EC2::Route"), 9);
        assert_eq!(count_type(&template, "AWS::EC2::NatGateway"), 3);
        assert_eq!(count_type(&template, "AWS::EC2::EIP"), 3);
        assert_eq!(count_type(&template, "AWS::EC2::InternetGateway"), 1);
        assert_eq!(count_type(&template, "AWS::EC2::VPCEndpoint"), 2);
        assert_eq!(count_type(&template, "AWS::EC2::SecurityGroup"), 8);
    }

    #[test]
    fn test_duplicate_rules_collapse() {
        let template = template();
        // 6 data store ingress + 7 distinct worker ports + 1 cluster ingress
        assert_eq!(count_type(&template, "AWS::EC2::SecurityGroupIngress"), 14);
        assert_eq!(count_type(&template, "AWS::EC2::SecurityGroupEgress"), 7);
        let https = &template["Resources"]
            ["SecurityGroupKubeWorkerFromSecurityGroupDeisElbTcp6443"]["Properties"];
        assert_eq!(https["Description"], "SecurityGroupDeisElbHttpsIngress");
        assert_eq!(
            https["SourceSecurityGroupId"],
            json!({"Fn::GetAtt": ["SecurityGroupDeisElb", "GroupId"]})
        );
    }

    #[test]
    fn test_inline_rules_and_placeholder() {
        let template = template();
        let resources = &template["Resources"];

        let bastion_egress = resources["SecurityGroupBastion"]["Properties"]["SecurityGroupEgress"]
            .as_array()
            .unwrap();
        assert_eq!(bastion_egress.len(), 3);
        assert_eq!(bastion_egress[0]["CidrIp"], "0.0.0.0/0");
        assert_eq!(bastion_egress[0]["ToPort"], 65535);
        assert_eq!(bastion_egress[2]["IpProtocol"], "icmp");
        assert_eq!(bastion_egress[2]["FromPort"], -1);

        let worker = &resources["SecurityGroupKubeWorker"]["Properties"];
        assert_eq!(worker["SecurityGroupEgress"], json!([disallow_all_egress()]));
        assert!(worker.get("Tags").is_none());

        let elb_egress = resources["SecurityGroupDeisElb"]["Properties"]["SecurityGroupEgress"]
            .as_array()
            .unwrap();
        assert_eq!(elb_egress.len(), 4);
        assert_eq!(elb_egress[3]["FromPort"], 3);
        assert_eq!(elb_egress[3]["ToPort"], 4);

        let search = &resources["SecurityGroupElasticSearch"]["Properties"];
        assert_eq!(search["SecurityGroupIngress"][0]["CidrIp"], "10.0.0.0/16");
        assert_eq!(
            search["Tags"],
            json!([{"Key": "Name", "Value": "staging-sg-elasticsearch"}])
        );
    }

    #[test]
    fn test_endpoints_reference_route_tables() {
        let template = template();
        let s3 = &template["Resources"]["S3VpcEndpoint"]["Properties"];
        assert_eq!(s3["VpcEndpointType"], "Gateway");
        assert_eq!(
            s3["ServiceName"],
            json!({"Fn::Sub": "com.amazonaws.${AWS::Region}.s3"})
        );
        let ids = s3["RouteTableIds"].as_array().unwrap();
        assert_eq!(ids.len(), 6);
        assert_eq!(
            ids[0],
            json!({"Ref": "ControlTowerVpcstagingPublicSubnetSubnet1RouteTable"})
        );
        assert_eq!(
            ids[5],
            json!({"Ref": "ControlTowerVpcstagingPrivateSubnetSubnet3RouteTable"})
        );
    }

    #[test]
    fn test_routes() {
        let template = template();
        let resources = &template["Resources"];
        let public = &resources["ControlTowerVpcstagingPublicSubnetSubnet1DefaultRoute"];
        assert_eq!(public["Properties"]["GatewayId"], json!({"Ref": "ControlTowerVpcIGW"}));
        assert_eq!(public["DependsOn"], json!(["ControlTowerVpcVPCGW"]));

        let services = &resources["ControlTowerVpcstagingServicesSubnetSubnet2DefaultRoute"];
        assert_eq!(
            services["Properties"]["NatGatewayId"],
            json!({"Ref": "ControlTowerVpcstagingPublicSubnetSubnet2NATGateway"})
        );
    }

    #[test]
    fn test_subnet_properties() {
        let template = template();
        let subnet =
            &template["Resources"]["ControlTowerVpcstagingServicesSubnetSubnet3Subnet"]["Properties"];
        assert_eq!(subnet["CidrBlock"], "10.0.8.0/24");
        assert_eq!(subnet["MapPublicIpOnLaunch"], false);
        assert_eq!(
            subnet["AvailabilityZone"],
            json!({"Fn::Select": [2, {"Fn::GetAZs": ""}]})
        );
        assert_eq!(
            subnet["Tags"],
            json!([
                {"Key": "Name", "Value": "VpcStack/ControlTowerVpc/staging-ServicesSubnetSubnet3"},
                {"Key": "subnet-name", "Value": "staging-ServicesSubnet"},
                {"Key": "subnet-type", "Value": "Private"},
            ])
        );
    }

    #[test]
    fn test_outputs() {
        let template = template();
        let outputs = template["Outputs"].as_object().unwrap();
        assert_eq!(outputs.len(), 15);
        assert_eq!(outputs["vpc"], json!({"Value": {"Ref": "ControlTowerVpc"}}));
        assert_eq!(
            outputs["SecurityGroupBastionOutput"],
            json!({"Value": {"Fn::GetAtt": ["SecurityGroupBastion", "GroupId"]}})
        );
    }

    #[test]
    fn test_port_id() {
        assert_eq!(port_id(&PortSpec::tcp(6443)), "Tcp6443");
        assert_eq!(port_id(&PortSpec::all_tcp()), "Tcp0to65535");
        assert_eq!(port_id(&PortSpec::all_icmp()), "IcmpAll");
        assert_eq!(port_id(&PortSpec::icmp_type_and_code(3, 4)), "Icmp3to4");

        let any_code = PortSpec {
            protocol: Protocol::Icmp,
            from: 3,
            to: -1,
        };
        assert_eq!(port_id(&PortSpec::icmp_type_and_code(3, 3)), "Icmp3");
        assert_eq!(port_id(&any_code), "Icmp3Any");
    }

    #[test]
    fn test_group_peer_only_egress_gets_placeholder() {
        let mut topology = build_topology(&StackConfig::for_environment("staging")).unwrap();
        let elb = topology
            .security_groups
            .iter_mut()
            .find(|g| g.role == GroupRole::DeisElb)
            .unwrap();
        elb.egress.retain(|r| matches!(r.peer, Peer::Group(_)));
        assert!(!elb.egress.is_empty());

        let template = synthesize(&topology);
        let resources = &template["Resources"];
        assert_eq!(
            resources["SecurityGroupDeisElb"]["Properties"]["SecurityGroupEgress"],
            json!([disallow_all_egress()])
        );
        assert_eq!(count_type(&template, "AWS::EC2::SecurityGroupEgress"), 7);
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        assert_eq!(
            serde_json::to_string(&template()).unwrap(),
            serde_json::to_string(&template()).unwrap()
        );
    }

    #[test]
    fn test_write_template() {
        let dir = std::env::temp_dir().join(format!("vpc-topology-test-{}", std::process::id()));
        let path = dir.join("out/VpcStack.template.json");
        let path = path.to_str().unwrap();
        write_template(&template(), path).unwrap();

        let written: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written, template());
        std::fs::remove_dir_all(dir).unwrap();
    }
}
