//! Security group planning.
//!
//! Every group starts with no egress at all; whatever a group may send must be
//! declared. Rules naming another group store that group's role only.

use crate::config::StackConfig;
use crate::models::{Direction, GroupRole, Ipv4, Peer, PortSpec, Rule, SecurityGroup};
use std::error::Error;
use std::net::Ipv4Addr;

/// Block allowed to reach the search cluster over HTTPS.
pub const SEARCH_INGRESS_CIDR: Ipv4 = Ipv4 {
    addr: Ipv4Addr::new(10, 0, 0, 0),
    mask: 16,
};

/// Ports the load balancer forwards to the workers, with the rule name infix.
/// 8080/6443/9090/2222 serve the PaaS router, 30080/30443/30254 the nginx
/// ingress node ports. 6443 is declared twice.
pub const DEIS_WORKER_PORTS: [(u16, &str); 8] = [
    (8080, "Http"),
    (6443, "Https"),
    (6443, "Https"),
    (9090, "Healthcheck"),
    (2222, "Git"),
    (30080, "NginxHttp"),
    (30443, "NginxHttps"),
    (30254, "NginxHealth"),
];

/// Collects groups and their rules, then hands them out as finished values.
#[derive(Debug, Default)]
pub struct SecurityGroupPlan {
    groups: Vec<SecurityGroup>,
}

impl SecurityGroupPlan {
    pub fn new() -> SecurityGroupPlan {
        SecurityGroupPlan::default()
    }

    /// Declare a group with no rules.
    pub fn declare(&mut self, role: GroupRole, stack_name: &str, environment: &str) {
        let logical_id = role.logical_id().to_string();
        self.groups.push(SecurityGroup {
            role,
            description: format!("{stack_name}/{logical_id}"),
            logical_id,
            name_tag: role
                .name_tag_suffix()
                .map(|suffix| format!("{environment}-sg-{suffix}")),
            ingress: vec![],
            egress: vec![],
        });
    }

    /// Attach a rule to an already declared group.
    pub fn add_rule(
        &mut self,
        role: GroupRole,
        direction: Direction,
        peer: Peer,
        port: PortSpec,
        description: Option<&str>,
    ) -> Result<(), Box<dyn Error>> {
        let group = self
            .groups
            .iter_mut()
            .find(|g| g.role == role)
            .ok_or_else(|| format!("Security group {role} is not declared"))?;
        let rule = Rule {
            direction,
            peer,
            port,
            description: description.map(str::to_string),
        };
        match direction {
            Direction::Ingress => group.ingress.push(rule),
            Direction::Egress => group.egress.push(rule),
        }
        Ok(())
    }

    pub fn ingress(
        &mut self,
        role: GroupRole,
        peer: Peer,
        port: PortSpec,
        description: Option<&str>,
    ) -> Result<(), Box<dyn Error>> {
        self.add_rule(role, Direction::Ingress, peer, port, description)
    }

    pub fn egress(
        &mut self,
        role: GroupRole,
        peer: Peer,
        port: PortSpec,
        description: Option<&str>,
    ) -> Result<(), Box<dyn Error>> {
        self.add_rule(role, Direction::Egress, peer, port, description)
    }

    /// All TCP, all UDP and all ICMP out to anywhere.
    pub fn open_egress(&mut self, role: GroupRole) -> Result<(), Box<dyn Error>> {
        self.egress(role, Peer::AnyIpv4, PortSpec::all_tcp(), None)?;
        self.egress(role, Peer::AnyIpv4, PortSpec::all_udp(), None)?;
        self.egress(role, Peer::AnyIpv4, PortSpec::all_icmp(), None)
    }

    pub fn finish(self) -> Vec<SecurityGroup> {
        self.groups
    }
}

/// Build the fixed security group graph.
pub fn plan_security_groups(config: &StackConfig) -> Result<Vec<SecurityGroup>, Box<dyn Error>> {
    use GroupRole::*;

    let mut plan = SecurityGroupPlan::new();
    for role in GroupRole::ALL {
        plan.declare(role, &config.stack_name, &config.environment);
    }

    plan.open_egress(Bastion)?;

    // data stores: reachable from the bastion and the workers on their own port
    for (role, port, name) in [
        (Postgres, 5432, "Postgres"),
        (Redis, 6379, "Redis"),
        (Memcache, 11211, "Memcache"),
    ] {
        plan.open_egress(role)?;
        plan.ingress(
            role,
            Peer::Group(Bastion),
            PortSpec::tcp(port),
            Some(format!("SecurityGroup{name}BastionIngress").as_str()),
        )?;
    }
    for (role, port, name) in [
        (Postgres, 5432, "Postgres"),
        (Redis, 6379, "Redis"),
        (Memcache, 11211, "Memcache"),
    ] {
        plan.ingress(
            role,
            Peer::Group(KubeWorker),
            PortSpec::tcp(port),
            Some(format!("SecurityGroup{name}KubeWorkerIngress").as_str()),
        )?;
    }

    for port in [80, 443, 2222] {
        plan.egress(DeisElb, Peer::AnyIpv4, PortSpec::tcp(port), None)?;
    }
    plan.egress(
        DeisElb,
        Peer::AnyIpv4,
        PortSpec::icmp_type_and_code(3, 4),
        None,
    )?;
    for (port, name) in DEIS_WORKER_PORTS {
        plan.egress(
            DeisElb,
            Peer::Group(KubeWorker),
            PortSpec::tcp(port),
            Some(format!("SecurityGroupDeisElb{name}Egress").as_str()),
        )?;
    }
    for (port, name) in DEIS_WORKER_PORTS {
        plan.ingress(
            KubeWorker,
            Peer::Group(DeisElb),
            PortSpec::tcp(port),
            Some(format!("SecurityGroupDeisElb{name}Ingress").as_str()),
        )?;
    }

    plan.ingress(
        KubeCluster,
        Peer::Group(Bastion),
        PortSpec::all_tcp(),
        Some("SecurityGroupKubeClusterBastionIngress"),
    )?;

    plan.open_egress(ElasticSearch)?;
    plan.ingress(
        ElasticSearch,
        Peer::Cidr(SEARCH_INGRESS_CIDR),
        PortSpec::tcp(443),
        None,
    )?;

    let groups = plan.finish();
    log::info!(
        "Planned {} security groups with {} rules",
        groups.len(),
        groups.iter().map(|g| g.ingress.len() + g.egress.len()).sum::<usize>()
    );
    Ok(groups)
}
