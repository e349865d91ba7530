//! Security groups and the rules between them.
//!
//! Groups reference each other through [`GroupRole`], never by holding the
//! other group. A rule on group A naming group B as its peer is a directed
//! permission edge; [`crate::models::Topology::security_group`] resolves it.

use super::Ipv4;
use std::fmt;

/// Every security group the topology declares, by the role it protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupRole {
    Bastion,
    Postgres,
    Redis,
    Memcache,
    KubeWorker,
    DeisElb,
    KubeCluster,
    ElasticSearch,
}

impl GroupRole {
    /// Declaration order.
    pub const ALL: [GroupRole; 8] = [
        GroupRole::Bastion,
        GroupRole::Postgres,
        GroupRole::Redis,
        GroupRole::Memcache,
        GroupRole::KubeWorker,
        GroupRole::DeisElb,
        GroupRole::KubeCluster,
        GroupRole::ElasticSearch,
    ];

    pub fn logical_id(&self) -> &'static str {
        match self {
            GroupRole::Bastion => "SecurityGroupBastion",
            GroupRole::Postgres => "SecurityGroupPostgres",
            GroupRole::Redis => "SecurityGroupRedis",
            GroupRole::Memcache => "SecurityGroupMemcache",
            GroupRole::KubeWorker => "SecurityGroupKubeWorker",
            GroupRole::DeisElb => "SecurityGroupDeisElb",
            GroupRole::KubeCluster => "SecurityGroupKubeCluster",
            GroupRole::ElasticSearch => "SecurityGroupElasticSearch",
        }
    }

    /// Suffix of the `Name` tag, `{env}-sg-{suffix}`. The worker group is untagged.
    pub fn name_tag_suffix(&self) -> Option<&'static str> {
        match self {
            GroupRole::Bastion => Some("bastion"),
            GroupRole::Postgres => Some("postgress"),
            GroupRole::Redis => Some("redis"),
            GroupRole::Memcache => Some("memcache"),
            GroupRole::KubeWorker => None,
            GroupRole::DeisElb => Some("deisElb"),
            GroupRole::KubeCluster => Some("kube-cluster"),
            GroupRole::ElasticSearch => Some("elasticsearch"),
        }
    }

    /// Key under which the group id is exported, if it is exported at all.
    pub fn output_key(&self) -> Option<&'static str> {
        match self {
            GroupRole::Bastion => Some("SecurityGroupBastionOutput"),
            GroupRole::Postgres => Some("SecurityGroupPostgresOutput"),
            GroupRole::Redis => Some("SecurityGroupRedisOutput"),
            GroupRole::Memcache => Some("SecurityGroupMemcacheOutput"),
            _ => None,
        }
    }
}

impl fmt::Display for GroupRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GroupRole::Bastion => "bastion",
            GroupRole::Postgres => "postgres",
            GroupRole::Redis => "redis",
            GroupRole::Memcache => "memcache",
            GroupRole::KubeWorker => "kube-worker",
            GroupRole::DeisElb => "deis-elb",
            GroupRole::KubeCluster => "kube-cluster",
            GroupRole::ElasticSearch => "elasticsearch",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Ingress,
    Egress,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Ingress => write!(f, "ingress"),
            Direction::Egress => write!(f, "egress"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
}

impl Protocol {
    /// IP protocol name used in rule declarations.
    pub fn ip_protocol(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
        }
    }
}

/// Protocol plus port range. For ICMP `from` is the type and `to` the code,
/// -1 meaning any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortSpec {
    pub protocol: Protocol,
    pub from: i32,
    pub to: i32,
}

impl PortSpec {
    pub fn tcp(port: u16) -> PortSpec {
        PortSpec::tcp_range(port, port)
    }

    pub fn tcp_range(from: u16, to: u16) -> PortSpec {
        PortSpec {
            protocol: Protocol::Tcp,
            from: i32::from(from),
            to: i32::from(to),
        }
    }

    pub fn udp_range(from: u16, to: u16) -> PortSpec {
        PortSpec {
            protocol: Protocol::Udp,
            from: i32::from(from),
            to: i32::from(to),
        }
    }

    pub fn all_tcp() -> PortSpec {
        PortSpec::tcp_range(0, u16::MAX)
    }

    pub fn all_udp() -> PortSpec {
        PortSpec::udp_range(0, u16::MAX)
    }

    pub fn all_icmp() -> PortSpec {
        PortSpec {
            protocol: Protocol::Icmp,
            from: -1,
            to: -1,
        }
    }

    pub fn icmp_type_and_code(icmp_type: u8, code: u8) -> PortSpec {
        PortSpec {
            protocol: Protocol::Icmp,
            from: i32::from(icmp_type),
            to: i32::from(code),
        }
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.protocol {
            Protocol::Icmp if self.from == -1 => write!(f, "icmp all"),
            Protocol::Icmp if self.to == -1 => write!(f, "icmp type {}", self.from),
            Protocol::Icmp => write!(f, "icmp type {} code {}", self.from, self.to),
            _ if self.from == self.to => write!(f, "{} {}", self.protocol.ip_protocol(), self.from),
            _ => write!(
                f,
                "{} {}-{}",
                self.protocol.ip_protocol(),
                self.from,
                self.to
            ),
        }
    }
}

/// The other end of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Peer {
    /// 0.0.0.0/0.
    AnyIpv4,
    Cidr(Ipv4),
    Group(GroupRole),
}

impl Peer {
    /// Address block of a CIDR peer; `None` for group peers.
    pub fn cidr(&self) -> Option<Ipv4> {
        match self {
            Peer::AnyIpv4 => Some(Ipv4::any()),
            Peer::Cidr(cidr) => Some(*cidr),
            Peer::Group(_) => None,
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Peer::AnyIpv4 => write!(f, "{}", Ipv4::any()),
            Peer::Cidr(cidr) => write!(f, "{cidr}"),
            Peer::Group(role) => write!(f, "sg:{role}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rule {
    pub direction: Direction,
    pub peer: Peer,
    pub port: PortSpec,
    pub description: Option<String>,
}

impl Rule {
    /// Human readable description, falling back to `from`/`to` peer and port.
    pub fn describe(&self) -> String {
        match &self.description {
            Some(description) => description.clone(),
            None => match self.direction {
                Direction::Ingress => format!("from {}:{}", self.peer, self.port),
                Direction::Egress => format!("to {}:{}", self.peer, self.port),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroup {
    pub role: GroupRole,
    pub logical_id: String,
    pub description: String,
    /// Value of the `Name` tag.
    pub name_tag: Option<String>,
    pub ingress: Vec<Rule>,
    pub egress: Vec<Rule>,
}

impl SecurityGroup {
    /// Ingress then egress, in declaration order.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.ingress.iter().chain(self.egress.iter())
    }
}
