//! The complete declared topology.

use super::{GatewayEndpoint, GroupRole, SecurityGroup, Token, Vpc};

/// Named value exported to the provisioning engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub key: String,
    pub value: Token,
}

/// Immutable result of one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub stack_name: String,
    pub environment: String,
    pub vpc: Vpc,
    pub endpoints: Vec<GatewayEndpoint>,
    /// Groups in declaration order; look them up by role.
    pub security_groups: Vec<SecurityGroup>,
    pub outputs: Vec<Output>,
}

impl Topology {
    pub fn security_group(&self, role: GroupRole) -> Option<&SecurityGroup> {
        self.security_groups.iter().find(|sg| sg.role == role)
    }

    pub fn output(&self, key: &str) -> Option<&Token> {
        self.outputs.iter().find(|o| o.key == key).map(|o| &o.value)
    }

    pub fn output_keys(&self) -> Vec<&str> {
        self.outputs.iter().map(|o| o.key.as_str()).collect()
    }
}
