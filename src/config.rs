//! Stack configuration.
//!
//! Values are layered: built-in defaults, then an optional JSON file named by
//! `STACK_CONFIG`, then individual environment variables (a `.env` file is
//! loaded by the binary before this runs).

use crate::models::Ipv4;
use regex::Regex;
use serde::Deserialize;
use std::error::Error;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::OnceLock;

/// Most availability zones a VPC is spread across.
pub const MAX_AZS: usize = 3;

/// Prefix length of every planned subnet.
pub const SUBNET_CIDR_MASK: u8 = 24;

pub const DEFAULT_STACK_NAME: &str = "VpcStack";
pub const DEFAULT_ENVIRONMENT: &str = "dev";
pub const DEFAULT_OUT_DIR: &str = "cdk.out";

pub const ENV_CONFIG_FILE: &str = "STACK_CONFIG";
pub const ENV_STACK_NAME: &str = "STACK_NAME";
pub const ENV_ENVIRONMENT: &str = "STACK_ENVIRONMENT";
pub const ENV_ACCOUNT: &str = "CDK_DEFAULT_ACCOUNT";
pub const ENV_REGION: &str = "CDK_DEFAULT_REGION";
pub const ENV_VPC_CIDR: &str = "VPC_CIDR";
pub const ENV_MAX_AZS: &str = "MAX_AZS";
pub const ENV_OUT_DIR: &str = "OUT_DIR";

static NAME_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_name_regex() -> &'static Regex {
    NAME_REGEX.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9-]*$").expect("Invalid Regex"))
}

/// Everything the topology builder needs to know about the deployment target.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct StackConfig {
    pub stack_name: String,
    /// Deployment environment, used as a prefix for resource names.
    pub environment: String,
    /// Target account; `None` deploys to whatever account the engine uses.
    pub account: Option<String>,
    /// Target region; `None` resolves the region at deploy time.
    pub region: Option<String>,
    pub vpc_cidr: Ipv4,
    pub max_azs: usize,
    pub out_dir: String,
}

impl Default for StackConfig {
    fn default() -> Self {
        StackConfig {
            stack_name: DEFAULT_STACK_NAME.to_string(),
            environment: DEFAULT_ENVIRONMENT.to_string(),
            account: None,
            region: None,
            vpc_cidr: Ipv4 {
                addr: Ipv4Addr::new(10, 0, 0, 0),
                mask: 16,
            },
            max_azs: MAX_AZS,
            out_dir: DEFAULT_OUT_DIR.to_string(),
        }
    }
}

impl StackConfig {
    /// Config for an environment with every other value defaulted.
    pub fn for_environment(environment: &str) -> StackConfig {
        StackConfig {
            environment: environment.to_string(),
            ..Default::default()
        }
    }

    /// Load from `STACK_CONFIG` (if set) and the process environment.
    pub fn load() -> Result<StackConfig, Box<dyn Error>> {
        let mut config = match std::env::var(ENV_CONFIG_FILE) {
            Ok(path) => StackConfig::from_file(&path)?,
            Err(_) => StackConfig::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        log::info!(
            "Loaded config stack={} environment={} target={} cidr={} max_azs={}",
            config.stack_name,
            config.environment,
            config.target(),
            config.vpc_cidr,
            config.max_azs
        );
        Ok(config)
    }

    /// Read a JSON config file. Missing keys keep their defaults.
    pub fn from_file(path: &str) -> Result<StackConfig, Box<dyn Error>> {
        if !Path::new(path).exists() {
            return Err(format!("Config file does not exist: {path}").into());
        }
        log::info!("Reading config file: {path}");
        let json = std::fs::read_to_string(path)
            .map_err(|e| format!("Error reading config file {path}: {e}"))?;
        StackConfig::from_json(&json).map_err(|e| format!("{path}: {e}").into())
    }

    pub fn from_json(json: &str) -> Result<StackConfig, Box<dyn Error>> {
        let mut deserializer = serde_json::Deserializer::from_str(json);
        let config: StackConfig = serde_path_to_error::deserialize(&mut deserializer)
            .map_err(|e| format!("Error parsing config: path={} error={}", e.path(), e))?;
        Ok(config)
    }

    /// Override fields from environment variables, looked up through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), Box<dyn Error>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_STACK_NAME) {
            self.stack_name = v;
        }
        if let Some(v) = get(ENV_ENVIRONMENT) {
            self.environment = v;
        }
        if let Some(v) = get(ENV_ACCOUNT) {
            self.account = Some(v);
        }
        if let Some(v) = get(ENV_REGION) {
            self.region = Some(v);
        }
        if let Some(v) = get(ENV_VPC_CIDR) {
            self.vpc_cidr = Ipv4::new(&v).map_err(|e| format!("{ENV_VPC_CIDR}={v}: {e}"))?;
        }
        if let Some(v) = get(ENV_MAX_AZS) {
            self.max_azs = v
                .trim()
                .parse()
                .map_err(|e| format!("{ENV_MAX_AZS}={v}: {e}"))?;
        }
        if let Some(v) = get(ENV_OUT_DIR) {
            self.out_dir = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), Box<dyn Error>> {
        if !get_name_regex().is_match(&self.stack_name) {
            return Err(format!("Invalid stack name '{}'", self.stack_name).into());
        }
        if !get_name_regex().is_match(&self.environment) {
            return Err(format!(
                "Invalid environment '{}', expected letters, digits and '-'",
                self.environment
            )
            .into());
        }
        if self.max_azs == 0 {
            return Err("max_azs must be at least 1".into());
        }
        Ok(())
    }

    /// Deployment target in `aws://account/region` form.
    pub fn target(&self) -> String {
        format!(
            "aws://{}/{}",
            self.account.as_deref().unwrap_or("unknown-account"),
            self.region.as_deref().unwrap_or("unknown-region")
        )
    }

    /// Zones the VPC actually spans.
    pub fn az_count(&self) -> usize {
        if self.max_azs > MAX_AZS {
            log::warn!("max_azs={} capped at {MAX_AZS}", self.max_azs);
        }
        self.max_azs.min(MAX_AZS)
    }

    /// Template file written by the binary.
    pub fn template_path(&self) -> String {
        format!("{}/{}.template.json", self.out_dir, self.stack_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = StackConfig::default();
        assert_eq!(config.stack_name, "VpcStack");
        assert_eq!(config.vpc_cidr, Ipv4::new("10.0.0.0/16").unwrap());
        assert_eq!(config.az_count(), 3);
        assert_eq!(config.target(), "aws://unknown-account/unknown-region");
        assert_eq!(config.template_path(), "cdk.out/VpcStack.template.json");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_apply_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_ENVIRONMENT, "staging"),
            (ENV_REGION, "us-east-1"),
            (ENV_ACCOUNT, "123456789012"),
            (ENV_MAX_AZS, "2"),
            (ENV_VPC_CIDR, "10.20.0.0/16"),
            (ENV_OUT_DIR, ""),
        ]
        .into_iter()
        .collect();

        let mut config = StackConfig::default();
        config
            .apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.environment, "staging");
        assert_eq!(config.region.as_deref(), Some("us-east-1"));
        assert_eq!(config.max_azs, 2);
        assert_eq!(config.vpc_cidr, Ipv4::new("10.20.0.0/16").unwrap());
        assert_eq!(config.out_dir, "cdk.out", "blank values are ignored");
        assert_eq!(config.target(), "aws://123456789012/us-east-1");
    }

    #[test]
    fn test_apply_env_bad_values() {
        let mut config = StackConfig::default();
        let err = config
            .apply_env(|key| (key == ENV_MAX_AZS).then(|| "three".to_string()))
            .unwrap_err();
        assert!(err.to_string().starts_with("MAX_AZS=three"));

        let err = config
            .apply_env(|key| (key == ENV_VPC_CIDR).then(|| "10.0.0.0".to_string()))
            .unwrap_err();
        assert!(err.to_string().starts_with("VPC_CIDR=10.0.0.0"));
    }

    #[test]
    fn test_from_json_partial() {
        let config =
            StackConfig::from_json(r#"{"environment": "prod", "region": "eu-west-1"}"#).unwrap();
        assert_eq!(config.environment, "prod");
        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.stack_name, "VpcStack");
    }

    #[test]
    fn test_from_json_reports_path() {
        let err = StackConfig::from_json(r#"{"vpc_cidr": "10.0.0.0/40"}"#).unwrap_err();
        assert!(err.to_string().contains("path=vpc_cidr"), "{err}");

        let err = StackConfig::from_json(r#"{"enviroment": "prod"}"#).unwrap_err();
        assert!(err.to_string().contains("enviroment"), "{err}");
    }

    #[test]
    fn test_validate() {
        assert!(StackConfig::for_environment("staging").validate().is_ok());
        assert!(StackConfig::for_environment("stag ing").validate().is_err());
        assert!(StackConfig::for_environment("-staging").validate().is_err());
        let config = StackConfig {
            max_azs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_az_count_is_capped() {
        let config = StackConfig {
            max_azs: 6,
            ..Default::default()
        };
        assert_eq!(config.az_count(), MAX_AZS);
    }

    #[test]
    fn test_from_file_missing() {
        let err = StackConfig::from_file("does/not/exist.json").unwrap_err();
        assert_eq!(err.to_string(), "Config file does not exist: does/not/exist.json");
    }
}
