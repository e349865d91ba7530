//! Declares a VPC network topology and synthesizes it into a template for
//! the provisioning engine.

pub mod config;
pub mod models;
pub mod output;
pub mod processing;

use config::StackConfig;
use models::Topology;
use std::error::Error;

pub use processing::{all_route_table_ids, build_topology, check_topology};

/// Build the topology and run the consistency checks over it.
pub fn build_checked_topology(config: &StackConfig) -> Result<Topology, Box<dyn Error>> {
    let topology = build_topology(config)?;
    check_topology(&topology)?;
    Ok(topology)
}

/// Build, check and write the template to `config.template_path()`.
///
/// Nothing is written when the build or the checks fail.
pub fn synth_stack(config: &StackConfig) -> Result<Topology, Box<dyn Error>> {
    let topology = build_checked_topology(config)?;
    let template = output::synthesize(&topology);
    output::write_template(&template, &config.template_path())?;
    Ok(topology)
}
