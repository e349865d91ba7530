//! Output of a built topology.
//!
//! This module handles everything that leaves the process:
//! - [`template`] - The template handed to the provisioning engine
//! - [`csv`] - CSV report of subnets, rules and exports
//! - [`terminal`] - Terminal formatting helpers

mod csv;
mod terminal;
pub mod template;

pub use csv::{outputs_print, rule_print, rule_rows, subnet_print, subnet_rows};
pub use csv::{RulePrintRow, SubnetPrintRow};
pub use template::{synthesize, write_template};
pub use terminal::{format_field, print_summary, summary_line};
