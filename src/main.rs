use std::error::Error;
use vpc_topology::config::StackConfig;
use vpc_topology::output::{outputs_print, print_summary, rule_print, subnet_print};
use vpc_topology::synth_stack;

fn main() -> Result<(), Box<dyn Error>> {
    // Do as little as possible in main.rs as it can't contain any tests
    log4rs::init_file("log4rs.yml", Default::default())
        .map_err(|e| format!("Error initializing log4rs: {e}"))?;
    dotenv::dotenv().ok();
    log::info!("#Start main()");

    let config = StackConfig::load().map_err(|e| {
        log::error!("Error loading config: {e}");
        e
    })?;
    let topology = synth_stack(&config).map_err(|e| {
        log::error!("Error synthesizing {}: {e}", config.stack_name);
        e
    })?;

    subnet_print(&topology)?;
    rule_print(&topology);
    outputs_print(&topology);
    print_summary(&topology);

    log::info!("#End main() template={}", config.template_path());
    Ok(())
}
