use super::{BuildOptions, build_stack};
use colored::Colorize;

pub fn handle(options: &BuildOptions, json: bool) -> anyhow::Result<()> {
    let loaded = build_stack(options)?;
    // fail on dangling references before showing anything
    loaded.built.synth()?;
    let plan = loaded.built.plan();

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("Configuration: {}", loaded.describe_source());
    println!();
    println!("{} {} ({})", "Plan:".bold(), plan.stack.cyan(), plan.environment);
    for action in &plan.actions {
        println!(
            "  {} {} {}",
            "+".green(),
            action.resource_id.cyan(),
            action.resource_type.dimmed()
        );
        if !action.references.is_empty() {
            println!("      refs: {}", action.references.join(", ").dimmed());
        }
    }
    println!();
    println!("{}", plan.summary().to_string().bold());
    Ok(())
}
