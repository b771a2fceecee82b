use super::{BuildOptions, build_stack};
use coderstack_core::{AccessLevel, SubnetType, access_level};
use colored::Colorize;

pub fn handle(options: &BuildOptions) -> anyhow::Result<()> {
    println!("{}", "Validating stack...".blue());

    let loaded = build_stack(options)?;
    let built = &loaded.built;
    let document = built.provisioner.document();
    document.check_ownership(&loaded.config.provisioner.ownership_tag)?;
    let template = built.synth()?;

    println!("{}", "✓ Stack is valid".green().bold());
    println!();
    println!("Summary:");
    println!("  Configuration: {}", loaded.describe_source());
    println!(
        "  Stack: {} ({})",
        built.stack.name().cyan(),
        built.stack.env().uri()
    );
    println!("  Resources: {}", template.resources.len());

    let network = &built.network;
    println!(
        "  Network: {} (dual-stack: {})",
        network.cidr().to_string().cyan(),
        network.dual_stack()
    );
    for subnet_type in [SubnetType::Public, SubnetType::PrivateWithEgress] {
        let cidrs: Vec<String> = network
            .subnets(subnet_type)
            .iter()
            .map(|s| s.cidr.to_string())
            .collect();
        println!("    - {}: {}", subnet_type, cidrs.join(", "));
    }

    let mutating = document
        .statements()
        .iter()
        .flat_map(|s| s.actions.iter())
        .filter(|a| access_level(a) == AccessLevel::Mutating)
        .count();
    println!(
        "  Provisioner policy: {} statements, {} mutating actions, all tag-conditioned",
        document.statements().len(),
        mutating
    );

    println!("  Environment:");
    for name in built.environment.keys() {
        println!("    - {}", name.cyan());
    }

    println!("  CDN behaviors:");
    for behavior in built.cdn.behaviors() {
        if let Some(pattern) = &behavior.path_pattern {
            println!("    - {} (cached, compressed)", pattern);
        }
    }
    println!("    - * (default, not cached)");
    Ok(())
}
