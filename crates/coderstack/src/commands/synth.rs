use super::{BuildOptions, build_stack};
use coderstack_cloud::{CloudAssembly, TemplateFormat};
use colored::Colorize;
use std::path::Path;

pub async fn handle(options: &BuildOptions, out: &Path, format: TemplateFormat) -> anyhow::Result<()> {
    let loaded = build_stack(options)?;
    let built = &loaded.built;
    let template = built.synth()?;

    let assembly = CloudAssembly::new(out);
    let path = assembly
        .write_stack(built.stack.name(), built.stack.env(), &template, format)
        .await?;

    println!("Configuration: {}", loaded.describe_source());
    println!(
        "{} {} ({} resources, {})",
        "✓ Synthesized".green().bold(),
        built.stack.name().cyan(),
        template.resources.len(),
        built.stack.env().uri()
    );
    println!("  {}", path.display());
    println!("  {}", assembly.out_dir().join("manifest.json").display());
    Ok(())
}
