use super::Context;
use anyhow::{Context as _, Result};
use colored::Colorize;

pub fn show(ctx: &Context) -> Result<()> {
    let config = ctx.config()?;
    let rendered = toml::to_string_pretty(&config).context("Failed to serialize configuration")?;

    println!(
        "{}",
        format!("# {}", ctx.paths().config_file().display()).bright_black()
    );
    print!("{}", rendered);
    Ok(())
}

pub fn init(ctx: &Context) -> Result<()> {
    let path = ctx.paths().config_file();
    let created = ctx
        .config_service()
        .init_file()
        .with_context(|| format!("Failed to write {}", path.display()))?;

    if created {
        println!("📝 Created {}", path.display());
    } else {
        println!("{} already exists, leaving it untouched", path.display());
    }
    Ok(())
}
