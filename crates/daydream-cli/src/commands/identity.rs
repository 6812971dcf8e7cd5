use super::Context;
use anyhow::{Context as _, Result};
use colored::Colorize;

pub fn login(ctx: &Context, user_id: &str) -> Result<()> {
    let id = ctx
        .identities()
        .login(user_id)
        .context("Failed to save the user id")?;
    println!("✅ Logged in as {}", id.bold());
    Ok(())
}

pub fn logout(ctx: &Context) -> Result<()> {
    if ctx.identities().logout().context("Failed to remove the saved user id")? {
        println!("👋 Logged out");
    } else {
        println!("{}", "Nobody was logged in".bright_black());
    }
    Ok(())
}

pub fn whoami(ctx: &Context) {
    let identity = ctx.identity();
    println!("{} ({})", identity.user_id.bold(), identity.source);
    if identity.is_fallback() {
        println!(
            "{}",
            "This is the shared fallback identity. Run `daydream login <id>` to keep your own history."
                .yellow()
        );
    }
}
