use super::Context;
use crate::render::TerminalRenderer;
use anyhow::{Context as _, Result};
use colored::Colorize;
use daydream_core::Conversation;

pub async fn show(ctx: &Context) -> Result<()> {
    let identity = ctx.identity();
    let store = ctx.factory(ctx.config()?)?.history_store();

    let messages = store
        .load(&identity.user_id)
        .await
        .with_context(|| format!("Failed to load history for {}", identity.user_id))?;

    if messages.is_empty() {
        println!(
            "{}",
            format!("No history for {} ({} store)", identity.user_id, store.name()).bright_black()
        );
        return Ok(());
    }

    let mut conversation = Conversation::new(TerminalRenderer);
    conversation.replace_all(messages);
    for unit in conversation.display_units() {
        println!("{}", unit);
    }
    Ok(())
}

pub async fn clear(ctx: &Context) -> Result<()> {
    let identity = ctx.identity();
    let store = ctx.factory(ctx.config()?)?.history_store();

    store
        .save(&identity.user_id, &[])
        .await
        .with_context(|| format!("Failed to clear history for {}", identity.user_id))?;

    println!("🧹 Cleared history for {}", identity.user_id);
    Ok(())
}
