//! Coloured terminal presentation of the conversation.

use colored::Colorize;
use daydream_core::{MessageView, RenderAnnex, Renderer, Role};

#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalRenderer;

impl TerminalRenderer {
    /// Label printed before an assistant reply.
    pub fn assistant_label() -> String {
        "assistant:".bright_blue().bold().to_string()
    }
}

impl Renderer for TerminalRenderer {
    type Unit = String;

    fn render_message(&self, view: MessageView<'_>) -> String {
        let content = view.message.content.as_str();
        let mut line = match view.message.role {
            Role::User => format!("{} {}", "you:".green().bold(), content.green()),
            Role::Assistant => format!("{} {}", Self::assistant_label(), content.bright_blue()),
            Role::System => content.bright_black().italic().to_string(),
        };
        if let Some(image) = view.attachment {
            line.push_str(&format!(" [image: {}]", image).bright_black().to_string());
        }
        if view.streaming {
            line.push_str(&" ...".bright_black().to_string());
        }
        line
    }

    fn render_annex(&self, annex: &RenderAnnex) -> String {
        match annex {
            RenderAnnex::Image(image) => format!("{} {}", "[image]".bright_magenta().bold(), image),
            RenderAnnex::Error(reason) => format!("Error: {}", reason).red().to_string(),
        }
    }
}
