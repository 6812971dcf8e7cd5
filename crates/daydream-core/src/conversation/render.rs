//! Presentation mapping for the render log.

use crate::message::{ImageRef, Message};

/// Borrowed view of one canonical entry handed to a [`Renderer`].
#[derive(Debug, Clone, Copy)]
pub struct MessageView<'a> {
    /// Position of the message in the canonical log.
    pub index: usize,
    pub message: &'a Message,
    /// Image the user attached when sending this message, if any.
    pub attachment: Option<&'a ImageRef>,
    /// True while the message is the in-flight assistant reply.
    pub streaming: bool,
}

/// Render-only unit with no counterpart in the canonical log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderAnnex {
    /// Generated image shown after the assistant's acknowledgement.
    Image(ImageRef),
    /// Visible error notice shown in place of a failed reply.
    Error(String),
}

/// Maps canonical entries to presentation units.
///
/// Implementations must be pure: the same view always renders to an
/// equivalent unit, because the reducer re-renders an entry whenever its
/// content changes and never re-renders anything else.
pub trait Renderer {
    type Unit;

    fn render_message(&self, view: MessageView<'_>) -> Self::Unit;

    fn render_annex(&self, annex: &RenderAnnex) -> Self::Unit;
}

/// Renderer producing one plain text line per unit. Used by tests and by
/// non-interactive output such as `history show`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextRenderer;

impl Renderer for PlainTextRenderer {
    type Unit = String;

    fn render_message(&self, view: MessageView<'_>) -> String {
        let mut line = format!("{}: {}", view.message.role, view.message.content);
        if let Some(image) = view.attachment {
            line.push_str(&format!(" [image: {}]", image));
        }
        if view.streaming {
            line.push_str(" ...");
        }
        line
    }

    fn render_annex(&self, annex: &RenderAnnex) -> String {
        match annex {
            RenderAnnex::Image(image) => format!("[image] {}", image),
            RenderAnnex::Error(reason) => format!("Error: {}", reason),
        }
    }
}
