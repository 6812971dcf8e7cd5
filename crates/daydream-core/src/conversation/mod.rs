//! Conversation reducer keeping the canonical log and the render log in step.
//!
//! The canonical log is the list of [`Message`]s that gets persisted and sent
//! back to the backend. The render log holds one presentation unit per
//! canonical entry. Both are mutated only through [`Conversation`], which is
//! what keeps `render.len() == canonical.len()` enforceable in one place.
//!
//! Render-only units (a generated image, a visible error notice) are kept
//! apart from the message arrays. The most recent one is the *trailing* unit;
//! it is sealed into the annex table as soon as another message is appended.

mod render;

pub use render::{MessageView, PlainTextRenderer, RenderAnnex, Renderer};

use crate::message::{ImageRef, Message};
use std::collections::BTreeMap;

/// How a turn ended, as far as the reducer is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEnd {
    /// The in-flight reply was kept (possibly empty).
    Kept { index: usize },
    /// The in-flight reply was empty and has been dropped.
    Dropped,
    /// There was no in-flight turn.
    Idle,
}

/// Dual-log conversation state machine.
pub struct Conversation<R: Renderer> {
    renderer: R,
    messages: Vec<Message>,
    rendered: Vec<R::Unit>,
    /// Images attached to user messages, keyed by message index.
    attachments: BTreeMap<usize, ImageRef>,
    /// Sealed render-only units, each tagged with the number of messages
    /// that precede it. Tags are non-decreasing.
    annexes: Vec<(usize, R::Unit)>,
    trailing: Option<(usize, R::Unit)>,
    in_flight: Option<usize>,
    revision: u64,
}

impl<R: Renderer> Conversation<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            messages: Vec::new(),
            rendered: Vec::new(),
            attachments: BTreeMap::new(),
            annexes: Vec::new(),
            trailing: None,
            in_flight: None,
            revision: 0,
        }
    }

    // ============================================================================
    // Turn operations
    // ============================================================================

    /// Appends a user message to both logs. Returns its index.
    pub fn append_user(&mut self, content: impl Into<String>, image: Option<ImageRef>) -> usize {
        let index = self.messages.len();
        if let Some(image) = image {
            self.attachments.insert(index, image);
        }
        self.push_message(Message::user(content))
    }

    /// Appends an empty assistant message and marks it in-flight.
    ///
    /// Returns `false` without changing anything if a turn is already
    /// in-flight: only one outbound turn exists at a time.
    pub fn begin_assistant_turn(&mut self) -> bool {
        if let Some(index) = self.in_flight {
            tracing::warn!(
                "[Conversation] begin_assistant_turn ignored: message {} is still in flight",
                index
            );
            return false;
        }

        let index = self.push_message(Message::assistant(String::new()));
        self.in_flight = Some(index);
        self.rerender(index);
        true
    }

    /// Appends `text` to the in-flight reply and re-renders that entry only.
    ///
    /// Returns `false` when there is no in-flight turn (the delta is dropped).
    pub fn apply_delta(&mut self, text: &str) -> bool {
        let Some(index) = self.in_flight else {
            tracing::warn!(
                "[Conversation] Dropping delta of {} bytes: no turn in flight",
                text.len()
            );
            return false;
        };
        if text.is_empty() {
            return true;
        }

        self.messages[index].content.push_str(text);
        self.rerender(index);
        self.revision += 1;
        true
    }

    /// Clears the in-flight marker. Idempotent.
    pub fn complete_turn(&mut self) -> TurnEnd {
        match self.in_flight.take() {
            Some(index) => {
                self.rerender(index);
                self.revision += 1;
                TurnEnd::Kept { index }
            }
            None => TurnEnd::Idle,
        }
    }

    /// Ends the in-flight turn after a transport failure.
    ///
    /// Partial content is kept. An in-flight reply that never received any
    /// content is removed so that the error notice takes its place. The
    /// notice becomes the trailing render-only unit.
    pub fn fail_turn(&mut self, reason: impl Into<String>) -> TurnEnd {
        let end = self.settle_in_flight();
        self.set_trailing(RenderAnnex::Error(reason.into()));
        end
    }

    /// Ends the in-flight turn after the caller aborted it. Partial content
    /// is kept; no error unit is produced.
    pub fn cancel_turn(&mut self) -> TurnEnd {
        self.settle_in_flight()
    }

    /// Completes an image request: appends the assistant acknowledgement and
    /// makes the image the trailing render-only unit.
    pub fn attach_image(&mut self, acknowledgement: impl Into<String>, image: ImageRef) -> usize {
        if self.in_flight.is_some() {
            self.settle_in_flight();
        }
        let index = self.push_message(Message::assistant(acknowledgement));
        self.set_trailing(RenderAnnex::Image(image));
        index
    }

    /// Replaces both logs wholesale (history restore). Clears the in-flight
    /// marker and every render-only unit.
    pub fn replace_all(&mut self, messages: Vec<Message>) {
        self.reset();
        self.rendered = messages
            .iter()
            .enumerate()
            .map(|(index, message)| {
                self.renderer.render_message(MessageView {
                    index,
                    message,
                    attachment: None,
                    streaming: false,
                })
            })
            .collect();
        self.messages = messages;
        self.revision += 1;
    }

    /// Empties the conversation.
    pub fn clear(&mut self) {
        self.reset();
        self.revision += 1;
    }

    // ============================================================================
    // Accessors
    // ============================================================================

    /// The canonical log.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Render units aligned one-to-one with [`Self::messages`].
    pub fn rendered(&self) -> &[R::Unit] {
        &self.rendered
    }

    /// The current trailing render-only unit, if any.
    pub fn trailing_unit(&self) -> Option<&R::Unit> {
        self.trailing.as_ref().map(|(_, unit)| unit)
    }

    /// Every presentation unit in display order: messages interleaved with
    /// sealed annexes, then the trailing unit.
    pub fn display_units(&self) -> Vec<&R::Unit> {
        let mut units = Vec::with_capacity(self.rendered.len() + self.annexes.len() + 1);
        let mut annexes = self.annexes.iter().peekable();

        for (index, unit) in self.rendered.iter().enumerate() {
            while let Some((_, annex)) = annexes.next_if(|(position, _)| *position <= index) {
                units.push(annex);
            }
            units.push(unit);
        }
        units.extend(annexes.map(|(_, annex)| annex));
        if let Some((_, unit)) = &self.trailing {
            units.push(unit);
        }
        units
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Index of the in-flight assistant message.
    pub fn in_flight(&self) -> Option<usize> {
        self.in_flight
    }

    pub fn is_streaming(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Monotonic counter bumped by every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Message-array parity; holds at every quiescent point.
    pub fn is_consistent(&self) -> bool {
        self.rendered.len() == self.messages.len()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    // ============================================================================
    // Internals
    // ============================================================================

    fn push_message(&mut self, message: Message) -> usize {
        self.seal_trailing();

        let index = self.messages.len();
        self.messages.push(message);
        let unit = self.render_at(index);
        self.rendered.push(unit);
        self.revision += 1;

        debug_assert!(self.is_consistent());
        index
    }

    fn rerender(&mut self, index: usize) {
        self.rendered[index] = self.render_at(index);
    }

    fn render_at(&self, index: usize) -> R::Unit {
        self.renderer.render_message(MessageView {
            index,
            message: &self.messages[index],
            attachment: self.attachments.get(&index),
            streaming: self.in_flight == Some(index),
        })
    }

    /// Clears the in-flight marker, dropping the reply if it is still empty.
    fn settle_in_flight(&mut self) -> TurnEnd {
        let Some(index) = self.in_flight.take() else {
            return TurnEnd::Idle;
        };
        self.revision += 1;

        // The in-flight entry is always the last message.
        if self.messages[index].content.is_empty() && index + 1 == self.messages.len() {
            self.messages.pop();
            self.rendered.pop();
            return TurnEnd::Dropped;
        }

        self.rerender(index);
        TurnEnd::Kept { index }
    }

    fn set_trailing(&mut self, annex: RenderAnnex) {
        self.seal_trailing();
        let unit = self.renderer.render_annex(&annex);
        self.trailing = Some((self.messages.len(), unit));
        self.revision += 1;
    }

    fn seal_trailing(&mut self) {
        if let Some(entry) = self.trailing.take() {
            self.annexes.push(entry);
        }
    }

    fn reset(&mut self) {
        self.messages.clear();
        self.rendered.clear();
        self.attachments.clear();
        self.annexes.clear();
        self.trailing = None;
        self.in_flight = None;
    }
}
