//! Conversation state machine: message log plus the in-flight flag.
//!
//! DESIGN
//! ======
//! Two states, `Idle` and `AwaitingResponse`. [`Conversation::submit`] is the
//! only way into `AwaitingResponse` and hands back a [`PendingSubmission`]
//! ticket; [`Conversation::resolve`] consumes that ticket and is the only way
//! out. Because the ticket is not `Clone`, each dispatched request resolves
//! exactly once and the flag cannot be left set by a forgotten code path.
//!
//! `clear()` empties the log at any time but does not cancel or forget the
//! in-flight request: the state stays `AwaitingResponse` until its ticket
//! resolves. Each ticket carries the generation it was issued in; a reply for
//! an older generation is appended or dropped according to
//! [`StaleReplyPolicy`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::consultation::{ConsultError, ConsultationReply, ConsultationType};
use crate::error::ErrorCode;
use crate::imaging::{ImageError, ImageFile, validate_image};

/// User-message content for an image sent without text.
pub const IMAGE_ONLY_PLACEHOLDER: &str = "(sent an image)";

const ERROR_PREFIX: &str = "Sorry, something went wrong: ";

// =============================================================================
// MESSAGE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One entry in the conversation log. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// UUID v7: sorts in creation order.
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub timestamp: OffsetDateTime,
    /// Name of the image sent with a user message.
    pub image_ref: Option<String>,
}

impl Message {
    fn new(role: Role, content: String, timestamp: OffsetDateTime, image_ref: Option<String>) -> Self {
        Self { id: Uuid::now_v7(), role, content, timestamp, image_ref }
    }

    /// `HH:MM` at the given offset from UTC.
    #[must_use]
    pub fn clock(&self, offset: UtcOffset) -> String {
        let fmt = time::macros::format_description!("[hour]:[minute]");
        self.timestamp.to_offset(offset).format(&fmt).unwrap_or_default()
    }
}

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Idle,
    AwaitingResponse,
}

/// What to do with a reply whose request was issued before the last `clear()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StaleReplyPolicy {
    /// Append it to the (cleared) log anyway.
    #[default]
    Append,
    /// Drop it; only the in-flight flag is released.
    Discard,
}

impl FromStr for StaleReplyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "append" => Ok(Self::Append),
            "discard" => Ok(Self::Discard),
            other => Err(format!("unknown stale reply policy '{other}' (expected 'append' or 'discard')")),
        }
    }
}

/// Ticket for the one request in flight. Consumed by [`Conversation::resolve`].
#[derive(Debug)]
pub struct PendingSubmission {
    generation: u64,
    pub user_message_id: Uuid,
    /// Text sent as the consultation notes.
    pub notes: String,
    pub category: ConsultationType,
    pub image: Option<ImageFile>,
}

impl PendingSubmission {
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

// =============================================================================
// CONVERSATION
// =============================================================================

#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    awaiting: bool,
    category: ConsultationType,
    staged_image: Option<ImageFile>,
    generation: u64,
    stale_replies: StaleReplyPolicy,
}

impl Conversation {
    #[must_use]
    pub fn new(stale_replies: StaleReplyPolicy) -> Self {
        Self { stale_replies, ..Self::default() }
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn state(&self) -> ConversationState {
        if self.awaiting { ConversationState::AwaitingResponse } else { ConversationState::Idle }
    }

    #[must_use]
    pub fn is_awaiting(&self) -> bool {
        self.awaiting
    }

    #[must_use]
    pub fn category(&self) -> ConsultationType {
        self.category
    }

    pub fn set_category(&mut self, category: ConsultationType) {
        self.category = category;
    }

    #[must_use]
    pub fn staged_image(&self) -> Option<&ImageFile> {
        self.staged_image.as_ref()
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Validate and stage an image for the next submission. A rejected file
    /// leaves any previously staged image in place.
    ///
    /// # Errors
    ///
    /// Returns the validation error immediately; nothing is staged.
    pub fn stage_image(&mut self, file: ImageFile) -> Result<(), ImageError> {
        validate_image(&file).inspect_err(|e| warn!(name = %file.name, error = %e, "conversation: image rejected"))?;
        debug!(name = %file.name, size = file.size, "conversation: image staged");
        self.staged_image = Some(file);
        Ok(())
    }

    pub fn discard_image(&mut self) {
        self.staged_image = None;
    }

    /// Start a submission. Returns `None` (and changes nothing) when the text
    /// is blank with no staged image, or a request is already in flight.
    ///
    /// On success the user message is appended before any network work and
    /// the staged image moves into the returned ticket.
    pub fn submit(&mut self, text: &str) -> Option<PendingSubmission> {
        let text = text.trim();
        if self.awaiting {
            debug!("conversation: submit ignored, request in flight");
            return None;
        }
        if text.is_empty() && self.staged_image.is_none() {
            return None;
        }

        let image = self.staged_image.take();
        let content = if text.is_empty() { IMAGE_ONLY_PLACEHOLDER.to_owned() } else { text.to_owned() };
        let message = Message::new(
            Role::User,
            content.clone(),
            OffsetDateTime::now_utc(),
            image.as_ref().map(|img| img.name.clone()),
        );
        let user_message_id = message.id;
        self.messages.push(message);
        self.awaiting = true;

        info!(generation = self.generation, category = %self.category, has_image = image.is_some(), "conversation: submitted");
        Some(PendingSubmission {
            generation: self.generation,
            user_message_id,
            notes: content,
            category: self.category,
            image,
        })
    }

    /// Finish the in-flight request and return to `Idle`.
    ///
    /// Appends exactly one assistant message (the report, or a formatted error
    /// carrying the failure reason), unless the ticket predates a `clear()`
    /// and the policy is [`StaleReplyPolicy::Discard`]. The flag is cleared
    /// and any staged image discarded on every path.
    pub fn resolve(
        &mut self,
        pending: PendingSubmission,
        outcome: Result<ConsultationReply, ConsultError>,
    ) -> Option<&Message> {
        self.awaiting = false;
        self.staged_image = None;

        let stale = pending.generation != self.generation;
        if stale && self.stale_replies == StaleReplyPolicy::Discard {
            info!(
                ticket_generation = pending.generation,
                generation = self.generation,
                "conversation: stale reply discarded"
            );
            return None;
        }

        let message = match outcome {
            Ok(reply) => {
                let timestamp = parse_report_timestamp(reply.timestamp());
                Message::new(Role::Assistant, reply.text(), timestamp, None)
            }
            Err(err) => {
                warn!(error = %err, code = err.error_code(), retryable = err.retryable(), "conversation: request failed");
                Message::new(Role::Assistant, format_error(&err), OffsetDateTime::now_utc(), None)
            }
        };
        self.messages.push(message);
        self.messages.last()
    }

    /// Empty the log and drop any staged image. Safe to call in any state and
    /// idempotent; does not cancel an in-flight request.
    pub fn clear(&mut self) {
        if !self.messages.is_empty() || self.staged_image.is_some() {
            self.generation += 1;
        }
        self.messages.clear();
        self.staged_image = None;
        debug!(generation = self.generation, awaiting = self.awaiting, "conversation: cleared");
    }

    /// Append a local system notice, e.g. a rejected image selection.
    pub fn push_system(&mut self, content: impl Into<String>) -> &Message {
        self.messages
            .push(Message::new(Role::System, content.into(), OffsetDateTime::now_utc(), None));
        &self.messages[self.messages.len() - 1]
    }
}

/// User-facing text for a failed request.
#[must_use]
pub fn format_error(err: &impl fmt::Display) -> String {
    format!("{ERROR_PREFIX}{err}")
}

fn parse_report_timestamp(raw: &str) -> OffsetDateTime {
    OffsetDateTime::parse(raw, &Rfc3339).unwrap_or_else(|_| {
        debug!(%raw, "conversation: unparseable report timestamp, using local time");
        OffsetDateTime::now_utc()
    })
}

#[cfg(test)]
#[path = "conversation_test.rs"]
mod tests;
