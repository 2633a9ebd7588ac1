//! Chat session: one conversation wired to one consultation backend.
//!
//! DESIGN
//! ======
//! [`ChatSession::send`] runs the whole round trip for a single owner:
//! submit to the conversation, encode the staged image, call the API, and
//! resolve the ticket. Every failure on that path, image errors included,
//! is folded into the same `resolve` call, so the in-flight flag is always
//! released.
//!
//! Front ends that need to touch the conversation while a request is in
//! flight (e.g. `/clear` during a slow reply) split the round trip instead:
//! take a [`Dispatcher`] snapshot, `submit`, `run` the ticket on another
//! task, and `resolve` when it returns.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{ClientConfig, CompressionSettings};
use crate::consultation::{
    CatProfile, ConsultError, ConsultationApi, ConsultationMode, ConsultationReply, ConsultationRequest,
    ConsultationType,
};
use crate::conversation::{Conversation, Message, PendingSubmission};
use crate::error::ErrorCode;
use crate::imaging::{self, ImageError, ImageFile};

// =============================================================================
// DISPATCHER
// =============================================================================

/// Everything needed to perform a submission, detached from the conversation.
#[derive(Clone)]
pub struct Dispatcher {
    api: Arc<dyn ConsultationApi>,
    mode: ConsultationMode,
    compression: Option<CompressionSettings>,
    cat: CatProfile,
}

impl Dispatcher {
    /// Encode the ticket's image (if any) and submit.
    ///
    /// # Errors
    ///
    /// [`ConsultError::Image`] if the image cannot be read or re-encoded;
    /// otherwise whatever the API returns.
    pub async fn run(&self, pending: &PendingSubmission) -> Result<ConsultationReply, ConsultError> {
        let image = match &pending.image {
            Some(file) => Some(imaging::prepare(file, self.compression).await?),
            None => None,
        };
        let request = ConsultationRequest::new(pending.category)
            .with_notes(pending.notes.clone())
            .with_image(image)
            .with_cat(self.cat.clone());
        self.api.submit(&request, self.mode).await
    }
}

// =============================================================================
// SESSION
// =============================================================================

pub struct ChatSession {
    dispatcher: Dispatcher,
    conversation: Conversation,
}

impl ChatSession {
    #[must_use]
    pub fn new(api: Arc<dyn ConsultationApi>, config: &ClientConfig) -> Self {
        Self {
            dispatcher: Dispatcher {
                api,
                mode: config.mode,
                compression: config.compression,
                cat: CatProfile::default(),
            },
            conversation: Conversation::new(config.stale_replies),
        }
    }

    #[must_use]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn conversation_mut(&mut self) -> &mut Conversation {
        &mut self.conversation
    }

    #[must_use]
    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    #[must_use]
    pub fn mode(&self) -> ConsultationMode {
        self.dispatcher.mode
    }

    pub fn set_mode(&mut self, mode: ConsultationMode) {
        self.dispatcher.mode = mode;
    }

    pub fn set_category(&mut self, category: ConsultationType) {
        self.conversation.set_category(category);
    }

    pub fn set_cat_profile(&mut self, cat: CatProfile) {
        self.dispatcher.cat = cat;
    }

    /// Describe the file at `path` and stage it for the next send.
    ///
    /// # Errors
    ///
    /// [`ImageError`] if the file is missing, of a disallowed type, or too
    /// large. A rejected file leaves the previous selection staged.
    pub async fn attach_image(&mut self, path: impl AsRef<Path>) -> Result<(), ImageError> {
        let path = path.as_ref();
        let staged = match ImageFile::from_path(path).await {
            Ok(file) => self.conversation.stage_image(file),
            Err(e) => Err(e),
        };
        staged.inspect_err(|e| {
            warn!(path = %path.display(), error = %e, code = e.error_code(), validation = e.is_validation(), "session: image not staged");
        })
    }

    pub fn clear(&mut self) {
        self.conversation.clear();
    }

    /// Submit `text` with any staged image and wait for the reply.
    ///
    /// Returns the appended assistant message, or `None` when the submit was
    /// a no-op (blank input, or a request already in flight).
    pub async fn send(&mut self, text: &str) -> Option<Message> {
        let pending = self.conversation.submit(text)?;
        let outcome = self.dispatcher.run(&pending).await;
        if let Ok(reply) = &outcome {
            info!(consultation_id = reply.consultation_id(), "session: reply received");
        }
        self.conversation.resolve(pending, outcome).cloned()
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
