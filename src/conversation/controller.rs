// src/conversation/controller.rs
use super::prompts;
use super::state::{Category, Conversation, Event, Phase, Thumbnail, TransitionError};
use crate::relay::{Modality, RelayTransport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

pub const SCRIPT_SORRY: &str = "Sorry, I had trouble generating a script.";
pub const THUMBNAIL_SORRY: &str = "Sorry, I couldn't generate a thumbnail.";
pub const HASHTAGS_SORRY: &str = "Sorry, I had trouble generating hashtags.";

/// Generation operations that may each have one request in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Script,
    Thumbnail,
    Hashtags,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Script => write!(f, "script"),
            Self::Thumbnail => write!(f, "thumbnail"),
            Self::Hashtags => write!(f, "hashtags"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ControllerError {
    #[error("a {0} request is already in progress")]
    Busy(Operation),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

#[derive(Debug, Default)]
struct InFlight {
    script: AtomicBool,
    thumbnail: AtomicBool,
    hashtags: AtomicBool,
}

impl InFlight {
    fn flag(&self, operation: Operation) -> &AtomicBool {
        match operation {
            Operation::Script => &self.script,
            Operation::Thumbnail => &self.thumbnail,
            Operation::Hashtags => &self.hashtags,
        }
    }

    /// Check-and-set in one step, so two callers can never both get a token.
    fn acquire(&self, operation: Operation) -> Result<InFlightToken<'_>, ControllerError> {
        let flag = self.flag(operation);
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| InFlightToken { flag })
            .map_err(|_| ControllerError::Busy(operation))
    }
}

/// Released on drop, whichever way the operation ends.
struct InFlightToken<'a> {
    flag: &'a AtomicBool,
}

impl Drop for InFlightToken<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

enum ScriptRequest {
    Generate { topic: String },
    Refine { instruction: String },
}

/// What a request was built from. A result is only stored if the
/// conversation still matches it.
#[derive(Debug, Clone, Copy)]
struct Basis {
    epoch: u64,
    /// Set when the prompt embeds the script text.
    script_revision: Option<u64>,
}

impl Basis {
    fn of(conversation: &Conversation) -> Self {
        Self {
            epoch: conversation.epoch(),
            script_revision: None,
        }
    }

    fn with_script(conversation: &Conversation) -> Self {
        Self {
            script_revision: Some(conversation.script_revision()),
            ..Self::of(conversation)
        }
    }

    fn stale_reason(&self, conversation: &Conversation) -> Option<&'static str> {
        if self.epoch != conversation.epoch() {
            return Some("category changed");
        }
        match self.script_revision {
            Some(revision) if revision != conversation.script_revision() => Some("script changed"),
            _ => None,
        }
    }
}

/// Drives the category → topic → editing workflow against a relay.
///
/// Methods take `&self` and may be called concurrently; each operation kind
/// admits one outstanding request, and the conversation lock is never held
/// while waiting on the relay.
pub struct ConversationController {
    transport: Arc<dyn RelayTransport>,
    conversation: Mutex<Conversation>,
    in_flight: InFlight,
}

impl ConversationController {
    pub fn new(transport: Arc<dyn RelayTransport>) -> Self {
        Self {
            transport,
            conversation: Mutex::new(Conversation::new()),
            in_flight: InFlight::default(),
        }
    }

    pub async fn snapshot(&self) -> Conversation {
        self.conversation.lock().await.clone()
    }

    pub fn is_busy(&self, operation: Operation) -> bool {
        self.in_flight.flag(operation).load(Ordering::Acquire)
    }

    /// Starts over with `category`, discarding topic, script, thumbnail and
    /// hashtags. Refused while a script request is outstanding.
    pub async fn select_category(&self, category: Category) -> Result<(), ControllerError> {
        let _token = self.in_flight.acquire(Operation::Script)?;
        let mut conversation = self.conversation.lock().await;
        conversation.apply(Event::CategorySelected(category))?;
        tracing::info!(
            category = conversation.category().and_then(Category::label).unwrap_or("custom"),
            epoch = conversation.epoch(),
            "category selected"
        );
        Ok(())
    }

    pub async fn submit_message(&self, text: &str) -> Result<(), ControllerError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        let _token = self.in_flight.acquire(Operation::Script)?;

        let (request, prompt, basis) = {
            let mut conversation = self.conversation.lock().await;
            conversation.apply(Event::UserMessage(text.to_string()))?;

            match conversation.phase().clone() {
                Phase::SelectingCategory => {
                    conversation.apply(Event::CategoryRequired)?;
                    return Ok(());
                }
                Phase::AwaitingTopic { category } => match category.label() {
                    None => {
                        conversation.apply(Event::CustomCategoryNamed(text.to_string()))?;
                        return Ok(());
                    }
                    Some(label) => (
                        ScriptRequest::Generate {
                            topic: text.to_string(),
                        },
                        prompts::script_prompt(label, text),
                        Basis::of(&conversation),
                    ),
                },
                Phase::Editing { script, .. } => (
                    ScriptRequest::Refine {
                        instruction: text.to_string(),
                    },
                    prompts::refine_prompt(text, &script),
                    Basis::of(&conversation),
                ),
            }
        };

        tracing::info!(epoch = basis.epoch, "requesting script from relay");
        let event = match self.transport.relay(&prompt, Modality::Text).await {
            Ok(response) => match response.first_text() {
                Some(script) => match request {
                    ScriptRequest::Generate { topic } => Event::ScriptGenerated { topic, script },
                    ScriptRequest::Refine { instruction } => Event::ScriptRefined { instruction, script },
                },
                None => {
                    tracing::warn!("relay response carried no script text");
                    Event::OperationFailed(SCRIPT_SORRY.to_string())
                }
            },
            Err(e) => {
                tracing::error!(error = %e, "Error generating script");
                Event::OperationFailed(format!("An error occurred: {}", e))
            }
        };

        self.finish(Operation::Script, basis, event).await
    }

    /// Replaces the script with the user's own text. No relay call is made;
    /// hashtags for the old text are discarded.
    pub async fn edit_script(&self, text: &str) -> Result<(), ControllerError> {
        let _token = self.in_flight.acquire(Operation::Script)?;
        let mut conversation = self.conversation.lock().await;
        conversation.apply(Event::ScriptEdited(text.to_string()))?;
        tracing::info!(script_revision = conversation.script_revision(), "script edited by hand");
        Ok(())
    }

    /// No-op until a topic exists.
    pub async fn generate_thumbnail(&self) -> Result<(), ControllerError> {
        let _token = self.in_flight.acquire(Operation::Thumbnail)?;

        let (prompt, basis) = {
            let conversation = self.conversation.lock().await;
            match (conversation.category().and_then(Category::label), conversation.topic()) {
                (Some(category), Some(topic)) => (prompts::thumbnail_prompt(category, topic), Basis::of(&conversation)),
                _ => {
                    tracing::debug!("thumbnail requested before a topic was set");
                    return Ok(());
                }
            }
        };

        let event = match self.transport.relay(&prompt, Modality::Image).await {
            Ok(response) => match response.inline_image() {
                Some(image) => match Thumbnail::from_base64(image.mime_type, image.data) {
                    Ok(thumbnail) => Event::ThumbnailGenerated(thumbnail),
                    Err(e) => {
                        tracing::error!(error = %e, "thumbnail payload is not valid base64");
                        Event::OperationFailed(THUMBNAIL_SORRY.to_string())
                    }
                },
                None => {
                    tracing::error!("Failed to generate thumbnail: no inline image in response");
                    Event::OperationFailed(THUMBNAIL_SORRY.to_string())
                }
            },
            Err(e) => {
                tracing::error!(error = %e, "Error generating thumbnail");
                Event::OperationFailed(format!("An error occurred while generating the thumbnail: {}", e))
            }
        };

        self.finish(Operation::Thumbnail, basis, event).await
    }

    /// No-op until a script exists.
    pub async fn generate_hashtags(&self) -> Result<(), ControllerError> {
        let _token = self.in_flight.acquire(Operation::Hashtags)?;

        let (prompt, basis) = {
            let conversation = self.conversation.lock().await;
            match conversation.script() {
                Some(script) => (prompts::hashtags_prompt(script), Basis::with_script(&conversation)),
                None => {
                    tracing::debug!("hashtags requested before a script was generated");
                    return Ok(());
                }
            }
        };

        let event = match self.transport.relay(&prompt, Modality::Text).await {
            Ok(response) => match response.first_text() {
                Some(hashtags) => Event::HashtagsGenerated(hashtags),
                None => Event::OperationFailed(HASHTAGS_SORRY.to_string()),
            },
            Err(e) => {
                tracing::error!(error = %e, "Error generating hashtags");
                Event::OperationFailed(format!("An error occurred while generating hashtags: {}", e))
            }
        };

        self.finish(Operation::Hashtags, basis, event).await
    }

    async fn finish(&self, operation: Operation, basis: Basis, event: Event) -> Result<(), ControllerError> {
        let mut conversation = self.conversation.lock().await;
        if let Some(reason) = basis.stale_reason(&conversation) {
            tracing::info!(operation = %operation, reason, "conversation moved on while request was in flight, dropping result");
            return Ok(());
        }
        conversation.apply(event)?;
        Ok(())
    }
}
