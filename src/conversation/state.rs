// src/conversation/state.rs
//! The script-creation workflow as a single value object.
//!
//! All mutation goes through [`Conversation::apply`], so category, topic and
//! script can only change together in the combinations the workflow allows.

use base64::prelude::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

pub const WELCOME_MESSAGE: &str = "Welcome! Start by selecting a video category.";
pub const SCRIPT_FOLLOW_UP: &str =
    "Here's the updated script. You can now generate a thumbnail, get hashtags, or ask me to refine it further.";
pub const CUSTOM_NAME_QUESTION: &str = "Great! Please enter your custom category name first.";
pub const SELECT_CATEGORY_FIRST: &str = "Please select a video category first.";

/// Phase of the workflow, without the data each phase carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationState {
    SelectingCategory,
    AwaitingTopic,
    Editing,
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelectingCategory => write!(f, "selecting a category"),
            Self::AwaitingTopic => write!(f, "awaiting a topic"),
            Self::Editing => write!(f, "editing"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Tech,
    Gaming,
    Vlogging,
    Educational,
    Comedy,
    Diy,
    /// User-defined; `name` stays `None` until the user types it.
    Custom { name: Option<String> },
}

impl Category {
    pub const PRESETS: [Category; 6] = [
        Category::Tech,
        Category::Gaming,
        Category::Vlogging,
        Category::Educational,
        Category::Comedy,
        Category::Diy,
    ];

    /// Name used in prompts and messages. `None` for a custom category that
    /// hasn't been named yet.
    pub fn label(&self) -> Option<&str> {
        match self {
            Category::Tech => Some("Tech"),
            Category::Gaming => Some("Gaming"),
            Category::Vlogging => Some("Vlogging"),
            Category::Educational => Some("Educational"),
            Category::Comedy => Some("Comedy"),
            Category::Diy => Some("DIY"),
            Category::Custom { name } => name.as_deref(),
        }
    }
}

impl FromStr for Category {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TransitionError::EmptyInput("category"));
        }
        if s.eq_ignore_ascii_case("custom") {
            return Ok(Category::Custom { name: None });
        }
        Ok(Category::PRESETS
            .into_iter()
            .find(|c| c.label().is_some_and(|label| label.eq_ignore_ascii_case(s)))
            .unwrap_or_else(|| Category::Custom {
                name: Some(s.to_string()),
            }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Assistant,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A generated thumbnail: the base64 the provider sent plus its decoded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    mime_type: String,
    data: String,
    bytes: Vec<u8>,
}

impl Thumbnail {
    /// Decodes the payload up front so a broken image never replaces a
    /// good one.
    pub fn from_base64(mime_type: impl Into<String>, data: impl Into<String>) -> Result<Self, base64::DecodeError> {
        let data = data.into();
        let bytes = BASE64_STANDARD.decode(&data)?;
        Ok(Self {
            mime_type: mime_type.into(),
            data,
            bytes,
        })
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Phase plus the data that only exists in that phase.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    SelectingCategory,
    AwaitingTopic { category: Category },
    Editing {
        category: Category,
        topic: String,
        script: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    CategorySelected(Category),
    CustomCategoryNamed(String),
    UserMessage(String),
    /// A message arrived before any category was chosen.
    CategoryRequired,
    ScriptGenerated { topic: String, script: String },
    ScriptRefined { instruction: String, script: String },
    /// The user rewrote the script by hand.
    ScriptEdited(String),
    ThumbnailGenerated(Thumbnail),
    HashtagsGenerated(String),
    OperationFailed(String),
}

impl Event {
    fn name(&self) -> &'static str {
        match self {
            Event::CategorySelected(_) => "select a category",
            Event::CustomCategoryNamed(_) => "name a custom category",
            Event::UserMessage(_) => "record a user message",
            Event::CategoryRequired => "ask for a category",
            Event::ScriptGenerated { .. } => "store a generated script",
            Event::ScriptRefined { .. } => "store a refined script",
            Event::ScriptEdited(_) => "edit the script",
            Event::ThumbnailGenerated(_) => "store a thumbnail",
            Event::HashtagsGenerated(_) => "store hashtags",
            Event::OperationFailed(_) => "record a failure",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransitionError {
    #[error("cannot {event} while {state}")]
    InvalidTransition {
        state: ConversationState,
        event: &'static str,
    },
    #[error("{0} must not be empty")]
    EmptyInput(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    phase: Phase,
    hashtags: Option<String>,
    thumbnail: Option<Thumbnail>,
    messages: Vec<ChatMessage>,
    epoch: u64,
    script_revision: u64,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            phase: Phase::SelectingCategory,
            hashtags: None,
            thumbnail: None,
            messages: vec![ChatMessage::assistant(WELCOME_MESSAGE)],
            epoch: 0,
            script_revision: 0,
        }
    }

    pub fn state(&self) -> ConversationState {
        match self.phase {
            Phase::SelectingCategory => ConversationState::SelectingCategory,
            Phase::AwaitingTopic { .. } => ConversationState::AwaitingTopic,
            Phase::Editing { .. } => ConversationState::Editing,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn category(&self) -> Option<&Category> {
        match &self.phase {
            Phase::SelectingCategory => None,
            Phase::AwaitingTopic { category } | Phase::Editing { category, .. } => Some(category),
        }
    }

    pub fn topic(&self) -> Option<&str> {
        match &self.phase {
            Phase::Editing { topic, .. } => Some(topic.as_str()),
            _ => None,
        }
    }

    pub fn script(&self) -> Option<&str> {
        match &self.phase {
            Phase::Editing { script, .. } => Some(script.as_str()),
            _ => None,
        }
    }

    pub fn hashtags(&self) -> Option<&str> {
        self.hashtags.as_deref()
    }

    pub fn thumbnail(&self) -> Option<&Thumbnail> {
        self.thumbnail.as_ref()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Bumped on every category selection; results computed under an older
    /// epoch belong to a discarded conversation.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Bumped whenever the script text changes, however it changed.
    pub fn script_revision(&self) -> u64 {
        self.script_revision
    }

    /// True while a custom category is waiting for its name.
    pub fn awaiting_custom_name(&self) -> bool {
        matches!(&self.phase, Phase::AwaitingTopic { category: Category::Custom { name: None } })
    }

    fn invalid(&self, event: &Event) -> TransitionError {
        TransitionError::InvalidTransition {
            state: self.state(),
            event: event.name(),
        }
    }

    /// The one transition function. On error nothing has changed.
    pub fn apply(&mut self, event: Event) -> Result<(), TransitionError> {
        match event {
            Event::CategorySelected(category) => {
                if let Category::Custom { name: Some(name) } = &category {
                    if name.trim().is_empty() {
                        return Err(TransitionError::EmptyInput("custom category name"));
                    }
                }
                let (echo, follow_up) = match category.label() {
                    Some(label) => (
                        format!("I'll make a \"{}\" video.", label),
                        format!("Awesome! What is the specific topic for your {} video?", label),
                    ),
                    None => ("I'll make a custom video.".to_string(), CUSTOM_NAME_QUESTION.to_string()),
                };
                self.phase = Phase::AwaitingTopic { category };
                self.hashtags = None;
                self.thumbnail = None;
                self.epoch += 1;
                self.messages.push(ChatMessage::user(echo));
                self.messages.push(ChatMessage::assistant(follow_up));
                Ok(())
            }
            Event::CustomCategoryNamed(name) => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Err(TransitionError::EmptyInput("custom category name"));
                }
                if !self.awaiting_custom_name() {
                    return Err(self.invalid(&Event::CustomCategoryNamed(name)));
                }
                self.messages.push(ChatMessage::assistant(format!(
                    "Custom category set to \"{}\". Now, what's the video topic?",
                    name
                )));
                self.phase = Phase::AwaitingTopic {
                    category: Category::Custom { name: Some(name) },
                };
                Ok(())
            }
            Event::UserMessage(text) => {
                if text.trim().is_empty() {
                    return Err(TransitionError::EmptyInput("message"));
                }
                self.messages.push(ChatMessage::user(text));
                Ok(())
            }
            Event::CategoryRequired => {
                if self.state() != ConversationState::SelectingCategory {
                    return Err(self.invalid(&Event::CategoryRequired));
                }
                self.messages.push(ChatMessage::assistant(SELECT_CATEGORY_FIRST));
                Ok(())
            }
            Event::ScriptGenerated { topic, script } => {
                let category = match &self.phase {
                    Phase::AwaitingTopic { category } if category.label().is_some() => category.clone(),
                    _ => return Err(self.invalid(&Event::ScriptGenerated { topic, script })),
                };
                self.messages.push(ChatMessage::assistant(script.clone()));
                self.messages.push(ChatMessage::assistant(SCRIPT_FOLLOW_UP));
                self.phase = Phase::Editing { category, topic, script };
                self.hashtags = None;
                self.script_revision += 1;
                Ok(())
            }
            Event::ScriptRefined { instruction, script } => {
                if self.state() != ConversationState::Editing {
                    return Err(self.invalid(&Event::ScriptRefined { instruction, script }));
                }
                if let Phase::Editing { topic, script: current, .. } = &mut self.phase {
                    *topic = format!("{} ({})", topic, instruction);
                    *current = script.clone();
                }
                // hashtags were derived from the old script
                self.hashtags = None;
                self.script_revision += 1;
                self.messages.push(ChatMessage::assistant(script));
                self.messages.push(ChatMessage::assistant(SCRIPT_FOLLOW_UP));
                Ok(())
            }
            Event::ScriptEdited(text) => {
                if text.trim().is_empty() {
                    return Err(TransitionError::EmptyInput("script"));
                }
                if self.state() != ConversationState::Editing {
                    return Err(self.invalid(&Event::ScriptEdited(text)));
                }
                if let Phase::Editing { script, .. } = &mut self.phase {
                    *script = text;
                }
                self.hashtags = None;
                self.script_revision += 1;
                Ok(())
            }
            Event::ThumbnailGenerated(thumbnail) => {
                if self.topic().is_none() {
                    return Err(self.invalid(&Event::ThumbnailGenerated(thumbnail)));
                }
                self.thumbnail = Some(thumbnail);
                Ok(())
            }
            Event::HashtagsGenerated(hashtags) => {
                if self.script().is_none() {
                    return Err(self.invalid(&Event::HashtagsGenerated(hashtags)));
                }
                self.hashtags = Some(hashtags);
                Ok(())
            }
            Event::OperationFailed(reason) => {
                self.messages.push(ChatMessage::assistant(reason));
                Ok(())
            }
        }
    }
}
