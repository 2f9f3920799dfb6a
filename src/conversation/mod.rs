// src/conversation/mod.rs
//! Client-side workflow: category → topic → script editing, plus the
//! thumbnail and hashtag side-generations.

pub mod controller;
pub mod prompts;
pub mod state;

pub use controller::{ConversationController, ControllerError, Operation};
pub use state::{Category, ChatMessage, Conversation, ConversationState, Event, Phase, Sender, Thumbnail, TransitionError};
