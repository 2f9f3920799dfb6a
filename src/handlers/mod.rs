// src/handlers/mod.rs
pub mod relay;
pub mod status;
