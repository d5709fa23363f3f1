//! # DashChat Core
//!
//! Shared types, traits, and the tool-calling orchestrator for DashChat.
//! The hub crate plugs a concrete model provider, tools and datastores into
//! the seams defined here.

pub mod config;
pub mod conversation;
pub mod error;
pub mod message;
pub mod orchestrator;
pub mod provider;
pub mod schema;
pub mod tool;
