//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into the contract consumed by the UI glue.
//! - Keep presentation layers decoupled from storage details.

pub mod tracker_service;
