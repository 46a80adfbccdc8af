//! Shipyard action pipeline — ordered steps with rollback.
//!
//! A pipeline runs a list of [`Action`]s against a shared context. When a
//! step fails, every step that already succeeded is reverted in reverse
//! order and the failing step's error is returned unchanged.
//!
//! # Components
//!
//! - **`action`** — The `Action` trait
//! - **`pipeline`** — `Pipeline` sequencing and rollback

pub mod action;
pub mod pipeline;

pub use action::Action;
pub use pipeline::Pipeline;
