//! # Redux Common Library
//!
//! Shared code for the Redux upload tools including:
//! - Event types (ReduxEvent enum) and the EventBus
//! - Configuration loading and resolution
//! - Server-Sent Events helpers
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
pub use events::{EventBus, ReduxEvent, ResultMetadata};
