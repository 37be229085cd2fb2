//! # dirlink-core
//!
//! Core types shared by the dirlink directory crates.
//!
//! This crate has no transport dependency. It provides the error taxonomy used across the
//! workspace and the codecs that turn raw directory attribute values into typed domain values.
//!
//! ## Modules
//!
//! - [`error`] - Error types for codecs, relations and transport failures
//! - [`codec`] - Binary/text attribute codecs (security identifiers, GUIDs, timestamps)

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod codec;
pub mod error;

// Re-export commonly used types
pub use codec::{AttributeCodec, Guid, Sid, TimestampFormat};
pub use error::{CodecError, Error, RelationError, Result};
