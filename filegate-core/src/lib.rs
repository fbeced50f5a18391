//! Core types for filegate
//!
//! This crate provides the error taxonomy and request identifiers shared by
//! every handler.

pub mod error;
pub mod request_id;

pub use error::{ErrorKind, HandlerError};
pub use request_id::RequestId;
