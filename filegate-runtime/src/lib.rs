//! Lambda runtime for filegate
//!
//! Implements the client side of the Lambda Runtime API: poll for the next
//! event, run it through one handler, post the gateway response back.

pub mod invocation;
pub mod runtime;
pub mod runtime_api;

pub use invocation::Invocation;
pub use runtime::Runtime;
pub use runtime_api::{RuntimeApiClient, RuntimeError};
