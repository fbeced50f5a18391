//! Request handlers for filegate
//!
//! Each handler turns one gateway event into one object-store call. They share
//! nothing but the store they are constructed with, and every one of them is
//! run through [`invoke`], which turns a handler error into the matching
//! status code.

pub mod delete;
pub mod download;
pub mod event;
pub mod handler;
pub mod list;
pub mod upload;

pub use delete::DeleteHandler;
pub use download::DownloadHandler;
pub use event::{GatewayRequest, GatewayResponse};
pub use handler::{invoke, Handler, HandlerKind, PRESIGN_TTL};
pub use list::ListHandler;
pub use upload::UploadHandler;
