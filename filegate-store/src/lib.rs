//! Object store clients for filegate
//!
//! Every handler talks to the bucket through [`ObjectStore`]. Two backends are
//! provided: [`S3Store`] for a real S3-compatible service and
//! [`EphemeralStore`], an in-memory bucket that mints and honours its own
//! presigned URLs for local runs and tests.

mod ephemeral;
mod s3;
mod traits;


pub use ephemeral::{EphemeralStore, StoredObject};
pub use s3::S3Store;
pub use traits::{ListPage, ObjectStore, ObjectSummary, PresignedUrl, StoreError};
