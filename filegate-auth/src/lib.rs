//! AWS authentication for filegate
//!
//! Implements AWS Signature Version 4 query-string authentication, the scheme
//! behind presigned URLs.

pub mod sigv4;

pub use sigv4::{
    presign, presign_url, verify_presigned, Credentials, PresignRequest, PresignedQuery,
    SigV4Error,
};
