//! Archive validation
//!
//! Only the zip container is supported. Validation reads the central
//! directory and local headers; it never writes to disk and never inflates
//! a deflated payload.

mod validator;

pub use validator::{ArchiveValidator, ValidationVerdict};
