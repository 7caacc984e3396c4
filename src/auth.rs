//! Credential domain models for the WeCom access layer.

pub mod credential;
pub mod secret;

pub use credential::*;
pub use secret::*;
