// SPDX-License-Identifier: MIT OR Apache-2.0

//! The three forms a message takes on its way through the pipeline.
//!
//! ```text
//! InstantMessage --encrypt--> SecureMessage --sign--> ReliableMessage
//! ReliableMessage --verify--> SecureMessage --decrypt--> InstantMessage
//! ```
//!
//! All three serialize to the same flat JSON object: the [`Envelope`](crate::Envelope) fields
//! next to the form specific ones.
mod instant;
mod reliable;
mod secure;

use thiserror::Error;

use crate::content::ContentError;

pub use instant::InstantMessage;
pub use reliable::ReliableMessage;
pub use secure::SecureMessage;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed content: {0}")]
    Content(#[from] ContentError),
}
