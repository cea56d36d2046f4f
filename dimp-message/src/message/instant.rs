// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

use crate::content::Content;
use crate::envelope::Envelope;
use crate::message::MessageError;

/// Plaintext message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstantMessage {
    #[serde(flatten)]
    pub envelope: Envelope,

    pub content: Content,
}

impl InstantMessage {
    pub fn new(envelope: Envelope, content: Content) -> Self {
        Self { envelope, content }
    }

    pub fn from_json(value: &str) -> Result<Self, MessageError> {
        Ok(serde_json::from_str(value)?)
    }

    pub fn to_json(&self) -> Result<String, MessageError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use dimp_core::test_utils::Account;
    use serde_json::json;

    use crate::content::{Content, content_type};
    use crate::envelope::Envelope;

    use super::InstantMessage;

    #[test]
    fn flat_wire_format() {
        let alice = Account::user("alice");
        let bob = Account::user("bob");

        let mut content = Content::with_sn(content_type::TEXT, 12);
        content.set("text", json!("Hi Bob"));
        let message = InstantMessage::new(
            Envelope::with_time(alice.id.clone(), Some(bob.id.clone()), 1700000000),
            content,
        );

        let value: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
        assert_eq!(value["sender"], json!(alice.id.as_str()));
        assert_eq!(value["receiver"], json!(bob.id.as_str()));
        assert_eq!(value["content"]["text"], json!("Hi Bob"));

        let message_again = InstantMessage::from_json(&value.to_string()).unwrap();
        assert_eq!(message, message_again);
    }
}
