// SPDX-License-Identifier: MIT OR Apache-2.0

use dimp_core::{ID, Timestamp, now};
use serde::{Deserialize, Serialize};

/// Routing information shared by all message forms.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub sender: ID,

    /// Defaults to the broadcast identity `anyone@anywhere`.
    #[serde(default = "ID::anyone")]
    pub receiver: ID,

    /// UNIX timestamp in seconds.
    pub time: Timestamp,

    /// Group the message belongs to, set when the receiver is a single member.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<ID>,

    /// Content type, copied from the content as a routing hint.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub msg_type: Option<u8>,
}

impl Envelope {
    /// Creates an envelope stamped with the current time.
    pub fn new(sender: ID, receiver: Option<ID>) -> Self {
        Self::with_time(sender, receiver, now())
    }

    pub fn with_time(sender: ID, receiver: Option<ID>, time: Timestamp) -> Self {
        Self {
            sender,
            receiver: receiver.unwrap_or_else(ID::anyone),
            time,
            group: None,
            msg_type: None,
        }
    }

    /// The identity a message is addressed to: its group if it has one, otherwise the receiver.
    pub fn effective_recipient(&self) -> &ID {
        self.group.as_ref().unwrap_or(&self.receiver)
    }

    pub fn is_broadcast(&self) -> bool {
        self.effective_recipient().is_broadcast()
    }
}

#[cfg(test)]
mod tests {
    use dimp_core::ID;
    use dimp_core::test_utils::Account;
    use serde_json::json;

    use super::Envelope;

    #[test]
    fn receiver_defaults_to_anyone() {
        let alice = Account::user("alice");
        let envelope = Envelope::new(alice.id.clone(), None);
        assert_eq!(envelope.receiver, ID::anyone());
        assert!(envelope.is_broadcast());

        let envelope: Envelope = serde_json::from_value(json!({
            "sender": alice.id.as_str(),
            "time": 1700000000,
        }))
        .unwrap();
        assert_eq!(envelope.receiver, ID::anyone());
        assert_eq!(envelope.time, 1700000000);
    }

    #[test]
    fn group_is_the_effective_recipient() {
        let alice = Account::user("alice");
        let bob = Account::user("bob");
        let group = Account::group("pandas", &alice);

        let mut envelope = Envelope::new(alice.id.clone(), Some(bob.id.clone()));
        assert_eq!(envelope.effective_recipient(), &bob.id);

        envelope.group = Some(group.id.clone());
        assert_eq!(envelope.effective_recipient(), &group.id);
        assert!(!envelope.is_broadcast());

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["group"], json!(group.id.as_str()));
        assert!(json.get("type").is_none());
    }
}
