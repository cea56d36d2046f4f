// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeMap;

use dimp_core::ID;
use dimp_core::serde::{decode_base64, encode_base64};
use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;
use crate::message::MessageError;

/// Encrypted message.
///
/// `data` holds the encrypted content, or the plain serialized content if the message is sent to
/// the broadcast identity. The symmetric key travels wrapped for the receiver in `key`, or for
/// every group member in `keys`. Both are absent for broadcasts and may be absent if the receiver
/// already holds the key from an earlier message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecureMessage {
    pub(crate) envelope: Envelope,
    pub(crate) data: Vec<u8>,
    pub(crate) key: Option<Vec<u8>>,
    pub(crate) keys: Option<BTreeMap<ID, Vec<u8>>>,
}

impl SecureMessage {
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn key(&self) -> Option<&[u8]> {
        self.key.as_deref()
    }

    pub fn keys(&self) -> Option<&BTreeMap<ID, Vec<u8>>> {
        self.keys.as_ref()
    }

    /// Members the symmetric key has been wrapped for.
    pub fn key_holders(&self) -> Vec<ID> {
        self.keys
            .as_ref()
            .map(|keys| keys.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Fans a group message out into one message per member.
    ///
    /// Members without a wrapped key get a message without `key`.
    pub fn split(&self, members: &[ID]) -> Vec<SecureMessage> {
        members.iter().map(|member| self.trim(member)).collect()
    }

    /// Narrows a group message down to the part a single member needs.
    ///
    /// The member becomes the receiver, its wrapped key moves into `key` and the group is kept in
    /// the envelope so the member still knows which conversation the message belongs to.
    pub fn trim(&self, member: &ID) -> SecureMessage {
        let mut envelope = self.envelope.clone();
        if envelope.group.is_none() && envelope.receiver.is_group() {
            envelope.group = Some(envelope.receiver.clone());
        }
        envelope.receiver = member.clone();

        let key = match &self.keys {
            Some(keys) => keys.get(member).cloned(),
            None => self.key.clone(),
        };

        SecureMessage {
            envelope,
            data: self.data.clone(),
            key,
            keys: None,
        }
    }

    pub fn from_json(value: &str) -> Result<Self, MessageError> {
        Ok(serde_json::from_str(value)?)
    }

    pub fn to_json(&self) -> Result<String, MessageError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Wire representation shared with [`ReliableMessage`](crate::ReliableMessage).
#[derive(Serialize, Deserialize)]
pub(crate) struct SecureRecord {
    #[serde(flatten)]
    envelope: Envelope,

    data: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    keys: Option<BTreeMap<ID, String>>,
}

impl TryFrom<&SecureMessage> for SecureRecord {
    type Error = String;

    fn try_from(message: &SecureMessage) -> Result<Self, Self::Error> {
        // Broadcasts carry the content as it is, everything else is binary.
        let data = if message.envelope.is_broadcast() {
            String::from_utf8(message.data.clone()).map_err(|err| err.to_string())?
        } else {
            encode_base64(&message.data)
        };
        Ok(SecureRecord {
            envelope: message.envelope.clone(),
            data,
            key: message.key.as_deref().map(encode_base64),
            keys: message.keys.as_ref().map(|keys| {
                keys.iter()
                    .map(|(member, key)| (member.clone(), encode_base64(key)))
                    .collect()
            }),
        })
    }
}

impl TryFrom<SecureRecord> for SecureMessage {
    type Error = String;

    fn try_from(record: SecureRecord) -> Result<Self, Self::Error> {
        let data = if record.envelope.is_broadcast() {
            record.data.into_bytes()
        } else {
            decode_base64(&record.data).map_err(|err| format!("invalid data: {err}"))?
        };
        let key = record
            .key
            .map(|key| decode_base64(&key))
            .transpose()
            .map_err(|err| format!("invalid key: {err}"))?;
        let keys = record
            .keys
            .map(|keys| {
                keys.into_iter()
                    .map(|(member, key)| decode_base64(&key).map(|key| (member, key)))
                    .collect::<Result<BTreeMap<_, _>, _>>()
            })
            .transpose()
            .map_err(|err| format!("invalid keys: {err}"))?;
        Ok(SecureMessage {
            envelope: record.envelope,
            data,
            key,
            keys,
        })
    }
}

impl Serialize for SecureMessage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        SecureRecord::try_from(self)
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecureMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let record = SecureRecord::deserialize(deserializer)?;
        SecureMessage::try_from(record).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use assert_matches::assert_matches;
    use dimp_core::ID;
    use dimp_core::test_utils::Account;
    use serde_json::json;

    use crate::envelope::Envelope;
    use crate::message::MessageError;

    use super::SecureMessage;

    fn group_message() -> (SecureMessage, Vec<Account>, Account) {
        let alice = Account::user("alice");
        let bob = Account::user("bob");
        let carol = Account::user("carol");
        let group = Account::group("pandas", &alice);

        let mut keys = BTreeMap::new();
        keys.insert(alice.id.clone(), vec![1, 1, 1]);
        keys.insert(carol.id.clone(), vec![3, 3, 3]);

        let message = SecureMessage {
            envelope: Envelope::with_time(alice.id.clone(), Some(group.id.clone()), 1700000000),
            data: vec![9, 8, 7, 6],
            key: None,
            keys: Some(keys),
        };
        (message, vec![alice, bob, carol], group)
    }

    #[test]
    fn split_into_members() {
        let (message, accounts, group) = group_message();
        let members: Vec<ID> = accounts.iter().map(|account| account.id.clone()).collect();

        let parts = message.split(&members);
        assert_eq!(parts.len(), 3);
        for (part, member) in parts.iter().zip(&members) {
            assert_eq!(&part.envelope.receiver, member);
            assert_eq!(part.envelope.group.as_ref(), Some(&group.id));
            assert_eq!(part.data, message.data);
            assert!(part.keys.is_none());
        }
        assert_eq!(parts[0].key(), Some(&[1, 1, 1][..]));
        assert_eq!(parts[1].key(), None);
        assert_eq!(parts[2].key(), Some(&[3, 3, 3][..]));

        let mut expected = vec![accounts[0].id.clone(), accounts[2].id.clone()];
        expected.sort();
        assert_eq!(message.key_holders(), expected);
    }

    #[test]
    fn trim_keeps_group() {
        let (message, accounts, group) = group_message();
        let carol = &accounts[2].id;

        let trimmed = message.trim(carol);
        assert_eq!(&trimmed.envelope.receiver, carol);
        assert_eq!(trimmed.envelope.group, Some(group.id.clone()));
        assert_eq!(trimmed.key(), Some(&[3, 3, 3][..]));

        // Trimming an already trimmed message is a no-op.
        assert_eq!(trimmed.trim(carol), trimmed);
    }

    #[test]
    fn data_encoding() {
        let (message, _, _) = group_message();
        let value: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
        assert_eq!(value["data"], json!("CQgHBg=="));
        assert!(value.get("key").is_none());
        assert_eq!(value["keys"].as_object().unwrap().len(), 2);
        assert_eq!(SecureMessage::from_json(&value.to_string()).unwrap(), message);

        // Broadcasts keep the content readable.
        let alice = Account::user("alice");
        let broadcast = SecureMessage {
            envelope: Envelope::with_time(alice.id.clone(), None, 1700000000),
            data: br#"{"type":1,"sn":1}"#.to_vec(),
            key: None,
            keys: None,
        };
        let value: serde_json::Value = serde_json::from_str(&broadcast.to_json().unwrap()).unwrap();
        assert_eq!(value["data"], json!(r#"{"type":1,"sn":1}"#));
        assert_eq!(SecureMessage::from_json(&value.to_string()).unwrap(), broadcast);
    }

    #[test]
    fn missing_data() {
        let alice = Account::user("alice");
        let json = json!({ "sender": alice.id.as_str(), "time": 1700000000 }).to_string();
        assert_matches!(SecureMessage::from_json(&json), Err(MessageError::Json(_)));

        let json = json!({
            "sender": alice.id.as_str(),
            "receiver": Account::user("bob").id.as_str(),
            "time": 1700000000,
            "data": "not base64!",
        })
        .to_string();
        assert_matches!(SecureMessage::from_json(&json), Err(MessageError::Json(_)));
    }
}
