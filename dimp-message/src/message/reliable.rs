// SPDX-License-Identifier: MIT OR Apache-2.0

use std::ops::Deref;

use dimp_core::{Document, ID, Meta, Signature, Visa};
use serde::{Deserialize, Serialize};

use crate::message::secure::SecureRecord;
use crate::message::{MessageError, SecureMessage};

/// Encrypted and signed message, the form which goes over the wire.
///
/// The signature covers `data` only. Splitting or trimming a group message therefore keeps the
/// signature valid for every part.
///
/// A sender contacting somebody for the first time can attach its meta and visa, the receiver
/// needs them to verify the signature and to answer.
#[derive(Clone, Debug)]
pub struct ReliableMessage {
    pub(crate) secure: SecureMessage,
    pub(crate) signature: Signature,
    pub(crate) meta: Option<Meta>,
    pub(crate) visa: Option<Visa>,
}

impl ReliableMessage {
    pub fn secure(&self) -> &SecureMessage {
        &self.secure
    }

    pub fn into_secure(self) -> SecureMessage {
        self.secure
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn meta(&self) -> Option<&Meta> {
        self.meta.as_ref()
    }

    pub fn visa(&self) -> Option<&Visa> {
        self.visa.as_ref()
    }

    /// Attaches the sender's meta and visa for a first-contact handshake.
    pub fn with_handshake(mut self, meta: Option<Meta>, visa: Option<Visa>) -> Self {
        self.meta = meta;
        self.visa = visa;
        self
    }

    /// See [`SecureMessage::split`], every part keeps signature and handshake.
    pub fn split(&self, members: &[ID]) -> Vec<ReliableMessage> {
        self.secure
            .split(members)
            .into_iter()
            .map(|secure| ReliableMessage {
                secure,
                signature: self.signature,
                meta: self.meta.clone(),
                visa: self.visa.clone(),
            })
            .collect()
    }

    /// See [`SecureMessage::trim`].
    pub fn trim(&self, member: &ID) -> ReliableMessage {
        ReliableMessage {
            secure: self.secure.trim(member),
            signature: self.signature,
            meta: self.meta.clone(),
            visa: self.visa.clone(),
        }
    }

    pub fn from_json(value: &str) -> Result<Self, MessageError> {
        Ok(serde_json::from_str(value)?)
    }

    pub fn to_json(&self) -> Result<String, MessageError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Deref for ReliableMessage {
    type Target = SecureMessage;

    fn deref(&self) -> &Self::Target {
        &self.secure
    }
}

#[derive(Serialize, Deserialize)]
struct ReliableRecord {
    #[serde(flatten)]
    secure: SecureRecord,

    signature: Signature,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    meta: Option<Meta>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    visa: Option<Document>,
}

impl Serialize for ReliableMessage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let record = ReliableRecord {
            secure: SecureRecord::try_from(&self.secure).map_err(serde::ser::Error::custom)?,
            signature: self.signature,
            meta: self.meta.clone(),
            visa: self.visa.as_ref().map(|visa| Document::clone(visa)),
        };
        record.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ReliableMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let record = ReliableRecord::deserialize(deserializer)?;
        let secure = SecureMessage::try_from(record.secure).map_err(serde::de::Error::custom)?;
        let visa = record
            .visa
            .map(Visa::try_from)
            .transpose()
            .map_err(serde::de::Error::custom)?;
        Ok(ReliableMessage {
            secure,
            signature: record.signature,
            meta: record.meta,
            visa,
        })
    }
}
