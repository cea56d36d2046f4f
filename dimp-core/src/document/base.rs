// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::crypto::{PrivateKey, PublicKey, Signature};
use crate::identity::ID;
use crate::time::{Timestamp, now};

const TIME: &str = "time";

/// Kind of a document, the `type` field on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DocumentType {
    Visa,
    Bulletin,
    /// Wildcard `*`, an empty type is treated the same way.
    Any,
    Other(String),
}

impl DocumentType {
    /// Default kind for documents which do not declare one.
    pub fn default_for(identifier: &ID) -> Self {
        if identifier.is_group() {
            DocumentType::Bulletin
        } else {
            DocumentType::Visa
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DocumentType::Visa => "visa",
            DocumentType::Bulletin => "bulletin",
            DocumentType::Any => "*",
            DocumentType::Other(value) => value,
        }
    }

    /// Returns `true` if a document of the other kind satisfies a query for this kind.
    pub fn matches(&self, other: &DocumentType) -> bool {
        matches!(self, DocumentType::Any) || matches!(other, DocumentType::Any) || self == other
    }
}

impl From<&str> for DocumentType {
    fn from(value: &str) -> Self {
        match value {
            "visa" => DocumentType::Visa,
            "bulletin" => DocumentType::Bulletin,
            "" | "*" => DocumentType::Any,
            other => DocumentType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Verification state of a document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DocumentStatus {
    /// Not checked yet or modified since the last signature. Empty documents stay here.
    #[default]
    Unverified,
    Valid,
    Invalid,
}

/// Signed property bag bound to an identity.
///
/// The signature covers the exact JSON serialization of the properties at signing time, which is
/// kept around as `data`. Changing any property drops both and the document needs to be signed
/// again.
#[derive(Clone, Debug)]
pub struct Document {
    identifier: ID,
    doc_type: DocumentType,
    properties: Map<String, Value>,
    data: Option<String>,
    signature: Option<Signature>,
    status: DocumentStatus,
    /// Key the signature was last checked against or made with. Set whenever `status` is `Valid`.
    verified_by: Option<PublicKey>,
}

impl Document {
    /// Creates an empty, unsigned document.
    pub fn new(identifier: ID, doc_type: DocumentType) -> Self {
        Self {
            identifier,
            doc_type,
            properties: Map::new(),
            data: None,
            signature: None,
            status: DocumentStatus::Unverified,
            verified_by: None,
        }
    }

    /// Assembles a document from its serialized properties and their signature.
    ///
    /// The signature is not checked, see [`Document::verify`].
    pub fn from_parts(
        identifier: ID,
        doc_type: DocumentType,
        data: String,
        signature: Signature,
    ) -> Result<Self, DocumentError> {
        let properties = match serde_json::from_str(&data)? {
            Value::Object(properties) => properties,
            _ => return Err(DocumentError::DataNotAnObject),
        };
        Ok(Self {
            identifier,
            doc_type,
            properties,
            data: Some(data),
            signature: Some(signature),
            status: DocumentStatus::Unverified,
            verified_by: None,
        })
    }

    pub fn identifier(&self) -> &ID {
        &self.identifier
    }

    pub fn doc_type(&self) -> &DocumentType {
        &self.doc_type
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Updates a property, `Value::Null` removes it.
    ///
    /// Any change invalidates the cached data and signature.
    pub fn set_property(&mut self, key: &str, value: Value) {
        match value {
            Value::Null => {
                self.properties.remove(key);
            }
            value => {
                self.properties.insert(key.to_string(), value);
            }
        }
        self.data = None;
        self.signature = None;
        self.status = DocumentStatus::Unverified;
        self.verified_by = None;
    }

    /// Time of the last signature.
    pub fn time(&self) -> Option<Timestamp> {
        self.property(TIME).and_then(Value::as_u64)
    }

    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn status(&self) -> DocumentStatus {
        self.status
    }

    pub fn is_valid(&self) -> bool {
        self.status == DocumentStatus::Valid
    }

    /// Checks the signature against the given key.
    ///
    /// A valid result is memoized for that key only. Mismatches mark the document as invalid but
    /// are checked again on the next call, the caller might try several candidate keys. A document
    /// without data and signature stays unverified.
    pub fn verify(&mut self, public_key: &PublicKey) -> bool {
        if self.status == DocumentStatus::Valid && self.verified_by.as_ref() == Some(public_key) {
            return true;
        }
        self.status = match (&self.data, &self.signature) {
            (None, None) => DocumentStatus::Unverified,
            (Some(data), Some(signature)) if public_key.verify(data.as_bytes(), signature) => {
                DocumentStatus::Valid
            }
            _ => DocumentStatus::Invalid,
        };
        self.verified_by = match self.status {
            DocumentStatus::Valid => Some(*public_key),
            _ => None,
        };
        self.status == DocumentStatus::Valid
    }

    /// Signs the properties, returns the cached signature when nothing changed since the last
    /// call with the same key.
    pub fn sign(&mut self, private_key: &PrivateKey) -> Result<Signature, DocumentError> {
        let public_key = private_key.public_key();
        let signed_by_key = self.is_valid() && self.verified_by == Some(public_key);
        if let Some(signature) = self.signature.filter(|_| signed_by_key) {
            return Ok(signature);
        }

        self.properties.insert(TIME.to_string(), Value::from(now()));
        let data = serde_json::to_string(&self.properties)?;
        let signature = private_key.sign(data.as_bytes());

        self.data = Some(data);
        self.signature = Some(signature);
        self.status = DocumentStatus::Valid;
        self.verified_by = Some(public_key);
        Ok(signature)
    }
}

impl AsRef<Document> for Document {
    fn as_ref(&self) -> &Document {
        self
    }
}

#[derive(Serialize, Deserialize)]
pub(crate) struct DocumentRecord {
    pub did: ID,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    pub data: String,
    pub signature: Signature,
}

impl TryFrom<DocumentRecord> for Document {
    type Error = DocumentError;

    fn try_from(record: DocumentRecord) -> Result<Self, Self::Error> {
        let doc_type = match record.doc_type.as_deref().map(DocumentType::from) {
            None | Some(DocumentType::Any) => DocumentType::default_for(&record.did),
            Some(doc_type) => doc_type,
        };
        Document::from_parts(record.did, doc_type, record.data, record.signature)
    }
}

impl Serialize for Document {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let (Some(data), Some(signature)) = (&self.data, &self.signature) else {
            return Err(serde::ser::Error::custom(DocumentError::NotSigned));
        };
        DocumentRecord {
            did: self.identifier.clone(),
            doc_type: Some(self.doc_type.to_string()),
            data: data.clone(),
            signature: *signature,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let record = DocumentRecord::deserialize(deserializer)?;
        Document::try_from(record).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document data is not valid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document data is not a json object")]
    DataNotAnObject,

    #[error("document needs to be signed before it can be serialized")]
    NotSigned,

    #[error("document of type '{0}' can not belong to {1}")]
    IdentifierMismatch(DocumentType, ID),
}
