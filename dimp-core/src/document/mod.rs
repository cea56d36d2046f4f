// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signed documents bound to an identity.
//!
//! A [`Document`] is a bag of JSON properties signed by the Meta key of its owner. The two
//! well-known kinds are the user's [`Visa`] and the group's [`Bulletin`], everything else stays a
//! plain document. On the wire a document looks like this:
//!
//! ```json
//! {
//!     "did": "alice@...",
//!     "type": "visa",
//!     "data": "{\"key\":\"...\",\"time\":1700000000}",
//!     "signature": "..."
//! }
//! ```
use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

mod base;
mod bulletin;
mod visa;

pub use base::{Document, DocumentError, DocumentStatus, DocumentType};
pub use bulletin::Bulletin;
pub use visa::Visa;

/// Any document received from the network, classified by its type.
#[derive(Clone, Debug)]
pub enum AnyDocument {
    Visa(Visa),
    Bulletin(Bulletin),
    Other(Document),
}

impl AnyDocument {
    pub fn document(&self) -> &Document {
        match self {
            AnyDocument::Visa(visa) => visa.as_ref(),
            AnyDocument::Bulletin(bulletin) => bulletin.as_ref(),
            AnyDocument::Other(document) => document,
        }
    }

    pub fn document_mut(&mut self) -> &mut Document {
        match self {
            AnyDocument::Visa(visa) => &mut **visa,
            AnyDocument::Bulletin(bulletin) => &mut **bulletin,
            AnyDocument::Other(document) => document,
        }
    }

    pub fn into_document(self) -> Document {
        match self {
            AnyDocument::Visa(visa) => visa.into_document(),
            AnyDocument::Bulletin(bulletin) => bulletin.into_document(),
            AnyDocument::Other(document) => document,
        }
    }

    pub fn doc_type(&self) -> &DocumentType {
        self.document().doc_type()
    }

    pub fn time(&self) -> Option<Timestamp> {
        self.document().time()
    }
}

impl AsRef<Document> for AnyDocument {
    fn as_ref(&self) -> &Document {
        self.document()
    }
}

impl TryFrom<Document> for AnyDocument {
    type Error = DocumentError;

    fn try_from(document: Document) -> Result<Self, Self::Error> {
        match document.doc_type() {
            DocumentType::Visa => Ok(AnyDocument::Visa(Visa::try_from(document)?)),
            DocumentType::Bulletin => Ok(AnyDocument::Bulletin(Bulletin::try_from(document)?)),
            _ => Ok(AnyDocument::Other(document)),
        }
    }
}

impl From<Visa> for AnyDocument {
    fn from(visa: Visa) -> Self {
        AnyDocument::Visa(visa)
    }
}

impl From<Bulletin> for AnyDocument {
    fn from(bulletin: Bulletin) -> Self {
        AnyDocument::Bulletin(bulletin)
    }
}

impl Serialize for AnyDocument {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.document().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AnyDocument {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let document = Document::deserialize(deserializer)?;
        AnyDocument::try_from(document).map_err(serde::de::Error::custom)
    }
}

/// Parses a document from its wire representation.
///
/// Documents without a type (or with the `*` wildcard) become a visa for user IDs and a bulletin
/// for group IDs.
pub fn parse_document(value: serde_json::Value) -> Result<AnyDocument, DocumentError> {
    let document: Document = serde_json::from_value(value)?;
    AnyDocument::try_from(document)
}

/// Picks the freshest document of the given type.
///
/// Documents with an empty or wildcard type match any query. When two documents carry the same
/// time the one seen first wins.
pub fn last_document<'a>(
    documents: &'a [AnyDocument],
    doc_type: &DocumentType,
) -> Option<&'a AnyDocument> {
    freshest(
        documents
            .iter()
            .filter(|document| doc_type.matches(document.doc_type())),
    )
}

/// Picks the freshest visa.
pub fn last_visa(documents: &[AnyDocument]) -> Option<&Visa> {
    freshest(documents.iter().filter_map(|document| match document {
        AnyDocument::Visa(visa) => Some(visa),
        _ => None,
    }))
}

/// Picks the freshest bulletin.
pub fn last_bulletin(documents: &[AnyDocument]) -> Option<&Bulletin> {
    freshest(documents.iter().filter_map(|document| match document {
        AnyDocument::Bulletin(bulletin) => Some(bulletin),
        _ => None,
    }))
}

fn freshest<'a, T, I>(documents: I) -> Option<&'a T>
where
    T: AsRef<Document> + 'a,
    I: Iterator<Item = &'a T>,
{
    let mut last: Option<&'a T> = None;
    for document in documents {
        match last {
            Some(current) if current.as_ref().time() >= document.as_ref().time() => (),
            _ => last = Some(document),
        }
    }
    last
}
