// SPDX-License-Identifier: MIT OR Apache-2.0

use std::ops::{Deref, DerefMut};

use serde_json::Value;

use crate::document::{Document, DocumentError, DocumentType};
use crate::identity::ID;

const NAME: &str = "name";

const FOUNDER: &str = "founder";

const ASSISTANTS: &str = "assistants";

/// Document of a group, carries its display name and founder.
#[derive(Clone, Debug)]
pub struct Bulletin(Document);

impl Bulletin {
    pub fn new(identifier: ID) -> Result<Self, DocumentError> {
        Self::try_from(Document::new(identifier, DocumentType::Bulletin))
    }

    pub fn name(&self) -> Option<&str> {
        self.property(NAME)?.as_str()
    }

    pub fn set_name(&mut self, name: &str) {
        self.set_property(NAME, Value::from(name));
    }

    /// Founder as claimed by the document.
    ///
    /// This is a cached hint only, the authoritative answer comes from checking member metas
    /// against the group meta.
    pub fn founder(&self) -> Option<ID> {
        ID::parse(self.property(FOUNDER)?.as_str()?)
    }

    pub fn set_founder(&mut self, founder: &ID) {
        self.set_property(FOUNDER, Value::from(founder.as_str()));
    }

    /// Bots helping to manage the group. Malformed entries are skipped.
    pub fn assistants(&self) -> Vec<ID> {
        self.property(ASSISTANTS)
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(ID::parse)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_assistants(&mut self, assistants: &[ID]) {
        let values = assistants
            .iter()
            .map(|id| Value::from(id.as_str()))
            .collect::<Vec<_>>();
        self.set_property(ASSISTANTS, Value::Array(values));
    }

    pub fn into_document(self) -> Document {
        self.0
    }
}

impl TryFrom<Document> for Bulletin {
    type Error = DocumentError;

    fn try_from(document: Document) -> Result<Self, Self::Error> {
        if document.doc_type() != &DocumentType::Bulletin || !document.identifier().is_group() {
            return Err(DocumentError::IdentifierMismatch(
                document.doc_type().clone(),
                document.identifier().clone(),
            ));
        }
        Ok(Self(document))
    }
}

impl Deref for Bulletin {
    type Target = Document;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Bulletin {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl AsRef<Document> for Bulletin {
    fn as_ref(&self) -> &Document {
        &self.0
    }
}
