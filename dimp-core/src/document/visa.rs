// SPDX-License-Identifier: MIT OR Apache-2.0

use std::ops::{Deref, DerefMut};

use serde_json::Value;

use crate::crypto::x25519;
use crate::document::{Document, DocumentError, DocumentType};
use crate::identity::ID;
use crate::serde::{decode_base64, encode_base64};

const KEY: &str = "key";

const AVATAR: &str = "avatar";

/// Document of a user.
///
/// Carries the X25519 key others use to encrypt message keys for this user. It is a different key
/// than the Ed25519 key in the user's meta, which only signs.
#[derive(Clone, Debug)]
pub struct Visa(Document);

impl Visa {
    pub fn new(identifier: ID) -> Result<Self, DocumentError> {
        Self::try_from(Document::new(identifier, DocumentType::Visa))
    }

    /// Public key for encrypting message keys, `None` if absent or malformed.
    pub fn public_key(&self) -> Option<x25519::PublicKey> {
        let value = self.property(KEY)?.as_str()?;
        let bytes = decode_base64(value).ok()?;
        x25519::PublicKey::try_from(bytes.as_slice()).ok()
    }

    pub fn set_public_key(&mut self, public_key: &x25519::PublicKey) {
        self.set_property(KEY, Value::from(encode_base64(public_key.as_bytes())));
    }

    /// Reference to the avatar image, for example an URL.
    pub fn avatar(&self) -> Option<&str> {
        self.property(AVATAR)?.as_str()
    }

    pub fn set_avatar(&mut self, avatar: &str) {
        self.set_property(AVATAR, Value::from(avatar));
    }

    pub fn into_document(self) -> Document {
        self.0
    }
}

impl TryFrom<Document> for Visa {
    type Error = DocumentError;

    fn try_from(document: Document) -> Result<Self, Self::Error> {
        if document.doc_type() != &DocumentType::Visa || !document.identifier().is_user() {
            return Err(DocumentError::IdentifierMismatch(
                document.doc_type().clone(),
                document.identifier().clone(),
            ));
        }
        Ok(Self(document))
    }
}

impl Deref for Visa {
    type Target = Document;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Visa {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl AsRef<Document> for Visa {
    fn as_ref(&self) -> &Document {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use crate::crypto::x25519::SecretKey;
    use crate::crypto::{PrivateKey, Rng};
    use crate::document::DocumentStatus;
    use crate::identity::{EntityType, Meta, MetaType};

    use super::Visa;

    #[test]
    fn encryption_key_and_avatar() {
        let rng = Rng::from_seed([1; 32]);
        let private_key = PrivateKey::new();
        let meta = Meta::generate(MetaType::DEFAULT, &private_key, Some("alice")).unwrap();
        let id = meta.generate_id(EntityType::USER, None);

        let encryption_key = SecretKey::from_rng(&rng).unwrap().public_key();

        let mut visa = Visa::new(id).unwrap();
        assert!(visa.public_key().is_none());

        visa.set_public_key(&encryption_key);
        visa.set_avatar("https://example.org/alice.png");
        visa.sign(&private_key).unwrap();

        assert_eq!(visa.status(), DocumentStatus::Valid);
        assert_eq!(visa.public_key(), Some(encryption_key));
        assert_eq!(visa.avatar(), Some("https://example.org/alice.png"));
    }

    #[test]
    fn only_for_users() {
        let private_key = PrivateKey::new();
        let meta = Meta::generate(MetaType::DEFAULT, &private_key, Some("pandas")).unwrap();
        let group_id = meta.generate_id(EntityType::GROUP, None);
        assert!(Visa::new(group_id).is_err());
    }
}
