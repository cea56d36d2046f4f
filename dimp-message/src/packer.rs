// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns plaintext messages into signed packets and back.
//!
//! ```text
//! InstantMessage --encrypt--> SecureMessage --sign--> ReliableMessage
//! ReliableMessage --verify--> SecureMessage --decrypt--> InstantMessage
//! ```
//!
//! Messages to the broadcast identity are never encrypted. Their `data` is the serialized content
//! and they carry no wrapped keys.
use std::collections::BTreeMap;
use std::fmt;

use dimp_core::crypto::x25519;
use dimp_core::entity::{verification_keys, verified_visa};
use dimp_core::{AnyDocument, Archivist, Barrack, GroupDataSource, ID, SymmetricKey, UserDataSource};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::content::ContentRegistry;
use crate::crypto::{CryptoDelegate, CryptoError};
use crate::key_cache::{CipherKeyDelegate, KeyLookup};
use crate::message::{InstantMessage, MessageError, ReliableMessage, SecureMessage};

/// Message pipeline of one process.
///
/// Borrows everything it works with. The data source resolves identities and key material, the
/// barrack caches user and group views, the key cache holds symmetric keys per direction and the
/// registry parses decrypted content.
pub struct Packer<'a, D, K, C> {
    config: &'a Config,
    facebook: &'a D,
    barrack: &'a Barrack,
    keys: &'a K,
    crypto: &'a C,
    registry: &'a ContentRegistry,
}

impl<'a, D, K, C> Packer<'a, D, K, C>
where
    D: UserDataSource + GroupDataSource + Archivist,
    K: CipherKeyDelegate,
    C: CryptoDelegate,
{
    pub fn new(
        config: &'a Config,
        facebook: &'a D,
        barrack: &'a Barrack,
        keys: &'a K,
        crypto: &'a C,
        registry: &'a ContentRegistry,
    ) -> Self {
        Self {
            config,
            facebook,
            barrack,
            keys,
            crypto,
            registry,
        }
    }

    /// Encrypts the content of a message.
    ///
    /// The symmetric key is looked up for the direction from the sender to the group declared by
    /// the content, or to the receiver if there is none. Messages to a group ID get the key
    /// wrapped for every member in `keys`, members without an encryption key are skipped. If
    /// `members` is not given the group's members are resolved through the data source.
    pub fn encrypt(
        &self,
        instant: &InstantMessage,
        members: Option<&[ID]>,
    ) -> Result<SecureMessage, PackerError> {
        let mut envelope = instant.envelope.clone();
        if let Some(group) = instant
            .content
            .group()
            .filter(|group| *group != &envelope.receiver)
        {
            envelope.group = Some(group.clone());
        }
        envelope.msg_type = Some(instant.content.content_type());

        let sender = envelope.sender.clone();
        let recipient = envelope.effective_recipient().clone();
        let plaintext = instant.content.to_bytes().map_err(MessageError::from)?;

        if recipient.is_broadcast() {
            debug!(%sender, %recipient, "pack broadcast message without encryption");
            return Ok(SecureMessage {
                envelope,
                data: plaintext,
                key: None,
                keys: None,
            });
        }

        if envelope.receiver.is_group() {
            let members = match members {
                Some(members) => members.to_vec(),
                None => self.group_members(&envelope.receiver)?,
            };
            let recipients: Vec<_> = members
                .into_iter()
                .filter_map(|member| match self.encryption_key(&member) {
                    Some(public_key) => Some((member, public_key)),
                    None => {
                        warn!(group = %recipient, %member, "skip member without encryption key");
                        None
                    }
                })
                .collect();
            if recipients.is_empty() {
                return Err(PackerError::KeyUnavailable {
                    sender,
                    receiver: recipient,
                });
            }

            let lookup = self.cipher_key(&sender, &recipient)?;
            let data = self.crypto.encrypt_content(lookup.key(), &plaintext)?;
            let mut keys = BTreeMap::new();
            for (member, public_key) in recipients {
                match self.crypto.encrypt_key(lookup.key(), &public_key) {
                    Ok(wrapped) => {
                        keys.insert(member, wrapped);
                    }
                    Err(err) => warn!(group = %recipient, %member, "could not wrap key: {err}"),
                }
            }
            if keys.is_empty() {
                return Err(PackerError::KeyUnavailable {
                    sender,
                    receiver: recipient,
                });
            }
            debug!(%sender, group = %recipient, members = keys.len(), "encrypted group message");

            return Ok(SecureMessage {
                envelope,
                data,
                key: None,
                keys: Some(keys),
            });
        }

        let public_key = self.encryption_key(&envelope.receiver);
        let lookup = match public_key {
            Some(_) => self.cipher_key(&sender, &recipient)?,
            // Without the receiver's key we can only continue with a key it got before.
            None => match self.keys.cipher_key(&sender, &recipient) {
                Some(key) if self.config.reuse_cipher_keys => KeyLookup::Reused(key),
                _ => {
                    return Err(PackerError::KeyUnavailable {
                        sender,
                        receiver: envelope.receiver,
                    });
                }
            },
        };

        let data = self.crypto.encrypt_content(lookup.key(), &plaintext)?;
        let key = match public_key {
            Some(public_key) => Some(self.crypto.encrypt_key(lookup.key(), &public_key)?),
            None => {
                debug!(%sender, %recipient, "receiver key unknown, send without key");
                None
            }
        };

        Ok(SecureMessage {
            envelope,
            data,
            key,
            keys: None,
        })
    }

    /// Signs the encrypted data with the sender's signing key.
    pub fn sign(&self, secure: &SecureMessage) -> Result<ReliableMessage, PackerError> {
        let sender = &secure.envelope.sender;
        let signing_key = self.facebook.private_key_for_signature(sender).ok_or_else(|| {
            PackerError::KeyUnavailable {
                sender: sender.clone(),
                receiver: secure.envelope.receiver.clone(),
            }
        })?;
        let signature = self.crypto.sign(&secure.data, &signing_key);

        let mut reliable = ReliableMessage {
            secure: secure.clone(),
            signature,
            meta: None,
            visa: None,
        };
        if self.config.attach_handshake {
            reliable = reliable.with_handshake(
                self.facebook.meta(sender),
                verified_visa(self.facebook, sender),
            );
        }
        Ok(reliable)
    }

    /// Checks the signature against the sender's verification keys.
    ///
    /// A meta and visa attached to the message are stored through the [`Archivist`] first, if
    /// they belong to the sender. Returns `None` if no key accepts the signature.
    pub fn verify(
        &self,
        reliable: &ReliableMessage,
    ) -> Result<Option<SecureMessage>, PackerError> {
        let sender = &reliable.envelope.sender;
        self.accept_handshake(reliable)?;

        let keys = verification_keys(self.facebook, sender);
        if keys.is_empty() {
            return Err(PackerError::IdentityUnresolvable(sender.clone()));
        }
        let verified = keys
            .iter()
            .any(|key| self.crypto.verify(&reliable.data, &reliable.signature, key));
        if !verified {
            warn!(%sender, "signature mismatch");
            return Ok(None);
        }
        trace!(%sender, "signature verified");
        Ok(Some(reliable.secure.clone()))
    }

    /// Decrypts a message for the local user it is addressed to.
    ///
    /// Group messages are trimmed for the first local member. The unwrapped key is cached for the
    /// direction from the sender to the group once the content decrypted and parsed, so later
    /// messages without a key can be read.
    pub fn decrypt(&self, secure: &SecureMessage) -> Result<InstantMessage, PackerError> {
        let sender = &secure.envelope.sender;
        let recipient = secure.envelope.effective_recipient().clone();

        if recipient.is_broadcast() {
            let key = self
                .keys
                .cipher_key(sender, &recipient)
                .unwrap_or(SymmetricKey::Plain);
            let plaintext = self.crypto.decrypt_content(&key, &secure.data)?;
            let content = self.registry.parse(&plaintext).map_err(MessageError::from)?;
            return Ok(InstantMessage {
                envelope: secure.envelope.clone(),
                content,
            });
        }

        let receiver = &secure.envelope.receiver;
        let local_users = self.facebook.local_users();
        let local_user = self
            .barrack
            .select_local_user(receiver, &local_users, self.facebook)
            .ok_or_else(|| PackerError::IdentityUnresolvable(receiver.clone()))?;
        let secure = if receiver.is_group() {
            secure.trim(&local_user)
        } else {
            secure.clone()
        };

        let (key, unwrapped) = match secure.key() {
            Some(wrapped) => (self.unwrap_key(sender, &local_user, wrapped)?, true),
            None => {
                let key = self.keys.cipher_key(sender, &recipient).ok_or_else(|| {
                    PackerError::KeyUnavailable {
                        sender: sender.clone(),
                        receiver: recipient.clone(),
                    }
                })?;
                (key, false)
            }
        };

        let plaintext = self.crypto.decrypt_content(&key, &secure.data)?;
        let content = self.registry.parse(&plaintext).map_err(MessageError::from)?;

        // Only a key which opened readable content replaces the cached one.
        if unwrapped {
            self.keys.cache_cipher_key(sender, &recipient, key);
        }
        debug!(%sender, receiver = %local_user, sn = content.sn(), "decrypted message");

        Ok(InstantMessage {
            envelope: secure.envelope,
            content,
        })
    }

    /// Encrypts and signs.
    pub fn pack(
        &self,
        instant: &InstantMessage,
        members: Option<&[ID]>,
    ) -> Result<ReliableMessage, PackerError> {
        let secure = self.encrypt(instant, members)?;
        self.sign(&secure)
    }

    /// Verifies and decrypts. Returns `None` if the signature does not match.
    pub fn unpack(
        &self,
        reliable: &ReliableMessage,
    ) -> Result<Option<InstantMessage>, PackerError> {
        match self.verify(reliable)? {
            Some(secure) => Ok(Some(self.decrypt(&secure)?)),
            None => Ok(None),
        }
    }

    fn cipher_key(&self, sender: &ID, recipient: &ID) -> Result<KeyLookup, PackerError> {
        if !self.config.reuse_cipher_keys {
            let key = self.crypto.generate_key()?;
            self.keys.cache_cipher_key(sender, recipient, key.clone());
            return Ok(KeyLookup::Generated(key));
        }
        let lookup = self
            .keys
            .cipher_key_or_generate(sender, recipient, || self.crypto.generate_key())?;
        if lookup.is_reused() {
            trace!(%sender, %recipient, "reuse cipher key");
        }
        Ok(lookup)
    }

    fn encryption_key(&self, user: &ID) -> Option<x25519::PublicKey> {
        self.barrack
            .get_user(user, self.facebook)
            .and_then(|user| user.encryption_key(self.facebook))
    }

    fn group_members(&self, group: &ID) -> Result<Vec<ID>, PackerError> {
        self.barrack
            .get_group(group, self.facebook)
            .map(|group| group.members(self.facebook))
            .ok_or_else(|| PackerError::IdentityUnresolvable(group.clone()))
    }

    fn unwrap_key(
        &self,
        sender: &ID,
        local_user: &ID,
        wrapped: &[u8],
    ) -> Result<SymmetricKey, PackerError> {
        let candidates = self.facebook.private_keys_for_decryption(local_user);
        if candidates.is_empty() {
            return Err(PackerError::KeyUnavailable {
                sender: sender.clone(),
                receiver: local_user.clone(),
            });
        }
        for secret_key in &candidates {
            match self.crypto.decrypt_key(wrapped, secret_key) {
                Ok(key) => return Ok(key),
                Err(err) => trace!(%local_user, "decryption key did not match: {err}"),
            }
        }
        Err(CryptoError::NoMatchingKey(candidates.len()).into())
    }

    fn accept_handshake(&self, reliable: &ReliableMessage) -> Result<(), PackerError> {
        let sender = &reliable.envelope.sender;

        if let Some(meta) = &reliable.meta {
            if !meta.matches_id(sender) {
                warn!(%sender, "attached meta does not belong to sender");
                return Err(PackerError::IdentityUnresolvable(sender.clone()));
            }
            if !self.facebook.save_meta(sender, meta) {
                warn!(%sender, "could not save attached meta");
            }
        }

        if let Some(visa) = &reliable.visa {
            if visa.identifier() != sender {
                warn!(%sender, visa = %visa.identifier(), "ignore visa of another user");
                return Ok(());
            }
            let meta = reliable
                .meta
                .clone()
                .or_else(|| self.facebook.meta(sender))
                .filter(|meta| meta.matches_id(sender));
            let mut visa = visa.clone();
            match meta {
                Some(meta) if visa.verify(meta.public_key()) => {
                    if !self.facebook.save_document(&AnyDocument::Visa(visa)) {
                        warn!(%sender, "could not save attached visa");
                    }
                }
                _ => warn!(%sender, "ignore attached visa with invalid signature"),
            }
        }

        Ok(())
    }
}

impl<D, K, C> fmt::Debug for Packer<'_, D, K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packer")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum PackerError {
    #[error("identity {0} could not be resolved")]
    IdentityUnresolvable(ID),

    #[error("no key available for messages from {sender} to {receiver}")]
    KeyUnavailable { sender: ID, receiver: ID },

    #[error(transparent)]
    CryptoFailure(#[from] CryptoError),

    #[error(transparent)]
    MalformedMessage(#[from] MessageError),
}
