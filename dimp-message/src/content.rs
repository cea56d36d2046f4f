// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message content and the table of content parsers.
//!
//! Concrete payloads (text, files, commands, ...) are up to the application. The pipeline only
//! relies on every content being a JSON object with a `type` tag and a serial number `sn`, group
//! messages also carry the `group` they were sent to.
use std::collections::HashMap;
use std::fmt;

use dimp_core::{ID, Rng};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Well-known content type tags.
pub mod content_type {
    pub const ANY: u8 = 0x00;
    pub const TEXT: u8 = 0x01;
    pub const FILE: u8 = 0x10;
    pub const IMAGE: u8 = 0x12;
    pub const AUDIO: u8 = 0x14;
    pub const VIDEO: u8 = 0x16;
    pub const PAGE: u8 = 0x20;
    pub const COMMAND: u8 = 0x88;
    pub const HISTORY: u8 = 0x89;
    pub const FORWARD: u8 = 0xff;
}

/// Decrypted body of a message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(rename = "type")]
    content_type: u8,

    /// Serial number, unique per sender.
    sn: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    group: Option<ID>,

    /// Type specific fields.
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Content {
    /// Creates an empty content with a random serial number.
    pub fn new(content_type: u8, rng: &Rng) -> Result<Self, ContentError> {
        let sn = u64::from_le_bytes(rng.random_array()?);
        Ok(Self::with_sn(content_type, sn))
    }

    pub fn with_sn(content_type: u8, sn: u64) -> Self {
        Self {
            content_type,
            sn,
            group: None,
            fields: Map::new(),
        }
    }

    pub fn content_type(&self) -> u8 {
        self.content_type
    }

    pub fn sn(&self) -> u64 {
        self.sn
    }

    pub fn group(&self) -> Option<&ID> {
        self.group.as_ref()
    }

    pub fn set_group(&mut self, group: Option<ID>) {
        self.group = group;
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Sets a type specific field. The reserved keys `type`, `sn` and `group` are ignored.
    pub fn set(&mut self, key: &str, value: Value) {
        if matches!(key, "type" | "sn" | "group") {
            return;
        }
        self.fields.insert(key.to_string(), value);
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ContentError> {
        Ok(serde_json::to_vec(self)?)
    }
}

type ContentParser = Box<dyn Fn(Content) -> Result<Content, ContentError> + Send + Sync>;

/// Parsers for content types, owned by the application and handed to the packer.
///
/// A parser receives the generically decoded content and checks the fields its type requires.
/// Types without a registered parser are accepted as they are.
#[derive(Default)]
pub struct ContentRegistry {
    parsers: HashMap<u8, ContentParser>,
}

impl ContentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, content_type: u8, parser: F)
    where
        F: Fn(Content) -> Result<Content, ContentError> + Send + Sync + 'static,
    {
        self.parsers.insert(content_type, Box::new(parser));
    }

    pub fn is_registered(&self, content_type: u8) -> bool {
        self.parsers.contains_key(&content_type)
    }

    /// Decodes serialized content and runs the parser registered for its type.
    pub fn parse(&self, bytes: &[u8]) -> Result<Content, ContentError> {
        let content: Content = serde_json::from_slice(bytes)?;
        match self.parsers.get(&content.content_type) {
            Some(parser) => parser(content),
            None => Ok(content),
        }
    }
}

impl fmt::Debug for ContentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&u8> = self.parsers.keys().collect();
        types.sort();
        f.debug_struct("ContentRegistry")
            .field("types", &types)
            .finish()
    }
}

/// Parser for text content, requires a `text` string.
pub fn parse_text(content: Content) -> Result<Content, ContentError> {
    match content.get("text") {
        Some(Value::String(_)) => Ok(content),
        _ => Err(ContentError::MissingField(content.content_type, "text")),
    }
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content is not valid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("content of type {0:#04x} is missing field '{1}'")]
    MissingField(u8, &'static str),

    #[error(transparent)]
    Rng(#[from] dimp_core::crypto::RngError),
}
