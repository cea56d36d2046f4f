// SPDX-License-Identifier: MIT OR Apache-2.0

use dimp_core::EvictionPolicy;
use serde::{Deserialize, Serialize};

/// Configuration for the message pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Reuse the cached symmetric key of a direction instead of generating one per message.
    pub(crate) reuse_cipher_keys: bool,

    /// How the identity registry shrinks its caches under memory pressure.
    pub(crate) eviction: EvictionPolicy,

    /// Attach the sender's meta and visa to every signed message, so recipients which never saw
    /// the sender before can verify it right away.
    pub(crate) attach_handshake: bool,
}

impl Config {
    pub fn new() -> Self {
        Self {
            reuse_cipher_keys: true,
            eviction: EvictionPolicy::Random { percent: 50 },
            attach_handshake: false,
        }
    }

    pub fn with_reuse_cipher_keys(mut self, reuse: bool) -> Self {
        self.reuse_cipher_keys = reuse;
        self
    }

    pub fn with_eviction(mut self, eviction: EvictionPolicy) -> Self {
        self.eviction = eviction;
        self
    }

    pub fn with_handshake(mut self, attach: bool) -> Self {
        self.attach_handshake = attach;
        self
    }

    pub fn reuse_cipher_keys(&self) -> bool {
        self.reuse_cipher_keys
    }

    pub fn eviction(&self) -> EvictionPolicy {
        self.eviction
    }

    pub fn attach_handshake(&self) -> bool {
        self.attach_handshake
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
