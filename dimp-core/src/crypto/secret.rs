// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::ZeroizeOnDrop;

/// Container for secret key bytes (X25519 secrets, symmetric content keys).
///
/// Memory is zeroised on drop, comparisons run in constant time and debug output never shows the
/// value.
#[derive(Clone, Eq, Serialize, Deserialize, ZeroizeOnDrop)]
pub struct Secret<const N: usize>(#[serde(with = "serde_bytes")] [u8; N]);

impl<const N: usize> Secret<N> {
    pub(crate) fn from_bytes(bytes: [u8; N]) -> Self {
        Self(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }
}

impl<const N: usize> PartialEq for Secret<N> {
    fn eq(&self, other: &Self) -> bool {
        bool::from(self.0.ct_eq(&other.0))
    }
}

impl<const N: usize> fmt::Debug for Secret<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Secret").field(&"***").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::Secret;

    #[test]
    fn hidden_in_debug_output() {
        let secret = Secret::from_bytes([7; 32]);
        assert_eq!(format!("{:?}", secret), "Secret(\"***\")");
    }

    #[test]
    fn equality() {
        assert_eq!(Secret::from_bytes([1; 16]), Secret::from_bytes([1; 16]));
        assert_ne!(Secret::from_bytes([1; 16]), Secret::from_bytes([2; 16]));
    }
}
