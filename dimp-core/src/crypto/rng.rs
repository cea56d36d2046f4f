// SPDX-License-Identifier: MIT OR Apache-2.0

use parking_lot::Mutex;
use rand::seq::IndexedRandom;
use rand_chacha::rand_core::{SeedableRng, TryRngCore};
use thiserror::Error;

/// Cryptographically-secure random number generator that uses the ChaCha algorithm.
///
/// Shared by reference between all callers, the inner state is guarded by a lock.
#[derive(Debug)]
pub struct Rng {
    rng: Mutex<rand_chacha::ChaCha20Rng>,
}

impl Default for Rng {
    fn default() -> Self {
        Self {
            rng: Mutex::new(rand_chacha::ChaCha20Rng::from_os_rng()),
        }
    }
}

#[cfg(any(test, feature = "test_utils"))]
impl Rng {
    /// Deterministic generator for tests.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            rng: Mutex::new(rand_chacha::ChaCha20Rng::from_seed(seed)),
        }
    }
}

impl Rng {
    pub fn random_array<const N: usize>(&self) -> Result<[u8; N], RngError> {
        let mut out = [0u8; N];
        self.rng
            .lock()
            .try_fill_bytes(&mut out)
            .map_err(|_| RngError::NotEnoughRandomness)?;
        Ok(out)
    }

    /// Picks `amount` distinct items in random order, or all of them if there are fewer.
    pub fn choose_multiple<T: Clone>(&self, items: &[T], amount: usize) -> Vec<T> {
        let mut rng = self.rng.lock();
        items.choose_multiple(&mut *rng, amount).cloned().collect()
    }
}

#[derive(Debug, Error)]
pub enum RngError {
    #[error("unable to collect enough randomness")]
    NotEnoughRandomness,
}

#[cfg(test)]
mod tests {
    use super::Rng;

    #[test]
    fn deterministic_randomness() {
        let sample_1 = {
            let rng = Rng::from_seed([1; 32]);
            rng.random_array::<128>().unwrap()
        };

        let sample_2 = {
            let rng = Rng::from_seed([1; 32]);
            rng.random_array::<128>().unwrap()
        };

        assert_eq!(sample_1, sample_2);
    }

    #[test]
    fn choose_distinct_items() {
        let rng = Rng::from_seed([2; 32]);
        let items: Vec<u32> = (0..10).collect();

        let mut chosen = rng.choose_multiple(&items, 4);
        assert_eq!(chosen.len(), 4);
        chosen.sort();
        chosen.dedup();
        assert_eq!(chosen.len(), 4);

        assert_eq!(rng.choose_multiple(&items, 20).len(), 10);
        assert!(rng.choose_multiple::<u32>(&[], 3).is_empty());
    }
}
