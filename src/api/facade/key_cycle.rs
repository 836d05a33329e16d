use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::types::KeyOrder;

/// Iterator over a snapshot of a dataset's keys.
///
/// Yields every key once per pass. With `forever` set it starts a new pass
/// after the last key, reshuffling first for [`KeyOrder::Shuffled`]. An empty
/// snapshot yields nothing even when cycling forever.
///
/// # Examples
///
/// ```ignore
/// use shardset::{KeyOrder, RecordReader};
///
/// for key in dataset.iter_keys(KeyOrder::Shuffled { seed: Some(7) }, false)? {
///     let frame = dataset.read_image(&key)?;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct KeyCycle<K = String> {
    keys: Vec<K>,
    rng: Option<ChaCha8Rng>,
    forever: bool,
    position: usize,
}

impl<K: Ord + Clone> KeyCycle<K> {
    pub fn new(mut keys: Vec<K>, order: KeyOrder, forever: bool) -> Self {
        let rng = match order {
            KeyOrder::Sorted => {
                keys.sort_unstable();
                None
            }
            KeyOrder::Shuffled { seed } => {
                let mut rng = seed.map_or_else(ChaCha8Rng::from_entropy, ChaCha8Rng::seed_from_u64);
                keys.shuffle(&mut rng);
                Some(rng)
            }
        };

        Self {
            keys,
            rng,
            forever,
            position: 0,
        }
    }

    /// Number of keys in one pass.
    pub fn pass_len(&self) -> usize {
        self.keys.len()
    }
}

impl<K: Clone> Iterator for KeyCycle<K> {
    type Item = K;

    fn next(&mut self) -> Option<K> {
        if self.keys.is_empty() {
            return None;
        }
        if self.position == self.keys.len() {
            if !self.forever {
                return None;
            }
            self.position = 0;
            if let Some(rng) = self.rng.as_mut() {
                self.keys.shuffle(rng);
            }
        }

        let key = self.keys[self.position].clone();
        self.position += 1;
        Some(key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.forever && !self.keys.is_empty() {
            (usize::MAX, None)
        } else {
            let remaining = self.keys.len() - self.position;
            (remaining, Some(remaining))
        }
    }
}
