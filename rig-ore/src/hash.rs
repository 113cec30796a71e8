//! Hashing utilities.

use rig_types::Fingerprint;

/// Streaming xxh3 hasher that produces a [`Fingerprint`].
///
/// Variable length inputs are length prefixed so that `["ab", "c"]` and `["a", "bc"]`
/// never collide structurally.
pub struct Fingerprinter {
    inner: xxhash_rust::xxh3::Xxh3,
}

impl Fingerprinter {
    /// Create a new [`Fingerprinter`].
    pub fn new() -> Self {
        Fingerprinter {
            inner: xxhash_rust::xxh3::Xxh3::new(),
        }
    }

    /// Hash a length prefixed byte string.
    pub fn update_bytes(&mut self, input: &[u8]) {
        let len = u64::try_from(input.len()).expect("length fits in a u64");
        self.inner.update(&len.to_le_bytes());
        self.inner.update(input);
    }

    pub fn update_str(&mut self, input: &str) {
        self.update_bytes(input.as_bytes());
    }

    pub fn update_u64(&mut self, input: u64) {
        self.inner.update(&input.to_le_bytes());
    }

    pub fn digest(&self) -> Fingerprint {
        Fingerprint::new(self.inner.digest())
    }
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Fingerprinter::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_inputs_equal_digests() {
        let mut a = Fingerprinter::new();
        a.update_str("hello");
        a.update_u64(7);

        let mut b = Fingerprinter::default();
        b.update_str("hello");
        b.update_u64(7);

        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn length_prefix_separates_inputs() {
        let mut a = Fingerprinter::new();
        a.update_str("ab");
        a.update_str("c");

        let mut b = Fingerprinter::new();
        b.update_str("a");
        b.update_str("bc");

        assert_ne!(a.digest(), b.digest());
    }
}
