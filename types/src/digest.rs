//! SHA-256 content hashing over canonical field sequences.

use sha2::{Digest, Sha256};

/// Incremental hasher that frames each field so adjacent fields cannot
/// collide (`"ab" + "c"` hashes differently from `"a" + "bc"`).
pub struct ContentHasher {
    inner: Sha256,
}

impl ContentHasher {
    /// Start a hash in the given domain, e.g. `"af.node.v1"`.
    #[must_use]
    pub fn new(domain: &str) -> Self {
        let mut hasher = Self {
            inner: Sha256::new(),
        };
        hasher.field(domain);
        hasher
    }

    pub fn field(&mut self, value: &str) -> &mut Self {
        self.inner.update((value.len() as u64).to_be_bytes());
        self.inner.update(value.as_bytes());
        self
    }

    pub fn fields<I, S>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let values: Vec<S> = values.into_iter().collect();
        self.inner.update((values.len() as u64).to_be_bytes());
        for value in &values {
            self.field(value.as_ref());
        }
        self
    }

    #[must_use]
    pub fn finish_hex(self) -> String {
        hex_lower(&self.inner.finalize())
    }
}

/// Lowercase hex encoding (avoids a `hex` crate dependency).
#[must_use]
pub fn hex_lower(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framing_separates_fields() {
        let mut a = ContentHasher::new("test");
        a.field("ab").field("c");
        let mut b = ContentHasher::new("test");
        b.field("a").field("bc");
        assert_ne!(a.finish_hex(), b.finish_hex());
    }

    #[test]
    fn digest_is_stable_hex() {
        let mut h = ContentHasher::new("test");
        h.fields(["x", "y"]);
        let hex = h.finish_hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));

        let mut again = ContentHasher::new("test");
        again.fields(["x", "y"]);
        assert_eq!(again.finish_hex(), hex);
    }
}
