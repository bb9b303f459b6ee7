use sha2::{digest::FixedOutputReset, Digest, Sha256, Sha512};
use zeroize::Zeroizing;

use super::Hash;

/// Adapts a RustCrypto fixed output digest to the `Hash` capability
#[derive(Clone)]
pub struct DigestHash<D> {
    inner: D,
    name: &'static str,
}

pub type Sha256Hash = DigestHash<Sha256>;
pub type Sha512Hash = DigestHash<Sha512>;

impl Sha256Hash {
    #[must_use]
    pub fn new() -> Self {
        DigestHash {
            inner: Sha256::new(),
            name: "SHA-256",
        }
    }
}

impl Sha512Hash {
    #[must_use]
    pub fn new() -> Self {
        DigestHash {
            inner: Sha512::new(),
            name: "SHA-512",
        }
    }
}

impl Default for Sha256Hash {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for Sha512Hash {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> Hash for DigestHash<D>
where
    D: Digest + FixedOutputReset + Send,
{
    fn digest_size(&self) -> usize {
        <D as Digest>::output_size()
    }

    fn description(&self) -> String {
        format!("{} (digest bits: {})", self.name, self.digest_size() * 8)
    }

    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.inner, data);
    }

    fn finalize(&mut self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.inner.finalize_reset().to_vec())
    }

    fn restart(&mut self) {
        Digest::reset(&mut self.inner);
    }
}
