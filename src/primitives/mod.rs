//! Capabilities consumed by the generator.
//!
//! The `BlockCipher` trait describes a keyed block transform used in counter
//! mode by the generator core. The `Hash` trait describes an incremental hash
//! used by the entropy pools, the reseed derivation and the randomized pool
//! routing. Neither trait is tied to a specific algorithm so the generator can
//! run over any pair, including mock primitives in tests.

pub mod aes;
pub mod aes_hash_mmo;
pub mod sha2;

use zeroize::Zeroizing;

use crate::FortunaError;

/// A keyed block transform.
pub trait BlockCipher: Send {
    /// Size of a block in bytes
    fn block_size(&self) -> usize;

    /// Length in bytes of the longest key accepted by `set_key`.
    /// The generator always keys the cipher with a key of this length.
    fn max_key_length(&self) -> usize;

    /// A short description of the cipher
    fn description(&self) -> String;

    /// Replaces the current key.
    fn set_key(&mut self, key: &[u8]) -> Result<(), FortunaError>;

    /// Encrypts exactly one block of `input` into `output`.
    ///
    /// Both slices must be `block_size()` long.
    fn encrypt_block(&self, input: &[u8], output: &mut [u8]) -> Result<(), FortunaError>;
}

/// An incremental hash function.
pub trait Hash: Send {
    /// Size of the digest in bytes
    fn digest_size(&self) -> usize;

    /// A short description of the hash
    fn description(&self) -> String;

    /// Digest data, updating the internal state.
    fn update(&mut self, data: &[u8]);

    /// Returns the digest of everything passed to `update` since the last
    /// restart. The internal state is undefined afterwards until `restart`
    /// is called.
    fn finalize(&mut self) -> Zeroizing<Vec<u8>>;

    /// Puts the hash back into its initial state.
    fn restart(&mut self);

    /// Writes the first `output.len()` bytes of the digest into `output` then
    /// restarts the hash.
    ///
    /// Fails if more bytes are requested than the digest holds.
    fn truncated_final(&mut self, output: &mut [u8]) -> Result<(), FortunaError> {
        let digest = self.finalize();
        self.restart();
        if output.len() > digest.len() {
            return Err(FortunaError::SizeError {
                given: output.len(),
                expected: digest.len(),
            });
        }
        output.copy_from_slice(&digest[..output.len()]);
        Ok(())
    }
}

/// Checks the length of a slice handed to a capability.
pub(crate) fn check_length(given: usize, expected: usize) -> Result<(), FortunaError> {
    if given != expected {
        return Err(FortunaError::SizeError { given, expected });
    }
    Ok(())
}
