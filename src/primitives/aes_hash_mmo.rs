use aes::{
    cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit},
    Aes256,
};
use zeroize::{Zeroize, Zeroizing};

use super::Hash;

const BLOCK_LENGTH: usize = 32;
const LENGTH_BYTES: usize = 8;

/// AES-256 in the Matyas-Meyer-Oseas construction:
/// `Hᵢ = E(Hᵢ₋₁, Xᵢ) ⊕ Xᵢ`, the chaining value being used as the key.
///
/// The chaining value and the message blocks are 32 bytes long, each
/// message block is processed as two AES blocks, the second one keyed with
/// the half updated chaining value. The message is padded with `0x80`,
/// zeroes and its big endian bit length, so messages that only differ by
/// trailing zeroes do not collide.
#[derive(Clone)]
pub struct AesMmo {
    seed: [u8; 32],
    hash: [u8; 32],
    block: [u8; BLOCK_LENGTH],
    block_offset: usize,
    length: u64,
}

/// Mixes one 32 byte message block into the chaining value
#[inline]
fn compress(block: &[u8; BLOCK_LENGTH], hash: &mut [u8; 32]) {
    for half in 0..2 {
        let (lo, hi) = (half * 16, half * 16 + 16);
        let mut state = GenericArray::clone_from_slice(&block[lo..hi]);
        Aes256::new(GenericArray::from_slice(&hash[..])).encrypt_block(&mut state);
        // feed-forward with the other half of the chaining value
        let other = 16 - lo;
        for i in 0..16 {
            hash[lo + i] = state[i] ^ block[lo + i] ^ hash[other + i];
        }
    }
}

impl AesMmo {
    #[must_use]
    pub fn new(seed: &[u8; 32]) -> AesMmo {
        AesMmo {
            seed: *seed,
            hash: *seed,
            block: [0_u8; BLOCK_LENGTH],
            block_offset: 0,
            length: 0,
        }
    }

    fn absorb(&mut self, data: &[u8]) {
        let mut data_offset = 0_usize;
        while data_offset < data.len() {
            let data_to_copy =
                (data.len() - data_offset).min(BLOCK_LENGTH - self.block_offset);
            self.block[self.block_offset..self.block_offset + data_to_copy]
                .copy_from_slice(&data[data_offset..data_offset + data_to_copy]);
            data_offset += data_to_copy;
            self.block_offset += data_to_copy;
            if self.block_offset == BLOCK_LENGTH {
                compress(&self.block, &mut self.hash);
                self.block_offset = 0;
            }
        }
    }

    /// Convenience function to compute hash of the data.
    #[must_use]
    pub fn digest(seed: &[u8; 32], data: &[u8]) -> Zeroizing<Vec<u8>> {
        let mut hasher = AesMmo::new(seed);
        hasher.update(data);
        hasher.finalize()
    }
}

impl Default for AesMmo {
    fn default() -> Self {
        Self::new(&[0_u8; 32])
    }
}

impl Hash for AesMmo {
    fn digest_size(&self) -> usize {
        32
    }

    fn description(&self) -> String {
        "AES 256 Matyas-Meyer-Oseas (digest bits: 256)".to_string()
    }

    fn update(&mut self, data: &[u8]) {
        self.length = self.length.wrapping_add(data.len() as u64);
        self.absorb(data);
    }

    fn finalize(&mut self) -> Zeroizing<Vec<u8>> {
        let bit_length = self.length.wrapping_mul(8).to_be_bytes();
        self.absorb(&[0x80]);
        if self.block_offset > BLOCK_LENGTH - LENGTH_BYTES {
            self.absorb(&[0_u8; BLOCK_LENGTH][self.block_offset..]);
        }
        let padding = BLOCK_LENGTH - LENGTH_BYTES - self.block_offset;
        self.absorb(&[0_u8; BLOCK_LENGTH][..padding]);
        self.absorb(&bit_length);
        Zeroizing::new(self.hash.to_vec())
    }

    fn restart(&mut self) {
        self.hash = self.seed;
        self.block.zeroize();
        self.block_offset = 0;
        self.length = 0;
    }
}

impl Drop for AesMmo {
    fn drop(&mut self) {
        self.hash.zeroize();
        self.block.zeroize();
    }
}
