use aes::{
    cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit},
    Aes128, Aes256,
};

use super::{check_length, BlockCipher};
use crate::FortunaError;

// These implement the block transform using the pure rust `aes` crate.
// It will use the AES native interface on the CPU if available

pub const BLOCK_LENGTH: usize = 16;

macro_rules! aes_block_cipher {
    ($name:ident, $inner:ty, $key_length:expr, $bits:expr) => {
        /// AES keyed block transform. The cipher starts keyed with an all-zero key.
        pub struct $name {
            cipher: $inner,
        }

        impl $name {
            pub const KEY_LENGTH: usize = $key_length;

            #[must_use]
            pub fn new() -> Self {
                Self {
                    cipher: <$inner>::new(&GenericArray::default()),
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl BlockCipher for $name {
            fn block_size(&self) -> usize {
                BLOCK_LENGTH
            }

            fn max_key_length(&self) -> usize {
                Self::KEY_LENGTH
            }

            fn description(&self) -> String {
                format!(
                    "AES {} pure Rust (key bits: {}, block bits: {})",
                    $bits,
                    Self::KEY_LENGTH * 8,
                    BLOCK_LENGTH * 8
                )
            }

            fn set_key(&mut self, key: &[u8]) -> Result<(), FortunaError> {
                check_length(key.len(), Self::KEY_LENGTH)?;
                self.cipher = <$inner>::new(GenericArray::from_slice(key));
                Ok(())
            }

            fn encrypt_block(&self, input: &[u8], output: &mut [u8]) -> Result<(), FortunaError> {
                check_length(input.len(), BLOCK_LENGTH)?;
                check_length(output.len(), BLOCK_LENGTH)?;
                let mut block = GenericArray::clone_from_slice(input);
                self.cipher.encrypt_block(&mut block);
                output.copy_from_slice(&block);
                Ok(())
            }
        }
    };
}

aes_block_cipher!(Aes128Cipher, Aes128, 16, 128);
aes_block_cipher!(Aes256Cipher, Aes256, 32, 256);
