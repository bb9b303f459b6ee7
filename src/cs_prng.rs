use rand_core::{CryptoRng, RngCore};

use crate::{
    auto_seeder::AutoSeeder,
    config::{AutoSeederConfig, FortunaConfig},
    fortuna::AesFortuna,
    primitives::{
        aes::Aes256Cipher,
        sha2::{Sha256Hash, Sha512Hash},
    },
    FortunaError,
};

/// An implementation of a cryptographically secure
/// pseudo random generator using Fortuna over AES-256,
/// seeded from the OS and polling the fast entropy sources on every call
pub struct CsRng {
    rng: AutoSeeder<Aes256Cipher, Sha256Hash, Sha512Hash>,
}

impl CsRng {
    pub fn new() -> Result<Self, FortunaError> {
        Self::with_config(FortunaConfig::default(), AutoSeederConfig::default())
    }

    pub fn with_config(
        config: FortunaConfig,
        seeder_config: AutoSeederConfig,
    ) -> Result<Self, FortunaError> {
        Ok(Self {
            rng: AutoSeeder::new(AesFortuna::aes256(config)?, seeder_config)?,
        })
    }

    /// Generate a vector of random bytes
    pub fn generate_random_bytes(&mut self, len: usize) -> Result<Vec<u8>, FortunaError> {
        self.rng.generate_random_bytes(len)
    }

    #[must_use]
    pub fn seeder(&self) -> &AutoSeeder<Aes256Cipher, Sha256Hash, Sha512Hash> {
        &self.rng
    }
}

impl RngCore for CsRng {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.rng.try_fill_bytes(dest)
    }
}
impl CryptoRng for CsRng {}
