pub mod auto_seeder;
pub mod clock;
pub mod config;
pub mod cs_prng;
pub mod entropy;
mod error;
pub mod fortuna;
pub mod primitives;

#[cfg(test)]
mod test_utils;

pub use auto_seeder::AutoSeeder;
pub use cs_prng::CsRng;
pub use error::FortunaError;
pub use fortuna::{AesFortuna, FortunaGenerator};
