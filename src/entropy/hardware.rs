//! CPU random number instructions (RDRAND, RDSEED).
//!
//! Availability is detected once at construction; a source is never built
//! for an instruction the CPU lacks.

#[cfg(target_arch = "x86")]
use core::arch::x86::{_rdrand32_step as rdrand_step, _rdseed32_step as rdseed_step};
#[cfg(target_arch = "x86_64")]
use core::arch::x86_64::{_rdrand64_step as rdrand_step, _rdseed64_step as rdseed_step};

use super::EntropySource;
use crate::FortunaError;

/// Attempts per word before the instruction is considered exhausted
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
const MAX_RETRIES: usize = 10;

#[cfg(target_arch = "x86")]
type Word = u32;
#[cfg(target_arch = "x86_64")]
type Word = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareInstruction {
    RdRand,
    RdSeed,
}

impl HardwareInstruction {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::RdRand => "rdrand",
            Self::RdSeed => "rdseed",
        }
    }
}

#[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), not(windows)))]
fn detect(instruction: HardwareInstruction) -> bool {
    cupid::master().map_or(false, |information| match instruction {
        HardwareInstruction::RdRand => information.rdrand(),
        HardwareInstruction::RdSeed => information.rdseed(),
    })
}

#[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), windows))]
fn detect(instruction: HardwareInstruction) -> bool {
    match instruction {
        HardwareInstruction::RdRand => std::is_x86_feature_detected!("rdrand"),
        HardwareInstruction::RdSeed => std::is_x86_feature_detected!("rdseed"),
    }
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn detect(_instruction: HardwareInstruction) -> bool {
    false
}

/// An entropy source backed by a CPU instruction
#[derive(Debug, Clone, Copy)]
pub struct HardwareRng {
    instruction: HardwareInstruction,
}

impl HardwareRng {
    #[must_use]
    pub fn is_available(instruction: HardwareInstruction) -> bool {
        detect(instruction)
    }

    /// Fails with `HardwareCapability` when the CPU does not offer
    /// `instruction`
    pub fn new(instruction: HardwareInstruction) -> Result<Self, FortunaError> {
        if !Self::is_available(instruction) {
            return Err(FortunaError::HardwareCapability(format!(
                "{} is not supported by this CPU",
                instruction.name()
            )));
        }
        Ok(Self { instruction })
    }

    #[must_use]
    pub fn instruction(&self) -> HardwareInstruction {
        self.instruction
    }

    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    fn fill_words(&self, dest: &mut [u8]) -> Result<(), FortunaError> {
        let mut word: Word = 0;
        for chunk in dest.chunks_mut(core::mem::size_of::<Word>()) {
            let mut delivered = false;
            for _ in 0..MAX_RETRIES {
                // SAFETY: the instruction was detected when `self` was built
                let status = unsafe {
                    match self.instruction {
                        HardwareInstruction::RdRand => rdrand_step(&mut word),
                        HardwareInstruction::RdSeed => rdseed_step(&mut word),
                    }
                };
                if status == 1 {
                    delivered = true;
                    break;
                }
                std::hint::spin_loop();
            }
            if !delivered {
                return Err(FortunaError::EntropySource(format!(
                    "{} did not deliver after {MAX_RETRIES} attempts",
                    self.instruction.name()
                )));
            }
            chunk.copy_from_slice(&word.to_le_bytes()[..chunk.len()]);
        }
        Ok(())
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    fn fill_words(&self, _dest: &mut [u8]) -> Result<(), FortunaError> {
        Err(FortunaError::HardwareCapability(format!(
            "{} is not supported on this architecture",
            self.instruction.name()
        )))
    }
}

impl EntropySource for HardwareRng {
    fn name(&self) -> &'static str {
        self.instruction.name()
    }

    fn fill(&mut self, dest: &mut [u8]) -> Result<(), FortunaError> {
        self.fill_words(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::{HardwareInstruction, HardwareRng};
    use crate::{entropy::EntropySource, FortunaError};

    #[test]
    fn test_hardware_sources() {
        for instruction in [HardwareInstruction::RdRand, HardwareInstruction::RdSeed] {
            match HardwareRng::new(instruction) {
                Ok(mut source) => {
                    assert!(HardwareRng::is_available(instruction));
                    assert_eq!(source.instruction(), instruction);
                    // odd length: the last word is truncated
                    let mut a = [0_u8; 37];
                    let mut b = [0_u8; 37];
                    source.fill(&mut a).unwrap();
                    source.fill(&mut b).unwrap();
                    assert_ne!(a, b);
                }
                Err(e) => {
                    assert!(!HardwareRng::is_available(instruction));
                    assert!(matches!(e, FortunaError::HardwareCapability(_)));
                }
            }
        }
    }
}
