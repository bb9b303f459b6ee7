use super::EntropySource;
use crate::FortunaError;

#[cfg(unix)]
const BLOCKING_DEVICE: &str = "/dev/random";

/// The operating system generator.
///
/// The non blocking variant uses `getrandom`. The blocking variant reads the
/// blocking device on Unix, which waits until the kernel considers itself
/// seeded; elsewhere it falls back to `getrandom`.
#[derive(Debug, Clone, Copy)]
pub struct OsEntropy {
    blocking: bool,
}

impl OsEntropy {
    #[must_use]
    pub fn non_blocking() -> Self {
        Self { blocking: false }
    }

    #[must_use]
    pub fn blocking() -> Self {
        Self { blocking: true }
    }

    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.blocking
    }
}

fn getrandom_fill(dest: &mut [u8]) -> Result<(), FortunaError> {
    getrandom::getrandom(dest).map_err(|e| FortunaError::EntropySource(format!("getrandom: {e}")))
}

#[cfg(unix)]
fn blocking_fill(dest: &mut [u8]) -> Result<(), FortunaError> {
    use std::{fs::File, io::Read};

    // read_exact retries on EINTR
    File::open(BLOCKING_DEVICE)
        .and_then(|mut device| device.read_exact(dest))
        .map_err(|e| FortunaError::EntropySource(format!("read {BLOCKING_DEVICE}: {e}")))
}

#[cfg(not(unix))]
fn blocking_fill(dest: &mut [u8]) -> Result<(), FortunaError> {
    getrandom_fill(dest)
}

impl EntropySource for OsEntropy {
    fn name(&self) -> &'static str {
        if self.blocking {
            "os-blocking"
        } else {
            "os"
        }
    }

    fn fill(&mut self, dest: &mut [u8]) -> Result<(), FortunaError> {
        if dest.is_empty() {
            return Ok(());
        }
        if self.blocking {
            blocking_fill(dest)
        } else {
            getrandom_fill(dest)
        }
    }
}
