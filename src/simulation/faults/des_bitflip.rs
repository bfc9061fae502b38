use super::{FaultFunctions, FaultType};
use crate::block::{Block, CipherKind};
use crate::cipher::des::{encrypt_with_fault, ROUNDS};
use crate::error::DfaError;
use crate::simulation::Target;
use std::fmt::Debug;
use std::sync::Arc;

/// DES bit flip fault structure
/// round   Number of completed rounds before the flip
/// bit     Bit of the right half to flip (0 = LSB)
///
#[derive(Clone, Copy)]
pub struct DesBitFlip {
    pub round: usize,
    pub bit: u32,
}

impl Debug for DesBitFlip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DES bit flip (desbf_r{}_{})", self.round, self.bit)
    }
}

impl DesBitFlip {
    /// Create a new DesBitFlip fault
    pub fn new(round: usize, bit: u32) -> Arc<Self> {
        Arc::new(Self { round, bit })
    }
}

impl FaultFunctions for DesBitFlip {
    fn cipher(&self) -> CipherKind {
        CipherKind::Des
    }

    /// Flips one bit of R once `round` rounds are done.
    fn execute(&self, target: &Target) -> Result<Block, DfaError> {
        match target {
            Target::Des { key, plaintext } => Ok(Block::Des(encrypt_with_fault(
                *plaintext,
                *key,
                self.round,
                1 << self.bit,
            ))),
            Target::Aes { .. } => Err(DfaError::MalformedInput(format!(
                "{:?} cannot be injected into AES",
                self
            ))),
        }
    }

    /// Tries to create a `DesBitFlip` from a descriptor like `desbf_r15_7`.
    fn try_from(&self, input: &str) -> Option<FaultType> {
        let collect: Vec<&str> = input.split('_').collect();
        let fault_type = collect.first().copied()?;
        let attribute_1 = collect.get(1).copied()?;
        let attribute_2 = collect.get(2).copied()?;
        if fault_type == "desbf" && collect.len() == 3 {
            if let Some(stripped) = attribute_1.strip_prefix('r') {
                if let (Ok(round), Ok(bit)) = (stripped.parse::<usize>(), attribute_2.parse::<u32>()) {
                    if (1..=ROUNDS).contains(&round) && bit < 32 {
                        return Some(Self::new(round, bit));
                    }
                }
            }
        }
        None
    }

    /// Get the list of suggested faults.
    ///
    /// # Returns
    ///
    /// * `Vec<String>` - Every bit of R after round 15.
    fn get_list(&self) -> Vec<String> {
        // Values will look like: desbf_r15_0, desbf_r15_1, ...
        (0..32).map(|bit| format!("desbf_r15_{}", bit)).collect()
    }
}
