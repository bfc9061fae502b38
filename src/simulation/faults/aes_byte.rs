use super::{FaultFunctions, FaultType};
use crate::block::{Block, CipherKind};
use crate::cipher::aes::ROUNDS;
use crate::error::DfaError;
use crate::simulation::Target;
use std::fmt::Debug;
use std::sync::Arc;

/// AES byte fault structure
/// round   Round whose SubBytes input is faulted
/// index   State byte (`4 * column + row`)
/// value   XOR value applied to the state byte
///
#[derive(Clone, Copy)]
pub struct AesByteFault {
    pub round: usize,
    pub index: usize,
    pub value: u8,
}

impl Debug for AesByteFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "AES byte fault (aesbyte_r{}_{}_{:02x})",
            self.round, self.index, self.value
        )
    }
}

/// Implementation for AesByteFault fault
impl AesByteFault {
    /// Creates a new `AesByteFault`.
    ///
    /// # Arguments
    ///
    /// * `round` - Round to inject into (1 to 10).
    /// * `index` - State byte to fault (0 to 15).
    /// * `value` - Non zero XOR value.
    pub fn new(round: usize, index: usize, value: u8) -> Arc<Self> {
        Arc::new(Self {
            round,
            index,
            value,
        })
    }
}

impl FaultFunctions for AesByteFault {
    fn cipher(&self) -> CipherKind {
        CipherKind::Aes
    }

    /// XORs `value` into the state byte at the start of the round.
    fn execute(&self, target: &Target) -> Result<Block, DfaError> {
        match target {
            Target::Aes { cipher, plaintext } => Ok(Block::Aes(cipher.encrypt_block_with_fault(
                plaintext,
                self.round,
                self.index,
                self.value,
            ))),
            Target::Des { .. } => Err(DfaError::MalformedInput(format!(
                "{:?} cannot be injected into DES",
                self
            ))),
        }
    }

    /// Tries to create an `AesByteFault` from the given input string.
    ///
    /// # Arguments
    ///
    /// * `input` - Descriptor like `aesbyte_r9_0_01`.
    ///
    /// # Returns
    ///
    /// * `Option<FaultType>` - Returns the fault type if successful, otherwise `None`.
    fn try_from(&self, input: &str) -> Option<FaultType> {
        // divide name from attributes
        let collect: Vec<&str> = input.split('_').collect();
        if collect.len() != 4 || collect[0] != "aesbyte" {
            return None;
        }
        let round = collect[1].strip_prefix('r')?.parse::<usize>().ok()?;
        let index = collect[2].parse::<usize>().ok()?;
        let mut value = [0u8; 1];
        hex::decode_to_slice(collect[3], &mut value).ok()?;
        let value = value[0];
        // a zero value does not fault anything
        if (1..=ROUNDS).contains(&round) && index < 16 && value != 0 {
            return Some(Self::new(round, index, value));
        }
        None
    }

    /// Get the list of suggested faults.
    ///
    /// # Returns
    ///
    /// * `Vec<String>` - Every state byte before round 9 with every single bit value.
    fn get_list(&self) -> Vec<String> {
        let mut list = Vec::new();
        // Values will look like: aesbyte_r9_0_01, aesbyte_r9_0_02, ...
        for index in 0..16 {
            for bit in 0..8 {
                list.push(format!("aesbyte_r9_{}_{:02x}", index, 1u8 << bit));
            }
        }
        list
    }
}
