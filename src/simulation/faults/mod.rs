use super::Target;
use crate::block::{Block, CipherKind};
use crate::error::DfaError;
use std::{fmt::Debug, sync::Arc};

pub mod aes_byte;
pub mod des_bitflip;

pub use aes_byte::AesByteFault;
pub use des_bitflip::DesBitFlip;

/// List of all fault models, used as parsers for descriptors
const FAULTS: [&dyn FaultFunctions; 2] = [
    &AesByteFault {
        round: 9,
        index: 0,
        value: 0x01,
    },
    &DesBitFlip { round: 15, bit: 0 },
];

/// Trait for fault injection functions
pub trait FaultFunctions: Send + Sync + Debug {
    /// Cipher this fault can be injected into
    fn cipher(&self) -> CipherKind;
    /// Runs the faulted encryption and returns its output.
    fn execute(&self, target: &Target) -> Result<Block, DfaError>;
    fn try_from(&self, input: &str) -> Option<FaultType>;
    fn get_list(&self) -> Vec<String>;
}

/// Type definition of fault injection data type
pub type FaultType = Arc<dyn FaultFunctions>;

/// Get the fault type from a string
pub fn get_fault_from(input: &str) -> Result<FaultType, DfaError> {
    // Parse the fault types
    let result = FAULTS.iter().find_map(|fault| fault.try_from(input));
    match result {
        Some(output) => Ok(output),
        None => Err(DfaError::Config(format!("Unknown fault type: {:?}", input))),
    }
}

/// Get lists of all suggested faults
pub fn get_fault_lists() -> Vec<Vec<String>> {
    // Parse all fault types
    FAULTS.iter().map(|fault| fault.get_list()).collect()
}

/// Suggested fault list for one cipher
pub fn get_fault_list(kind: CipherKind) -> Vec<String> {
    FAULTS
        .iter()
        .filter(|fault| fault.cipher() == kind)
        .flat_map(|fault| fault.get_list())
        .collect()
}
