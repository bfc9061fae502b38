//! AES-128 last round key recovery from single byte faults injected before
//! the round 9 SubBytes step.
//!
//! A fault in state byte `(row, column)` survives ShiftRows of round 9 as a
//! single byte of MixColumns column `(column - row) mod 4`. MixColumns spreads
//! it over that whole column and the round 10 ShiftRows lays the column out
//! on one diagonal of the ciphertext.

use super::{recover, ConsensusAggregator, FaultAnalysis, FaultOf, Recovery};
use crate::block::AesBlock;
use crate::cipher::aes::{mix_single_column, INV_SBOX};
use crate::diff::{compare, dump_diff};
use crate::error::DfaError;
use itertools::iproduct;
use log::{debug, log_enabled, trace, Level};
use std::sync::{Arc, OnceLock};

/// Ciphertext byte indices touched by a fault in each diagonal, ascending.
pub const FAULT_PATTERNS: [[usize; 4]; 4] = [
    [0, 7, 10, 13],
    [1, 4, 11, 14],
    [2, 5, 8, 15],
    [3, 6, 9, 12],
];

/// Ciphertext byte index of MixColumns row `i` for each diagonal.
pub const FAULT_DESTINATION: [[usize; 4]; 4] = [
    [0, 13, 10, 7],
    [4, 1, 14, 11],
    [8, 5, 2, 15],
    [12, 9, 6, 3],
];

/// Byte-wise XOR delta of one MixColumns column.
pub type DifferenceVector = [u8; 4];

static FAULT_PROPAGATION: OnceLock<Vec<DifferenceVector>> = OnceLock::new();

/// MixColumns output for every single byte input difference.
///
/// Entry `row * 256 + value` holds the column delta produced by `value` in
/// `row`. Built on first use and shared by all analyses.
pub fn fault_propagation() -> &'static [DifferenceVector] {
    FAULT_PROPAGATION.get_or_init(compute_propagation)
}

fn compute_propagation() -> Vec<DifferenceVector> {
    iproduct!(0..4usize, 0..=255u8)
        .map(|(row, value)| {
            let mut column = [0u8; 4];
            column[row] = value;
            mix_single_column(&mut column);
            column
        })
        .collect()
}

/// Maps a byte diff list onto the diagonal it belongs to.
///
/// Only exact single diagonal patterns are recognised. Partial diffs and
/// diffs spreading over more than one diagonal return `None`.
pub fn recognize_fault_pattern(diffs: &[usize]) -> Option<usize> {
    if diffs.len() != 4 {
        return None;
    }
    FAULT_PATTERNS
        .iter()
        .position(|pattern| pattern[..] == diffs[..])
}

/// Last round key byte candidates of one ciphertext position, bucketed by
/// the SubBytes input delta they explain.
pub struct KeyCandidates {
    buckets: [Vec<u8>; 256],
}

impl KeyCandidates {
    /// Tests all 256 key bytes against the byte pair `(reference, faulted)`.
    pub fn new(reference: u8, faulted: u8) -> Self {
        let mut buckets: [Vec<u8>; 256] = std::array::from_fn(|_| Vec::new());
        for key in 0..=255u8 {
            let delta = INV_SBOX[(reference ^ key) as usize] ^ INV_SBOX[(faulted ^ key) as usize];
            buckets[delta as usize].push(key);
        }
        Self { buckets }
    }

    /// Key bytes `k` with `InvSBox[r ^ k] ^ InvSBox[f ^ k] == delta`.
    pub fn for_delta(&self, delta: u8) -> &[u8] {
        &self.buckets[delta as usize]
    }
}

/// Recovery of the round 10 key from round 9 byte faults.
pub struct AesAnalysis {
    reference: AesBlock,
}

impl AesAnalysis {
    pub fn new(reference: AesBlock) -> Self {
        Self { reference }
    }
}

impl FaultAnalysis for AesAnalysis {
    type Block = AesBlock;
    type Location = usize;
    type Candidate = [u8; 4];
    type RoundKey = AesBlock;

    fn name(&self) -> &'static str {
        "AES-128"
    }

    fn segments(&self) -> usize {
        FAULT_PATTERNS.len()
    }

    fn classify(&self, faulted: &AesBlock) -> Result<Option<usize>, DfaError> {
        let diffs = compare(&self.reference, faulted)?;
        if log_enabled!(Level::Debug) && !diffs.is_empty() {
            debug!("\n{}", dump_diff(&self.reference, faulted, &diffs));
        }
        let diagonal = recognize_fault_pattern(&diffs);
        match diagonal {
            Some(diagonal) => debug!("Fault in diagonal {}", diagonal),
            None => debug!(
                "Dropping faulted output {}: {} faulted bytes {:?} match no diagonal",
                hex::encode_upper(faulted),
                diffs.len(),
                diffs
            ),
        }
        Ok(diagonal)
    }

    fn generate_candidates(
        &self,
        fault: &FaultOf<Self>,
        sets: &mut ConsensusAggregator<[u8; 4]>,
    ) -> usize {
        let diagonal = fault.location;
        let destination = FAULT_DESTINATION[diagonal];
        let positions: [KeyCandidates; 4] = std::array::from_fn(|i| {
            let index = destination[i];
            KeyCandidates::new(self.reference[index], fault.output[index])
        });

        let mut discarded = 0;
        for (hypothesis, delta) in fault_propagation().iter().enumerate() {
            let lists: [&[u8]; 4] = std::array::from_fn(|i| positions[i].for_delta(delta[i]));
            if lists.iter().any(|list| list.is_empty()) {
                trace!(
                    "Diagonal {}: hypothesis {} ({:02X?}) has no key candidate",
                    diagonal,
                    hypothesis,
                    delta
                );
                discarded += 1;
                continue;
            }
            for (k0, k1, k2, k3) in iproduct!(lists[0], lists[1], lists[2], lists[3]) {
                sets.add(diagonal, [*k0, *k1, *k2, *k3]);
            }
        }
        discarded
    }

    fn assemble(&self, recovered: &[[u8; 4]]) -> AesBlock {
        let mut key = [0u8; 16];
        for (destination, tuple) in FAULT_DESTINATION.iter().zip(recovered) {
            for (&index, &byte) in destination.iter().zip(tuple) {
                key[index] = byte;
            }
        }
        key
    }
}

/// Recovers the AES-128 round 10 key.
///
/// # Arguments
///
/// * `reference` - Unfaulted ciphertext of the known plaintext.
/// * `faulted` - Ciphertexts of the same plaintext with one byte faulted
///   before the round 9 SubBytes step.
/// * `threads` - Worker threads for candidate generation.
///
/// # Returns
///
/// * `Ok(Recovery<AesBlock>)` - The round 10 key and the run statistics.
/// * `Err(DfaError::InsufficientFaults)` - A diagonal was never faulted.
///
/// Two usable faults per diagonal are normally enough.
pub fn recover_aes_key(
    reference: AesBlock,
    faulted: &[AesBlock],
    threads: usize,
) -> Result<Recovery<AesBlock>, DfaError> {
    recover(Arc::new(AesAnalysis::new(reference)), faulted, threads)
}
