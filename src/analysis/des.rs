//! DES round 16 key recovery from single bit faults in the right half after
//! round 15.

use super::{recover, ConsensusAggregator, FaultAnalysis, FaultOf, Recovery};
use crate::block::{format_round_subkey, DesBlock};
use crate::cipher::des::{expansion, permutation, sbox_block, sbox_lookup, sbox_nibble, IP, P_INV};
use crate::diff::compare_bits;
use crate::error::DfaError;
use log::{debug, trace};
use std::sync::Arc;

/// Number of S-boxes, one 6 bit key chunk each
pub const SBOX_COUNT: usize = 8;

/// Halves of a DES output before the final permutation.
///
/// `high` is R16, `low` is L16 which equals R15.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PreOutput {
    high: u32,
    low: u32,
}

impl PreOutput {
    fn of(output: DesBlock) -> Self {
        let permuted = permutation(output, &IP, 64);
        Self {
            high: (permuted >> 32) as u32,
            low: permuted as u32,
        }
    }
}

/// S-boxes whose round 16 input is touched by the difference `delta` of two outputs.
pub fn active_sboxes(delta: DesBlock) -> Vec<usize> {
    let pre = PreOutput::of(delta);
    let expanded = expansion(pre.low);
    (0..SBOX_COUNT)
        .filter(|&index| sbox_block(expanded, index) != 0)
        .collect()
}

/// Recovery of the round 16 key from round 15 bit faults.
pub struct DesAnalysis {
    reference: DesBlock,
    reference_pre: PreOutput,
    reference_expanded: u64,
}

impl DesAnalysis {
    pub fn new(reference: DesBlock) -> Self {
        let reference_pre = PreOutput::of(reference);
        Self {
            reference,
            reference_pre,
            reference_expanded: expansion(reference_pre.low),
        }
    }
}

impl FaultAnalysis for DesAnalysis {
    type Block = DesBlock;
    type Location = Vec<usize>;
    type Candidate = u8;
    type RoundKey = u64;

    fn name(&self) -> &'static str {
        "DES"
    }

    fn segments(&self) -> usize {
        SBOX_COUNT
    }

    fn classify(&self, faulted: &DesBlock) -> Result<Option<Vec<usize>>, DfaError> {
        let delta = self.reference ^ faulted;
        let active = active_sboxes(delta);
        if active.is_empty() {
            debug!(
                "Dropping faulted output {:016X}: bits {:?} reach no round 16 S-box",
                faulted,
                compare_bits(self.reference, *faulted)
            );
            return Ok(None);
        }
        debug!("Fault in S-boxes {:?}", active);
        Ok(Some(active))
    }

    fn generate_candidates(
        &self,
        fault: &FaultOf<Self>,
        sets: &mut ConsensusAggregator<u8>,
    ) -> usize {
        let faulted_pre = PreOutput::of(fault.output);
        let faulted_expanded = expansion(faulted_pre.low);
        // S-box output difference of round 16
        let output_delta =
            permutation((self.reference_pre.high ^ faulted_pre.high) as u64, &P_INV, 32) as u32;

        let mut discarded = 0;
        for &index in &fault.location {
            let expected = sbox_nibble(output_delta, index);
            let reference_in = sbox_block(self.reference_expanded, index);
            let faulted_in = sbox_block(faulted_expanded, index);
            let mut found = false;
            for key in 0..64u8 {
                let delta =
                    sbox_lookup(index, reference_in ^ key) ^ sbox_lookup(index, faulted_in ^ key);
                if delta == expected {
                    sets.add(index, key);
                    found = true;
                }
            }
            if !found {
                trace!(
                    "S-box {}: no key chunk explains output delta {:X}",
                    index,
                    expected
                );
                discarded += 1;
            }
        }
        discarded
    }

    fn assemble(&self, recovered: &[u8]) -> u64 {
        recovered
            .iter()
            .fold(0u64, |key, &chunk| (key << 6) | (chunk & 0x3F) as u64)
    }
}

/// Recovers the 48 bit DES round 16 key.
///
/// # Arguments
///
/// * `reference` - Unfaulted ciphertext of the known plaintext.
/// * `faulted` - Ciphertexts of the same plaintext with one bit of R flipped
///   after round 15.
/// * `threads` - Worker threads for candidate generation.
///
/// # Returns
///
/// * `Ok(Recovery<u64>)` - The round 16 key in the low 48 bits.
/// * `Err(DfaError::InsufficientFaults)` - An S-box was never active.
pub fn recover_des_key(
    reference: DesBlock,
    faulted: &[DesBlock],
    threads: usize,
) -> Result<Recovery<u64>, DfaError> {
    let recovery = recover(Arc::new(DesAnalysis::new(reference)), faulted, threads)?;
    debug!("DES round 16 key {}", format_round_subkey(recovery.round_key));
    Ok(recovery)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::des::{encrypt, encrypt_with_fault, key_schedule};

    const KEY: u64 = 0x1C85_29CE_A240_AE4F;
    const PLAINTEXT: u64 = 0x0102_0304_0506_0708;

    fn bit_flips() -> Vec<DesBlock> {
        (0..32)
            .map(|bit| encrypt_with_fault(PLAINTEXT, KEY, 15, 1 << bit))
            .collect()
    }

    #[test]
    fn single_bit_activates_one_or_two_sboxes() {
        let reference = encrypt(PLAINTEXT, KEY);
        for faulted in bit_flips() {
            let active = active_sboxes(reference ^ faulted);
            assert!((1..=2).contains(&active.len()), "{:?}", active);
        }
    }

    #[test]
    fn equal_outputs_are_rejected() {
        let reference = encrypt(PLAINTEXT, KEY);
        let analysis = DesAnalysis::new(reference);
        assert_eq!(analysis.classify(&reference).unwrap(), None);
    }

    #[test]
    fn recovers_round_sixteen_key() {
        let reference = encrypt(PLAINTEXT, KEY);
        let recovery = recover_des_key(reference, &bit_flips(), 1).unwrap();
        assert_eq!(recovery.round_key, 0x2401_17D2_6D2B);
        assert_eq!(recovery.round_key, key_schedule(KEY)[15]);
        assert_eq!(recovery.stats.accepted, 32);
        assert_eq!(recovery.stats.votes, vec![6; 8]);
        assert_eq!(recovery.stats.discarded_hypotheses, 0);
    }

    #[test]
    fn threads_do_not_change_the_result() {
        let reference = encrypt(PLAINTEXT, KEY);
        let faulted = bit_flips();
        assert_eq!(
            recover_des_key(reference, &faulted, 1).unwrap(),
            recover_des_key(reference, &faulted, 3).unwrap()
        );
    }

    #[test]
    fn assembles_sbox_zero_first() {
        let analysis = DesAnalysis::new(0);
        assert_eq!(analysis.assemble(&[0x3F, 0, 0, 0, 0, 0, 0, 1]), 0xFC00_0000_0001);
    }
}
