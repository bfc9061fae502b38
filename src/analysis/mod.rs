//! Fault diagnosis and last round key recovery.
//!
//! A batch of faulted outputs is classified against the reference output,
//! every usable fault is turned into per segment key candidates, and the
//! candidates are voted on across the whole batch:
//!
//! ```text
//! faulted outputs -> classify -> generate_candidates -> ConsensusAggregator -> assemble
//! ```
//!
//! The cipher specific steps live behind [`FaultAnalysis`], implemented by
//! [`AesAnalysis`] and [`DesAnalysis`].

pub mod aes;
pub mod consensus;
pub mod des;
pub mod reverse;

pub use aes::{recover_aes_key, AesAnalysis};
pub use consensus::{CandidateSet, ConsensusAggregator};
pub use des::{recover_des_key, DesAnalysis};
pub use reverse::recover_initial_des_key;

use crate::analysis_thread::AnalysisThread;
use crate::block::{Block, CipherKind};
use crate::error::DfaError;
use crossbeam_channel::unbounded;
use log::{debug, info};
use serde::Serialize;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

/// A faulted output together with the structural location it was classified into.
#[derive(Clone, Debug, PartialEq)]
pub struct Fault<B, L> {
    pub output: B,
    pub location: L,
}

/// Cipher specific half of the recovery pipeline.
pub trait FaultAnalysis: Send + Sync + Sized + 'static {
    type Block: Copy + Send + Sync + Debug + 'static;
    type Location: Clone + Send + Debug + 'static;
    type Candidate: Copy + Eq + Hash + Ord + Send + Debug + 'static;
    type RoundKey;

    fn name(&self) -> &'static str;

    /// Number of independently recovered key segments
    fn segments(&self) -> usize;

    /// Maps a faulted output onto a known single fault pattern.
    ///
    /// `Ok(None)` drops the sample; only malformed input is an error.
    fn classify(&self, faulted: &Self::Block) -> Result<Option<Self::Location>, DfaError>;

    /// Votes for every key segment value consistent with `fault`.
    ///
    /// Returns the number of propagation hypotheses that were discarded
    /// because some segment byte had no candidate.
    fn generate_candidates(
        &self,
        fault: &FaultOf<Self>,
        sets: &mut ConsensusAggregator<Self::Candidate>,
    ) -> usize;

    /// Places the winning segment values into the round key.
    fn assemble(&self, recovered: &[Self::Candidate]) -> Self::RoundKey;
}

pub type FaultOf<A> = Fault<<A as FaultAnalysis>::Block, <A as FaultAnalysis>::Location>;

/// Counters describing one recovery run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryStats {
    /// Faulted outputs handed in
    pub samples: usize,
    /// Samples matching a single fault pattern
    pub accepted: usize,
    /// Samples dropped by the classifier
    pub rejected: usize,
    /// Hypotheses without candidates, summed over all faults
    pub discarded_hypotheses: usize,
    /// Vote count of the winning value, per segment
    pub votes: Vec<u64>,
}

/// A recovered round key with the run statistics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recovery<K> {
    pub round_key: K,
    pub stats: RecoveryStats,
}

/// Runs the full recovery pipeline for one batch.
///
/// # Arguments
///
/// * `analysis` - Cipher specific analysis, holding the reference output.
/// * `faulted` - Faulted outputs of the same plaintext under the same key.
/// * `threads` - Worker threads for candidate generation, `0` or `1` runs inline.
///
/// # Returns
///
/// * `Ok(Recovery)` - The assembled round key and run statistics.
/// * `Err(DfaError)` - Malformed input, a worker failure, or a key segment
///   without any candidate.
///
/// # Note
///
/// The vote is statistical. With too few faults the result may be wrong
/// without any error being raised.
pub fn recover<A: FaultAnalysis>(
    analysis: Arc<A>,
    faulted: &[A::Block],
    threads: usize,
) -> Result<Recovery<A::RoundKey>, DfaError> {
    let mut stats = RecoveryStats {
        samples: faulted.len(),
        ..Default::default()
    };

    let mut faults = Vec::new();
    for output in faulted {
        match analysis.classify(output)? {
            Some(location) => faults.push(Fault {
                output: *output,
                location,
            }),
            None => stats.rejected += 1,
        }
    }
    stats.accepted = faults.len();
    info!(
        "{}: {} of {} faulted outputs match a single fault pattern",
        analysis.name(),
        stats.accepted,
        stats.samples
    );

    let mut aggregator = ConsensusAggregator::new(analysis.segments());
    if threads > 1 && faults.len() > 1 {
        let (result_sender, result_receiver) = unbounded();
        let mut analysis_thread = AnalysisThread::new(result_sender)?;
        analysis_thread.start_worker_threads(threads.min(faults.len()), Arc::clone(&analysis))?;

        let n_workload = faults.len();
        for fault in faults {
            analysis_thread.send_analysis_workload(fault)?;
        }
        analysis_thread.close_workload();
        for _ in 0..n_workload {
            let (sets, discarded) = result_receiver.recv().map_err(|e| {
                DfaError::Thread(format!("analysis worker stopped early: {}", e))
            })?;
            aggregator.merge(sets);
            stats.discarded_hypotheses += discarded;
        }
    } else {
        for fault in &faults {
            stats.discarded_hypotheses += analysis.generate_candidates(fault, &mut aggregator);
        }
    }

    let winners = aggregator.most_common()?;
    for (segment, (candidate, votes)) in winners.iter().enumerate() {
        debug!(
            "{} segment {}: {:?} with {} votes out of {} candidates",
            analysis.name(),
            segment,
            candidate,
            votes,
            aggregator.segment(segment).len()
        );
    }
    stats.votes = winners.iter().map(|(_, votes)| *votes).collect();
    let recovered: Vec<A::Candidate> = winners.into_iter().map(|(candidate, _)| candidate).collect();

    Ok(Recovery {
        round_key: analysis.assemble(&recovered),
        stats,
    })
}

/// Round key of either cipher, as handed to the command line layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundKey {
    /// Round 10 key of AES-128
    Aes([u8; 16]),
    /// 48 bit round 16 key of DES
    Des(u64),
}

impl std::fmt::Display for RoundKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoundKey::Aes(key) => write!(f, "{}", hex::encode_upper(key)),
            RoundKey::Des(key) => write!(f, "{}", crate::block::format_round_subkey(*key)),
        }
    }
}

/// Cipher agnostic entry point working on parsed blocks.
///
/// # Returns
///
/// * `Ok(Recovery<RoundKey>)` - Round key of the cipher selected by `kind`.
/// * `Err(DfaError::MalformedInput)` - A block belongs to the other cipher.
pub fn recover_round_key(
    kind: CipherKind,
    reference: &Block,
    faulted: &[Block],
    threads: usize,
) -> Result<Recovery<RoundKey>, DfaError> {
    match kind {
        CipherKind::Aes => {
            let outputs = faulted
                .iter()
                .map(Block::as_aes)
                .collect::<Result<Vec<_>, _>>()?;
            let recovery = recover_aes_key(reference.as_aes()?, &outputs, threads)?;
            Ok(Recovery {
                round_key: RoundKey::Aes(recovery.round_key),
                stats: recovery.stats,
            })
        }
        CipherKind::Des => {
            let outputs = faulted
                .iter()
                .map(Block::as_des)
                .collect::<Result<Vec<_>, _>>()?;
            let recovery = recover_des_key(reference.as_des()?, &outputs, threads)?;
            Ok(Recovery {
                round_key: RoundKey::Des(recovery.round_key),
                stats: recovery.stats,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Votes for the faulted value itself, a zero output kills the worker.
    struct EchoAnalysis;

    impl FaultAnalysis for EchoAnalysis {
        type Block = u8;
        type Location = u8;
        type Candidate = u8;
        type RoundKey = Vec<u8>;

        fn name(&self) -> &'static str {
            "echo"
        }

        fn segments(&self) -> usize {
            1
        }

        fn classify(&self, faulted: &u8) -> Result<Option<u8>, DfaError> {
            Ok(Some(*faulted))
        }

        fn generate_candidates(&self, fault: &FaultOf<Self>, sets: &mut ConsensusAggregator<u8>) -> usize {
            if fault.location == 0 {
                panic!("worker failure");
            }
            sets.add(0, fault.location);
            0
        }

        fn assemble(&self, recovered: &[u8]) -> Vec<u8> {
            recovered.to_vec()
        }
    }

    #[test]
    fn pool_and_inline_agree() {
        let faulted = [1, 2, 2, 3];
        let inline = recover(Arc::new(EchoAnalysis), &faulted, 1).unwrap();
        let pooled = recover(Arc::new(EchoAnalysis), &faulted, 2).unwrap();
        assert_eq!(inline.round_key, vec![2]);
        assert_eq!(inline, pooled);
    }

    #[test]
    fn dead_worker_is_a_thread_error() {
        let result = recover(Arc::new(EchoAnalysis), &[1, 0, 2], 2);
        assert!(matches!(result, Err(DfaError::Thread(_))), "{:?}", result);
    }

    #[test]
    fn mixed_ciphers_are_malformed() {
        let reference = Block::Aes([0u8; 16]);
        let faulted = [Block::Des(0)];
        assert!(matches!(
            recover_round_key(CipherKind::Aes, &reference, &faulted, 1),
            Err(DfaError::MalformedInput(_))
        ));
        assert!(matches!(
            recover_round_key(CipherKind::Des, &reference, &[], 1),
            Err(DfaError::MalformedInput(_))
        ));
    }

    #[test]
    fn round_key_text() {
        assert_eq!(RoundKey::Des(0x2401_17D2_6D2B).to_string(), "240117D26D2B");
        assert_eq!(
            RoundKey::Aes([0xAB; 16]).to_string(),
            "ABABABABABABABABABABABABABABABAB"
        );
    }
}
