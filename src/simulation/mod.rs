//! Fault campaign simulator producing faulted outputs for known keys.

pub mod faults;

use crate::block::{Block, CipherKind, DesBlock};
use crate::cipher::{des, Aes128};
use crate::error::DfaError;
use faults::FaultType;
use log::{debug, info};

/// Cipher instance and plaintext the faults are injected into.
pub enum Target {
    Aes { cipher: Aes128, plaintext: [u8; 16] },
    Des { key: u64, plaintext: DesBlock },
}

/// Encryption of one known plaintext under one key, with and without faults.
pub struct FaultCampaign {
    target: Target,
    reference: Block,
}

impl FaultCampaign {
    /// Sets up a campaign and computes the unfaulted reference output.
    ///
    /// # Arguments
    ///
    /// * `kind` - Cipher to simulate.
    /// * `key` - Master key, same width as a block of the cipher.
    /// * `plaintext` - Known plaintext.
    ///
    /// # Returns
    ///
    /// * `Ok(FaultCampaign)` - Campaign ready to run faults.
    /// * `Err(DfaError::MalformedInput)` - Key or plaintext belongs to the other cipher.
    pub fn new(kind: CipherKind, key: &Block, plaintext: &Block) -> Result<Self, DfaError> {
        let target = match kind {
            CipherKind::Aes => Target::Aes {
                cipher: Aes128::new(&key.as_aes()?),
                plaintext: plaintext.as_aes()?,
            },
            CipherKind::Des => Target::Des {
                key: key.as_des()?,
                plaintext: plaintext.as_des()?,
            },
        };
        let reference = match &target {
            Target::Aes { cipher, plaintext } => Block::Aes(cipher.encrypt_block(plaintext)),
            Target::Des { key, plaintext } => Block::Des(des::encrypt(*plaintext, *key)),
        };
        debug!("{} reference output {}", kind, reference);
        Ok(Self { target, reference })
    }

    pub fn reference(&self) -> Block {
        self.reference
    }

    /// Runs every fault once and returns the faulted outputs in input order.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<Block>)` - One output per fault.
    /// * `Err(DfaError::MalformedInput)` - A fault targets the other cipher.
    pub fn run(&self, faults: &[FaultType]) -> Result<Vec<Block>, DfaError> {
        let outputs = faults
            .iter()
            .map(|fault| {
                let output = fault.execute(&self.target)?;
                debug!("{:?} -> {}", fault, output);
                Ok(output)
            })
            .collect::<Result<Vec<_>, DfaError>>()?;
        let changed = outputs.iter().filter(|o| **o != self.reference).count();
        info!(
            "{} faults simulated, {} changed the output",
            outputs.len(),
            changed
        );
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::faults::get_fault_from;
    use super::*;

    #[test]
    fn aes_campaign() {
        let key = Block::parse(CipherKind::Aes, "bf05bd81f5497eef74dae9478eead746").unwrap();
        let plaintext = Block::parse(CipherKind::Aes, "000102030405060708090a0b0c0d0e0f").unwrap();
        let campaign = FaultCampaign::new(CipherKind::Aes, &key, &plaintext).unwrap();
        assert_eq!(
            campaign.reference().to_string(),
            "6D05C96E095097C093834E868428C118"
        );
        let outputs = campaign
            .run(&[get_fault_from("aesbyte_r9_0_01").unwrap()])
            .unwrap();
        assert_eq!(outputs.len(), 1);
        assert_ne!(outputs[0], campaign.reference());
    }

    #[test]
    fn des_campaign() {
        let key = Block::parse(CipherKind::Des, "1C8529CEA240AE4F").unwrap();
        let plaintext = Block::parse(CipherKind::Des, "0102030405060708").unwrap();
        let campaign = FaultCampaign::new(CipherKind::Des, &key, &plaintext).unwrap();
        assert_eq!(campaign.reference(), Block::Des(0xBB1D_3957_EF45_B0C5));
        let outputs = campaign
            .run(&[get_fault_from("desbf_r15_0").unwrap()])
            .unwrap();
        assert_eq!(outputs, vec![Block::Des(0xB91C_3953_EF44_B0D1)]);
    }

    #[test]
    fn fault_for_other_cipher_fails() {
        let key = Block::Des(0x1334_5779_9BBC_DFF1);
        let campaign = FaultCampaign::new(CipherKind::Des, &key, &Block::Des(0)).unwrap();
        assert!(matches!(
            campaign.run(&[get_fault_from("aesbyte_r9_0_01").unwrap()]),
            Err(DfaError::MalformedInput(_))
        ));
        assert!(FaultCampaign::new(CipherKind::Aes, &key, &Block::Des(0)).is_err());
    }
}
