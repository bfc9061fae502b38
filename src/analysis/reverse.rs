//! Reduction of a DES round 16 key to the 64 bit master key.

use crate::block::DesBlock;
use crate::cipher::des::{encrypt, permutation, PC1_INV, PC2_INV};
use crate::error::DfaError;
use log::{debug, info};

/// Master key bits (bit 0 = LSB) dropped by PC2 and therefore absent from
/// every round key.
pub const MISSING_KEY_BITS: [u32; 8] = [4, 6, 10, 13, 44, 45, 49, 50];

/// Scatters the 8 bits of `guess` onto the positions of [`MISSING_KEY_BITS`].
pub fn missing_bit_mask(guess: u8) -> u64 {
    MISSING_KEY_BITS
        .iter()
        .enumerate()
        .filter(|&(i, _)| guess & (1u8 << i) != 0)
        .fold(0u64, |mask, (_, &bit)| mask | (1u64 << bit))
}

/// Sets the low bit of every key byte so that the byte has odd parity.
pub fn apply_parity(key: u64) -> u64 {
    (0..8).fold(key, |key, byte| {
        let shift = 8 * byte;
        let upper = ((key >> shift) & 0xFE).count_ones();
        let parity = u64::from(upper % 2 == 0);
        (key & !(1u64 << shift)) | (parity << shift)
    })
}

/// Recovers the DES master key from its round 16 key and one known
/// plaintext/ciphertext pair.
///
/// The round 16 key is pushed back through PC2 and PC1 (the 16 schedule
/// rotations add up to a full turn), and the 8 bits PC2 throws away are
/// brute forced by trial encryption.
///
/// # Arguments
///
/// * `round_key` - 48 bit round 16 key.
/// * `plaintext` - Known plaintext.
/// * `reference` - Unfaulted ciphertext of `plaintext`.
///
/// # Returns
///
/// * `Ok(u64)` - The master key with odd parity bits.
/// * `Err(DfaError::KeyNotFound)` - No completion encrypts `plaintext` to `reference`.
pub fn recover_initial_des_key(
    round_key: u64,
    plaintext: DesBlock,
    reference: DesBlock,
) -> Result<u64, DfaError> {
    let cd = permutation(round_key & 0xFFFF_FFFF_FFFF, &PC2_INV, 48);
    let base = permutation(cd, &PC1_INV, 56);
    debug!("Partial master key {:016X}", base);

    for guess in 0..=255u8 {
        let candidate = base | missing_bit_mask(guess);
        if encrypt(plaintext, candidate) == reference {
            let key = apply_parity(candidate);
            info!("Master key {:016X} found with guess {:02X}", key, guess);
            return Ok(key);
        }
    }
    Err(DfaError::KeyNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::des::key_schedule;

    const PARITY_BITS: u64 = 0x0101_0101_0101_0101;

    #[test]
    fn missing_bits_are_the_holes_of_the_schedule() {
        let covered = permutation(permutation(0xFFFF_FFFF_FFFF, &PC2_INV, 48), &PC1_INV, 56);
        assert_eq!(covered.count_ones(), 48);
        assert_eq!(!covered & !PARITY_BITS, missing_bit_mask(0xFF));
    }

    #[test]
    fn parity_is_odd() {
        assert_eq!(apply_parity(0), PARITY_BITS);
        assert_eq!(apply_parity(0x1C85_29CE_A240_AE4F), 0x1C85_29CE_A240_AE4F);
        let key = apply_parity(0x1234_5678_9ABC_DEF0);
        assert!(key.to_be_bytes().iter().all(|b| b.count_ones() % 2 == 1));
    }

    #[test]
    fn recovers_master_key() {
        let key = 0x1C85_29CE_A240_AE4F;
        let plaintext = 0x0102_0304_0506_0708;
        let reference = encrypt(plaintext, key);
        let round_key = key_schedule(key)[15];
        assert_eq!(recover_initial_des_key(round_key, plaintext, reference).unwrap(), key);
    }

    #[test]
    fn wrong_round_key_is_not_found() {
        let key = 0x1334_5779_9BBC_DFF1;
        let plaintext = 0x0123_4567_89AB_CDEF;
        let round_key = key_schedule(key)[15] ^ 1;
        assert!(matches!(
            recover_initial_des_key(round_key, plaintext, 0x85E8_1354_0F0A_B405),
            Err(DfaError::KeyNotFound)
        ));
    }
}
