//! DES with MSB-first bit numbering.
//!
//! Every permutation table lists, for output bit 1.., the 1-based input bit
//! counted from the most significant end. A table entry of 0 produces a zero
//! bit; the inverse tables use it for positions the forward table drops.

use crate::block::DesBlock;

pub const ROUNDS: usize = 16;

pub const IP: [u8; 64] = [
    58, 50, 42, 34, 26, 18, 10, 2, 60, 52, 44, 36, 28, 20, 12, 4, //
    62, 54, 46, 38, 30, 22, 14, 6, 64, 56, 48, 40, 32, 24, 16, 8, //
    57, 49, 41, 33, 25, 17, 9, 1, 59, 51, 43, 35, 27, 19, 11, 3, //
    61, 53, 45, 37, 29, 21, 13, 5, 63, 55, 47, 39, 31, 23, 15, 7,
];

/// Final permutation
pub const FP: [u8; 64] = invert_table(&IP);

/// Expansion of a 32 bit half into 8 blocks of 6 bits
pub const E: [u8; 48] = [
    32, 1, 2, 3, 4, 5, 4, 5, 6, 7, 8, 9, //
    8, 9, 10, 11, 12, 13, 12, 13, 14, 15, 16, 17, //
    16, 17, 18, 19, 20, 21, 20, 21, 22, 23, 24, 25, //
    24, 25, 26, 27, 28, 29, 28, 29, 30, 31, 32, 1,
];

pub const P: [u8; 32] = [
    16, 7, 20, 21, 29, 12, 28, 17, 1, 15, 23, 26, 5, 18, 31, 10, //
    2, 8, 24, 14, 32, 27, 3, 9, 19, 13, 30, 6, 22, 11, 4, 25,
];

pub const P_INV: [u8; 32] = invert_table(&P);

/// Permuted choice 1: 64 bit key to 56 bits, parity bits dropped
pub const PC1: [u8; 56] = [
    57, 49, 41, 33, 25, 17, 9, 1, 58, 50, 42, 34, 26, 18, //
    10, 2, 59, 51, 43, 35, 27, 19, 11, 3, 60, 52, 44, 36, //
    63, 55, 47, 39, 31, 23, 15, 7, 62, 54, 46, 38, 30, 22, //
    14, 6, 61, 53, 45, 37, 29, 21, 13, 5, 28, 20, 12, 4,
];

pub const PC1_INV: [u8; 64] = invert_table(&PC1);

/// Permuted choice 2: 56 bit C/D register to a 48 bit round key
pub const PC2: [u8; 48] = [
    14, 17, 11, 24, 1, 5, 3, 28, 15, 6, 21, 10, //
    23, 19, 12, 4, 26, 8, 16, 7, 27, 20, 13, 2, //
    41, 52, 31, 37, 47, 55, 30, 40, 51, 45, 33, 48, //
    44, 49, 39, 56, 34, 53, 46, 42, 50, 36, 29, 32,
];

pub const PC2_INV: [u8; 56] = invert_table(&PC2);

const SHIFTS: [u32; ROUNDS] = [1, 1, 2, 2, 2, 2, 2, 2, 1, 2, 2, 2, 2, 2, 2, 1];

/// S-boxes, 4 rows of 16 columns each
pub const SBOXES: [[u8; 64]; 8] = [
    [
        14, 4, 13, 1, 2, 15, 11, 8, 3, 10, 6, 12, 5, 9, 0, 7, //
        0, 15, 7, 4, 14, 2, 13, 1, 10, 6, 12, 11, 9, 5, 3, 8, //
        4, 1, 14, 8, 13, 6, 2, 11, 15, 12, 9, 7, 3, 10, 5, 0, //
        15, 12, 8, 2, 4, 9, 1, 7, 5, 11, 3, 14, 10, 0, 6, 13,
    ],
    [
        15, 1, 8, 14, 6, 11, 3, 4, 9, 7, 2, 13, 12, 0, 5, 10, //
        3, 13, 4, 7, 15, 2, 8, 14, 12, 0, 1, 10, 6, 9, 11, 5, //
        0, 14, 7, 11, 10, 4, 13, 1, 5, 8, 12, 6, 9, 3, 2, 15, //
        13, 8, 10, 1, 3, 15, 4, 2, 11, 6, 7, 12, 0, 5, 14, 9,
    ],
    [
        10, 0, 9, 14, 6, 3, 15, 5, 1, 13, 12, 7, 11, 4, 2, 8, //
        13, 7, 0, 9, 3, 4, 6, 10, 2, 8, 5, 14, 12, 11, 15, 1, //
        13, 6, 4, 9, 8, 15, 3, 0, 11, 1, 2, 12, 5, 10, 14, 7, //
        1, 10, 13, 0, 6, 9, 8, 7, 4, 15, 14, 3, 11, 5, 2, 12,
    ],
    [
        7, 13, 14, 3, 0, 6, 9, 10, 1, 2, 8, 5, 11, 12, 4, 15, //
        13, 8, 11, 5, 6, 15, 0, 3, 4, 7, 2, 12, 1, 10, 14, 9, //
        10, 6, 9, 0, 12, 11, 7, 13, 15, 1, 3, 14, 5, 2, 8, 4, //
        3, 15, 0, 6, 10, 1, 13, 8, 9, 4, 5, 11, 12, 7, 2, 14,
    ],
    [
        2, 12, 4, 1, 7, 10, 11, 6, 8, 5, 3, 15, 13, 0, 14, 9, //
        14, 11, 2, 12, 4, 7, 13, 1, 5, 0, 15, 10, 3, 9, 8, 6, //
        4, 2, 1, 11, 10, 13, 7, 8, 15, 9, 12, 5, 6, 3, 0, 14, //
        11, 8, 12, 7, 1, 14, 2, 13, 6, 15, 0, 9, 10, 4, 5, 3,
    ],
    [
        12, 1, 10, 15, 9, 2, 6, 8, 0, 13, 3, 4, 14, 7, 5, 11, //
        10, 15, 4, 2, 7, 12, 9, 5, 6, 1, 13, 14, 0, 11, 3, 8, //
        9, 14, 15, 5, 2, 8, 12, 3, 7, 0, 4, 10, 1, 13, 11, 6, //
        4, 3, 2, 12, 9, 5, 15, 10, 11, 14, 1, 7, 6, 0, 8, 13,
    ],
    [
        4, 11, 2, 14, 15, 0, 8, 13, 3, 12, 9, 7, 5, 10, 6, 1, //
        13, 0, 11, 7, 4, 9, 1, 10, 14, 3, 5, 12, 2, 15, 8, 6, //
        1, 4, 11, 13, 12, 3, 7, 14, 10, 15, 6, 8, 0, 5, 9, 2, //
        6, 11, 13, 8, 1, 4, 10, 7, 9, 5, 0, 15, 14, 2, 3, 12,
    ],
    [
        13, 2, 8, 4, 6, 15, 11, 1, 10, 9, 3, 14, 5, 0, 12, 7, //
        1, 15, 13, 8, 10, 3, 7, 4, 12, 5, 6, 11, 0, 14, 9, 2, //
        7, 11, 4, 1, 9, 12, 14, 2, 0, 6, 10, 13, 15, 3, 5, 8, //
        2, 1, 14, 7, 4, 10, 8, 13, 15, 12, 9, 0, 3, 5, 6, 11,
    ],
];

/// Builds the inverse of a permutation table at compile time.
///
/// Output positions the forward table never selects stay 0 (zero bit).
const fn invert_table<const IN: usize, const OUT: usize>(table: &[u8; IN]) -> [u8; OUT] {
    let mut inverse = [0u8; OUT];
    let mut i = 0;
    while i < IN {
        inverse[(table[i] - 1) as usize] = (i + 1) as u8;
        i += 1;
    }
    inverse
}

/// Applies `table` to the `width` bit value `input`.
///
/// The result is `table.len()` bits wide.
pub fn permutation(input: u64, table: &[u8], width: u32) -> u64 {
    table.iter().fold(0u64, |out, &position| {
        let bit = match position {
            0 => 0,
            p => (input >> (width - p as u32)) & 1,
        };
        (out << 1) | bit
    })
}

/// Bits `msb..=lsb` of `value` (LSB-0 numbering).
pub fn extract(value: u64, msb: u32, lsb: u32) -> u64 {
    (value >> lsb) & ((1u64 << (msb - lsb + 1)) - 1)
}

pub fn expansion(half: u32) -> u64 {
    permutation(half as u64, &E, 32)
}

/// The 6 bit input block of S-box `index` inside a 48 bit value.
pub fn sbox_block(value: u64, index: usize) -> u8 {
    let msb = 48 - 6 * index as u32;
    extract(value, msb - 1, msb - 6) as u8
}

/// The 4 bit output nibble of S-box `index` inside a 32 bit value.
pub fn sbox_nibble(value: u32, index: usize) -> u8 {
    let msb = 32 - 4 * index as u32;
    extract(value as u64, msb - 1, msb - 4) as u8
}

/// S-box lookup: outer bits (5 and 0) select the row, bits 4..1 the column.
pub fn sbox_lookup(index: usize, input: u8) -> u8 {
    let row = ((input >> 4) & 0b10) | (input & 1);
    let column = (input >> 1) & 0x0F;
    SBOXES[index][(row * 16 + column) as usize]
}

fn feistel(half: u32, round_key: u64) -> u32 {
    let mixed = expansion(half) ^ round_key;
    let substituted = (0..8).fold(0u32, |out, index| {
        (out << 4) | sbox_lookup(index, sbox_block(mixed, index)) as u32
    });
    permutation(substituted as u64, &P, 32) as u32
}

/// The 16 round keys of `key` (48 bits each, round 1 first).
///
/// Parity bits of `key` are ignored.
pub fn key_schedule(key: u64) -> [u64; ROUNDS] {
    let cd = permutation(key, &PC1, 64);
    let mut c = ((cd >> 28) & 0x0FFF_FFFF) as u32;
    let mut d = (cd & 0x0FFF_FFFF) as u32;
    let mut round_keys = [0u64; ROUNDS];
    for (round_key, shift) in round_keys.iter_mut().zip(SHIFTS) {
        c = rotate28(c, shift);
        d = rotate28(d, shift);
        *round_key = permutation(((c as u64) << 28) | d as u64, &PC2, 56);
    }
    round_keys
}

fn rotate28(value: u32, shift: u32) -> u32 {
    ((value << shift) | (value >> (28 - shift))) & 0x0FFF_FFFF
}

pub fn encrypt(block: DesBlock, key: u64) -> DesBlock {
    crypt(block, &key_schedule(key), None)
}

/// Encrypts `block` and XORs `mask` into the right half once `round` rounds
/// are done, so the fault enters round `round + 1`.
///
/// Rounds outside `1..=16` leave the encryption untouched.
pub fn encrypt_with_fault(block: DesBlock, key: u64, round: usize, mask: u32) -> DesBlock {
    crypt(block, &key_schedule(key), Some((round, mask)))
}

fn crypt(block: DesBlock, round_keys: &[u64; ROUNDS], fault: Option<(usize, u32)>) -> DesBlock {
    let permuted = permutation(block, &IP, 64);
    let mut left = (permuted >> 32) as u32;
    let mut right = permuted as u32;
    for (round, round_key) in round_keys.iter().enumerate() {
        let next = left ^ feistel(right, *round_key);
        left = right;
        right = next;
        if let Some((fault_round, mask)) = fault {
            if fault_round == round + 1 {
                right ^= mask;
            }
        }
    }
    // The pre-output swaps the halves
    permutation(((right as u64) << 32) | left as u64, &FP, 64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_vector() {
        assert_eq!(
            encrypt(0x0123_4567_89AB_CDEF, 0x1334_5779_9BBC_DFF1),
            0x85E8_1354_0F0A_B405
        );
    }

    #[test]
    fn first_round_key() {
        assert_eq!(key_schedule(0x1334_5779_9BBC_DFF1)[0], 0x1B02_EFFC_7072);
    }

    #[test]
    fn inverse_tables_undo_forward_tables() {
        let value = 0x0123_4567_89AB_CDEF;
        assert_eq!(permutation(permutation(value, &IP, 64), &FP, 64), value);
        let half = 0xDEAD_BEEF;
        assert_eq!(permutation(permutation(half, &P, 32), &P_INV, 32), half);
    }

    #[test]
    fn pc2_inverse_leaves_eight_holes() {
        assert_eq!(PC2_INV.iter().filter(|&&p| p == 0).count(), 8);
        assert_eq!(PC1_INV.iter().filter(|&&p| p == 0).count(), 8);
    }

    #[test]
    fn sbox_row_and_column() {
        // 011011: row 01, column 1101
        assert_eq!(sbox_lookup(0, 0b011011), 5);
    }

    #[test]
    fn round_fifteen_fault() {
        let key = 0x1C85_29CE_A240_AE4F;
        let plaintext = 0x0102_0304_0506_0708;
        assert_eq!(encrypt(plaintext, key), 0xBB1D_3957_EF45_B0C5);
        assert_eq!(encrypt_with_fault(plaintext, key, 15, 1), 0xB91C_3953_EF44_B0D1);
        assert_eq!(encrypt_with_fault(plaintext, key, 0, 1), encrypt(plaintext, key));
    }
}
