use crate::block::AesBlock;

/// Number of rounds of AES-128
pub const ROUNDS: usize = 10;

pub const SBOX: [u8; 256] = [
    0x63, 0x7C, 0x77, 0x7B, 0xF2, 0x6B, 0x6F, 0xC5, 0x30, 0x01, 0x67, 0x2B, 0xFE, 0xD7, 0xAB, 0x76,
    0xCA, 0x82, 0xC9, 0x7D, 0xFA, 0x59, 0x47, 0xF0, 0xAD, 0xD4, 0xA2, 0xAF, 0x9C, 0xA4, 0x72, 0xC0,
    0xB7, 0xFD, 0x93, 0x26, 0x36, 0x3F, 0xF7, 0xCC, 0x34, 0xA5, 0xE5, 0xF1, 0x71, 0xD8, 0x31, 0x15,
    0x04, 0xC7, 0x23, 0xC3, 0x18, 0x96, 0x05, 0x9A, 0x07, 0x12, 0x80, 0xE2, 0xEB, 0x27, 0xB2, 0x75,
    0x09, 0x83, 0x2C, 0x1A, 0x1B, 0x6E, 0x5A, 0xA0, 0x52, 0x3B, 0xD6, 0xB3, 0x29, 0xE3, 0x2F, 0x84,
    0x53, 0xD1, 0x00, 0xED, 0x20, 0xFC, 0xB1, 0x5B, 0x6A, 0xCB, 0xBE, 0x39, 0x4A, 0x4C, 0x58, 0xCF,
    0xD0, 0xEF, 0xAA, 0xFB, 0x43, 0x4D, 0x33, 0x85, 0x45, 0xF9, 0x02, 0x7F, 0x50, 0x3C, 0x9F, 0xA8,
    0x51, 0xA3, 0x40, 0x8F, 0x92, 0x9D, 0x38, 0xF5, 0xBC, 0xB6, 0xDA, 0x21, 0x10, 0xFF, 0xF3, 0xD2,
    0xCD, 0x0C, 0x13, 0xEC, 0x5F, 0x97, 0x44, 0x17, 0xC4, 0xA7, 0x7E, 0x3D, 0x64, 0x5D, 0x19, 0x73,
    0x60, 0x81, 0x4F, 0xDC, 0x22, 0x2A, 0x90, 0x88, 0x46, 0xEE, 0xB8, 0x14, 0xDE, 0x5E, 0x0B, 0xDB,
    0xE0, 0x32, 0x3A, 0x0A, 0x49, 0x06, 0x24, 0x5C, 0xC2, 0xD3, 0xAC, 0x62, 0x91, 0x95, 0xE4, 0x79,
    0xE7, 0xC8, 0x37, 0x6D, 0x8D, 0xD5, 0x4E, 0xA9, 0x6C, 0x56, 0xF4, 0xEA, 0x65, 0x7A, 0xAE, 0x08,
    0xBA, 0x78, 0x25, 0x2E, 0x1C, 0xA6, 0xB4, 0xC6, 0xE8, 0xDD, 0x74, 0x1F, 0x4B, 0xBD, 0x8B, 0x8A,
    0x70, 0x3E, 0xB5, 0x66, 0x48, 0x03, 0xF6, 0x0E, 0x61, 0x35, 0x57, 0xB9, 0x86, 0xC1, 0x1D, 0x9E,
    0xE1, 0xF8, 0x98, 0x11, 0x69, 0xD9, 0x8E, 0x94, 0x9B, 0x1E, 0x87, 0xE9, 0xCE, 0x55, 0x28, 0xDF,
    0x8C, 0xA1, 0x89, 0x0D, 0xBF, 0xE6, 0x42, 0x68, 0x41, 0x99, 0x2D, 0x0F, 0xB0, 0x54, 0xBB, 0x16,
];

pub const INV_SBOX: [u8; 256] = invert_sbox(&SBOX);

const RCON: [u8; ROUNDS] = [0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x80, 0x1B, 0x36];

const fn invert_sbox(sbox: &[u8; 256]) -> [u8; 256] {
    let mut inverse = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        inverse[sbox[i] as usize] = i as u8;
        i += 1;
    }
    inverse
}

fn xtime(a: u8) -> u8 {
    (a << 1) ^ if a & 0x80 != 0 { 0x1B } else { 0x00 }
}

/// MixColumns on a single state column (rows 0..3).
pub fn mix_single_column(column: &mut [u8; 4]) {
    let all = column[0] ^ column[1] ^ column[2] ^ column[3];
    let first = column[0];
    column[0] ^= all ^ xtime(column[0] ^ column[1]);
    column[1] ^= all ^ xtime(column[1] ^ column[2]);
    column[2] ^= all ^ xtime(column[2] ^ column[3]);
    column[3] ^= all ^ xtime(column[3] ^ first);
}

fn sub_bytes(state: &mut AesBlock) {
    state.iter_mut().for_each(|b| *b = SBOX[*b as usize]);
}

// State byte `4 * column + row`; row r rotates left by r columns.
fn shift_rows(state: &mut AesBlock) {
    let old = *state;
    for column in 0..4 {
        for row in 0..4 {
            state[4 * column + row] = old[4 * ((column + row) % 4) + row];
        }
    }
}

fn mix_columns(state: &mut AesBlock) {
    for chunk in state.chunks_exact_mut(4) {
        let mut column = [chunk[0], chunk[1], chunk[2], chunk[3]];
        mix_single_column(&mut column);
        chunk.copy_from_slice(&column);
    }
}

fn add_round_key(state: &mut AesBlock, key: &AesBlock) {
    state.iter_mut().zip(key).for_each(|(b, k)| *b ^= k);
}

/// AES-128 with an expanded key schedule
#[derive(Clone, Debug)]
pub struct Aes128 {
    round_keys: [AesBlock; ROUNDS + 1],
}

impl Aes128 {
    /// Expands `key` into the 11 round keys.
    pub fn new(key: &AesBlock) -> Self {
        let mut words = [[0u8; 4]; 4 * (ROUNDS + 1)];
        for (i, word) in words.iter_mut().take(4).enumerate() {
            word.copy_from_slice(&key[4 * i..4 * i + 4]);
        }
        for i in 4..words.len() {
            let mut temp = words[i - 1];
            if i % 4 == 0 {
                temp.rotate_left(1);
                temp.iter_mut().for_each(|b| *b = SBOX[*b as usize]);
                temp[0] ^= RCON[i / 4 - 1];
            }
            for j in 0..4 {
                words[i][j] = words[i - 4][j] ^ temp[j];
            }
        }

        let mut round_keys = [[0u8; 16]; ROUNDS + 1];
        for (round, round_key) in round_keys.iter_mut().enumerate() {
            for j in 0..4 {
                round_key[4 * j..4 * j + 4].copy_from_slice(&words[4 * round + j]);
            }
        }
        Self { round_keys }
    }

    pub fn round_keys(&self) -> &[AesBlock] {
        &self.round_keys
    }

    pub fn last_round_key(&self) -> AesBlock {
        self.round_keys[ROUNDS]
    }

    pub fn encrypt_block(&self, block: &AesBlock) -> AesBlock {
        self.encrypt(block, None)
    }

    /// Encrypts `block` and XORs `value` into state byte `index` at the start
    /// of `round` (before its SubBytes step).
    ///
    /// Rounds outside `1..=10` or indices above 15 leave the encryption
    /// untouched.
    pub fn encrypt_block_with_fault(
        &self,
        block: &AesBlock,
        round: usize,
        index: usize,
        value: u8,
    ) -> AesBlock {
        self.encrypt(block, Some((round, index, value)))
    }

    fn encrypt(&self, block: &AesBlock, fault: Option<(usize, usize, u8)>) -> AesBlock {
        let mut state = *block;
        add_round_key(&mut state, &self.round_keys[0]);
        for round in 1..=ROUNDS {
            if let Some((fault_round, index, value)) = fault {
                if fault_round == round && index < 16 {
                    state[index] ^= value;
                }
            }
            sub_bytes(&mut state);
            shift_rows(&mut state);
            if round != ROUNDS {
                mix_columns(&mut state);
            }
            add_round_key(&mut state, &self.round_keys[round]);
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(text: &str) -> AesBlock {
        let mut out = [0u8; 16];
        hex::decode_to_slice(text, &mut out).unwrap();
        out
    }

    #[test]
    fn fips_197_vector() {
        let cipher = Aes128::new(&block("000102030405060708090a0b0c0d0e0f"));
        let output = cipher.encrypt_block(&block("00112233445566778899aabbccddeeff"));
        assert_eq!(output, block("69c4e0d86a7b0430d8cdb78070b4c55a"));
        assert_eq!(
            cipher.last_round_key(),
            block("13111d7fe3944a17f307a78b4d2b30c5")
        );
    }

    #[test]
    fn inverse_sbox_inverts() {
        for x in 0..=255u8 {
            assert_eq!(INV_SBOX[SBOX[x as usize] as usize], x);
        }
    }

    #[test]
    fn mix_single_column_vector() {
        let mut column = [0xDB, 0x13, 0x53, 0x45];
        mix_single_column(&mut column);
        assert_eq!(column, [0x8E, 0x4D, 0xA1, 0xBC]);
    }

    #[test]
    fn round_nine_fault_touches_one_diagonal() {
        let cipher = Aes128::new(&block("bf05bd81f5497eef74dae9478eead746"));
        let plaintext = block("000102030405060708090a0b0c0d0e0f");
        let reference = cipher.encrypt_block(&plaintext);
        let faulted = cipher.encrypt_block_with_fault(&plaintext, 9, 0, 0x01);
        let diffs: Vec<usize> = (0..16).filter(|&i| reference[i] != faulted[i]).collect();
        assert_eq!(diffs, vec![0, 7, 10, 13]);
    }

    #[test]
    fn fault_outside_rounds_is_ignored() {
        let cipher = Aes128::new(&[0u8; 16]);
        let plaintext = [0x42u8; 16];
        assert_eq!(
            cipher.encrypt_block_with_fault(&plaintext, 11, 0, 0xFF),
            cipher.encrypt_block(&plaintext)
        );
    }
}
