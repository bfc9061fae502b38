use crate::error::DfaError;
use colored::Colorize;
use std::fmt::Write;

/// Returns the indices of the bytes that differ between `reference` and `faulted`.
///
/// # Arguments
///
/// * `reference` - Output of the unfaulted run.
/// * `faulted` - Output of the faulted run.
///
/// # Returns
///
/// * `Ok(Vec<usize>)` - Ascending byte indices, empty if both are equal.
/// * `Err(DfaError::MalformedInput)` - The blocks have different lengths.
pub fn compare(reference: &[u8], faulted: &[u8]) -> Result<Vec<usize>, DfaError> {
    if reference.len() != faulted.len() {
        return Err(DfaError::MalformedInput(format!(
            "reference has {} bytes, faulted output has {}",
            reference.len(),
            faulted.len()
        )));
    }
    Ok(reference
        .iter()
        .zip(faulted)
        .enumerate()
        .filter(|(_, (r, f))| r != f)
        .map(|(index, _)| index)
        .collect())
}

/// Returns the indices (bit 0 = LSB) of the bits that differ between two DES blocks.
pub fn compare_bits(reference: u64, faulted: u64) -> Vec<usize> {
    let delta = reference ^ faulted;
    (0..64).filter(|&bit| delta & (1u64 << bit) != 0).collect()
}

/// Formats a reference/faulted pair with a marker row under the faulted bytes
/// and one line per differing byte.
pub fn dump_diff(reference: &[u8], faulted: &[u8], diffs: &[usize]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Reference : {}", hex::encode_upper(reference));

    let faulted_hex: String = faulted
        .iter()
        .enumerate()
        .map(|(index, byte)| {
            let text = format!("{:02X}", byte);
            if diffs.contains(&index) {
                text.red().bold().to_string()
            } else {
                text
            }
        })
        .collect();
    let _ = writeln!(out, "Faulted   : {}", faulted_hex);

    let markers: String = (0..reference.len())
        .map(|index| if diffs.contains(&index) { "--" } else { "  " })
        .collect();
    let _ = writeln!(out, "Difference: {}", markers.trim_end());

    for &index in diffs {
        if let (Some(r), Some(f)) = (reference.get(index), faulted.get(index)) {
            let _ = writeln!(out, "  Byte {:2} faulted: {:02X} != {:02X}", index, r, f);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_lists_differing_bytes() {
        let reference = [0u8, 1, 2, 3];
        let faulted = [0u8, 9, 2, 7];
        assert_eq!(compare(&reference, &faulted).unwrap(), vec![1, 3]);
        assert!(compare(&reference, &reference).unwrap().is_empty());
    }

    #[test]
    fn compare_rejects_length_mismatch() {
        assert!(matches!(
            compare(&[0u8; 16], &[0u8; 8]),
            Err(DfaError::MalformedInput(_))
        ));
    }

    #[test]
    fn compare_bits_lsb_first() {
        assert_eq!(compare_bits(0b1000_0101, 0b0000_0100), vec![0, 7]);
        assert_eq!(compare_bits(1 << 63, 0), vec![63]);
    }

    #[test]
    fn dump_lists_each_faulted_byte() {
        colored::control::set_override(false);
        let dump = dump_diff(&[0xAA, 0xBB], &[0xAA, 0xCC], &[1]);
        assert!(dump.contains("Reference : AABB"));
        assert!(dump.contains("Faulted   : AACC"));
        assert!(dump.contains("Difference:   --"));
        assert!(dump.contains("Byte  1 faulted: BB != CC"));
    }
}
