//! Loading of captured outputs: one hex block per line, `#` starts a comment.

use crate::block::{Block, CipherKind};
use crate::error::DfaError;
use std::io::{self, Read};
use std::path::Path;

const BOM: &str = "\u{FEFF}";

/// Reads a capture file, `-` reads standard input.
pub fn load_blocks(path: &Path, kind: CipherKind) -> Result<Vec<Block>, DfaError> {
    let content = if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)?
    };

    parse_blocks(&content, kind)
}

/// Parses capture text into blocks of `kind`.
///
/// # Returns
///
/// * `Ok(Vec<Block>)` - Blocks in file order.
/// * `Err(DfaError::MalformedInput)` - A line is not a block of the given width,
///   the error names the line number.
pub fn parse_blocks(content: &str, kind: CipherKind) -> Result<Vec<Block>, DfaError> {
    let content = content.strip_prefix(BOM).unwrap_or(content);
    let mut blocks = Vec::new();
    for (number, line) in content.lines().enumerate() {
        let text = match line.split_once('#') {
            Some((data, _comment)) => data,
            None => line,
        }
        .trim();
        if text.is_empty() {
            continue;
        }
        let block = Block::parse(kind, text).map_err(|e| match e {
            DfaError::MalformedInput(msg) => {
                DfaError::MalformedInput(format!("line {}: {}", number + 1, msg))
            }
            other => other,
        })?;
        blocks.push(block);
    }
    Ok(blocks)
}

/// Formats blocks the way `parse_blocks` reads them, with an optional
/// trailing comment per line.
pub fn format_blocks<'a>(blocks: impl IntoIterator<Item = (&'a Block, Option<String>)>) -> String {
    let mut out = String::new();
    for (block, comment) in blocks {
        out.push_str(&block.to_string());
        if let Some(comment) = comment {
            out.push_str("  # ");
            out.push_str(&comment);
        }
        out.push('\n');
    }
    out
}
