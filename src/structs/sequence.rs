use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::Context;
use thiserror::Error;

/// The canonical amino acid alphabet, in the standard profile column order.
pub const AMINO_ALPHABET: [u8; 20] = *b"ACDEFGHIKLMNPQRSTVWY";
pub const AMINO_ALPHABET_SIZE: usize = 20;

/// Digital codes for the ambiguity symbols, appended after the 20 canonicals.
pub const AMINO_X: u8 = 20;
pub const AMINO_B: u8 = 21;
pub const AMINO_Z: u8 = 22;
/// Canonical residues plus the ambiguity codes.
pub const MAX_ALPHABET_SIZE: usize = 23;

/// Placeholder code stored at the unused index 0 of a digital sequence.
pub const AMINO_PAD: u8 = AMINO_X;

#[derive(Error, Debug)]
#[error("byte '{}' (0x{byte:02x}) does not map to an amino acid", *byte as char)]
pub struct UnknownResidueError {
    pub byte: u8,
}

/// Map one sequence byte to its digital code.
pub fn encode_amino(byte: u8) -> Result<u8, UnknownResidueError> {
    let upper = byte.to_ascii_uppercase();
    match upper {
        b'A' => Ok(0),
        b'C' => Ok(1),
        b'D' => Ok(2),
        b'E' => Ok(3),
        b'F' => Ok(4),
        b'G' => Ok(5),
        b'H' => Ok(6),
        b'I' => Ok(7),
        b'K' => Ok(8),
        b'L' => Ok(9),
        b'M' => Ok(10),
        b'N' => Ok(11),
        b'P' => Ok(12),
        b'Q' => Ok(13),
        b'R' => Ok(14),
        b'S' => Ok(15),
        b'T' => Ok(16),
        b'V' => Ok(17),
        b'W' => Ok(18),
        b'Y' => Ok(19),
        b'B' => Ok(AMINO_B),
        b'Z' => Ok(AMINO_Z),
        // rare residues and placeholders all fold into "any"
        b'X' | b'U' | b'O' | b'J' => Ok(AMINO_X),
        _ => Err(UnknownResidueError { byte }),
    }
}

pub fn decode_amino(code: u8) -> u8 {
    match code {
        0..=19 => AMINO_ALPHABET[code as usize],
        AMINO_B => b'B',
        AMINO_Z => b'Z',
        _ => b'X',
    }
}

/// An amino acid sequence in digital form.
///
/// Residues are 1-indexed so that `digital(i)` lines up with DP row `i`;
/// index 0 holds a pad byte.
#[derive(Default, Clone, Debug)]
pub struct Sequence {
    pub name: String,
    pub length: usize,
    /// Digital residue codes, `[pad, r_1, .., r_length]`
    pub digital_bytes: Vec<u8>,
    /// Uppercase text residues, `[pad, r_1, .., r_length]`
    pub utf8_bytes: Vec<u8>,
}

impl Sequence {
    pub fn from_utf8(bytes: &[u8]) -> anyhow::Result<Self> {
        let mut digital_bytes = Vec::with_capacity(bytes.len() + 1);
        let mut utf8_bytes = Vec::with_capacity(bytes.len() + 1);
        digital_bytes.push(AMINO_PAD);
        utf8_bytes.push(b' ');

        for &byte in bytes {
            digital_bytes.push(encode_amino(byte)?);
            utf8_bytes.push(byte.to_ascii_uppercase());
        }

        Ok(Sequence {
            name: String::new(),
            length: bytes.len(),
            digital_bytes,
            utf8_bytes,
        })
    }

    pub fn from_digital(codes: &[u8]) -> anyhow::Result<Self> {
        let mut digital_bytes = Vec::with_capacity(codes.len() + 1);
        let mut utf8_bytes = Vec::with_capacity(codes.len() + 1);
        digital_bytes.push(AMINO_PAD);
        utf8_bytes.push(b' ');

        for &code in codes {
            anyhow::ensure!(
                (code as usize) < MAX_ALPHABET_SIZE,
                "digital residue code out of range: {code}"
            );
            digital_bytes.push(code);
            utf8_bytes.push(decode_amino(code));
        }

        Ok(Sequence {
            name: String::new(),
            length: codes.len(),
            digital_bytes,
            utf8_bytes,
        })
    }

    /// Read all amino acid sequences from a FASTA file.
    pub fn amino_from_fasta<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<Self>> {
        let path = path.as_ref();
        let file = File::open(path)
            .context(format!("failed to open fasta file: {}", path.to_string_lossy()))?;
        let reader = BufReader::new(file);

        let mut sequences: Vec<Sequence> = vec![];
        let mut name: Option<String> = None;
        let mut residues: Vec<u8> = vec![];

        let mut flush = |name: &mut Option<String>, residues: &mut Vec<u8>| -> anyhow::Result<()> {
            if let Some(name) = name.take() {
                let mut sequence = Sequence::from_utf8(residues)
                    .context(format!("invalid residue in sequence: {name}"))?;
                sequence.name = name;
                sequences.push(sequence);
            }
            residues.clear();
            Ok(())
        };

        for line in reader.lines() {
            let line = line.context("failed to read fasta line")?;
            if let Some(header) = line.strip_prefix('>') {
                flush(&mut name, &mut residues)?;
                name = Some(
                    header
                        .split_whitespace()
                        .next()
                        .unwrap_or_default()
                        .to_string(),
                );
            } else if name.is_some() {
                residues.extend(line.trim().bytes().filter(|b| !b.is_ascii_whitespace()));
            }
        }
        flush(&mut name, &mut residues)?;

        anyhow::ensure!(
            !sequences.is_empty(),
            "no sequences found in fasta file: {}",
            path.to_string_lossy()
        );
        Ok(sequences)
    }

    /// The digital code of residue `idx`, 1-indexed.
    #[inline]
    pub fn digital(&self, idx: usize) -> u8 {
        self.digital_bytes[idx]
    }

    /// The text form of residue `idx`, 1-indexed.
    #[inline]
    pub fn utf8(&self, idx: usize) -> u8 {
        self.utf8_bytes[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_utf8_round_trips() {
        let sequence = Sequence::from_utf8(b"ACDWy").unwrap();
        assert_eq!(sequence.length, 5);
        assert_eq!(sequence.digital(1), 0);
        assert_eq!(sequence.digital(4), 18);
        assert_eq!(sequence.utf8(5), b'Y');
    }

    #[test]
    fn test_ambiguity_codes() {
        let sequence = Sequence::from_utf8(b"XBZU").unwrap();
        assert_eq!(sequence.digital(1), AMINO_X);
        assert_eq!(sequence.digital(2), AMINO_B);
        assert_eq!(sequence.digital(3), AMINO_Z);
        assert_eq!(sequence.digital(4), AMINO_X);
    }

    #[test]
    fn test_unmapped_byte_is_an_error() {
        assert!(Sequence::from_utf8(b"AC1D").is_err());
    }
}
