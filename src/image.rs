//! The assembled byte image and its textual binary listing, one byte per line:
//!
//! ```text
//! 00100000
//! 00000101
//! 11001111
//! ```

use std::error;
use std::fmt;
use std::str::FromStr;

use crate::isa::{DecodeError, Instruction};
use crate::memory::{Byte, Word};

/// Flat program image. No header, no padding, instructions in program order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Image {
    bytes: Vec<Byte>,
}

impl Image {
    pub fn new(bytes: Vec<Byte>) -> Self {
        Self { bytes }
    }

    /// Encodes `instructions` back to back
    pub fn from_instructions(instructions: &[Instruction]) -> Self {
        Self::new(instructions.iter().flat_map(Instruction::encode).collect())
    }

    pub fn as_bytes(&self) -> &[Byte] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes from `offset` to the end, `None` if `offset` is past the image
    pub fn bytes_from(&self, offset: Word) -> Option<&[Byte]> {
        let offset = offset as usize;
        if offset < self.bytes.len() {
            Some(&self.bytes[offset..])
        } else {
            None
        }
    }

    /// Decodes the whole image. A byte that fails to decode is reported at its
    /// offset and decoding continues with the next byte.
    pub fn disassemble(&self) -> Vec<(usize, Result<Instruction, DecodeError>)> {
        let mut offset = 0;
        let mut instructions = Vec::new();

        while offset < self.bytes.len() {
            let decoded = Instruction::decode(&self.bytes[offset..]);
            let len = decoded.as_ref().map_or(1, Instruction::len);
            instructions.push((offset, decoded));
            offset += len as usize;
        }

        instructions
    }

    /// Renders one 8-digit binary line per byte
    pub fn to_listing(&self) -> String {
        self.bytes
            .iter()
            .map(|byte| format!("{:08b}\n", byte))
            .collect()
    }
}

impl From<Vec<Byte>> for Image {
    fn from(bytes: Vec<Byte>) -> Self {
        Self::new(bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingError {
    token: String,
    line_nr: usize,
}

impl fmt::Display for ListingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error [ln: {}]: invalid listing byte - `{}` is not 8 binary digits",
            self.line_nr, self.token
        )
    }
}

impl error::Error for ListingError {}

impl FromStr for Image {
    type Err = ListingError;

    /// Parses a listing produced by [`Image::to_listing`]. Blank lines and
    /// `#` or `//` comments are skipped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = Vec::new();

        for (index, line) in s.lines().enumerate() {
            let line = crate::assembler::parse::strip_comment(line).trim();
            if line.is_empty() {
                continue;
            }

            let byte = if line.len() == 8 && line.bytes().all(|b| b == b'0' || b == b'1') {
                Byte::from_str_radix(line, 2).ok()
            } else {
                None
            };

            match byte {
                Some(byte) => bytes.push(byte),
                None => {
                    return Err(ListingError {
                        token: line.to_string(),
                        line_nr: index + 1,
                    })
                }
            }
        }

        log::debug!("Read {} bytes from listing", bytes.len());

        Ok(Self::new(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::{AluOp, Register};
    use color_eyre::eyre::Result;

    #[test]
    fn test_listing() -> Result<()> {
        let image = Image::new(vec![0b0010_0000, 5, 0b1100_1111]);

        assert_eq!(image.to_listing(), "00100000\n00000101\n11001111\n");
        assert_eq!(image.to_listing().parse::<Image>()?, image);

        Ok(())
    }

    #[test]
    fn test_listing_comments() -> Result<()> {
        let listing = r#"
            # DATA R0 5
            00100000
            00000101 // literal

            11001111
        "#;

        assert_eq!(listing.parse::<Image>()?.as_bytes(), &[0b0010_0000, 5, 0b1100_1111]);

        Ok(())
    }

    #[test]
    fn test_listing_rejects_bad_byte() -> Result<()> {
        let err = "00100000\n0010\n".parse::<Image>().unwrap_err();

        assert_eq!(err.line_nr, 2);
        assert_eq!(err.token, "0010");

        Ok(())
    }

    #[test]
    fn test_disassemble() -> Result<()> {
        let program = [
            Instruction::Data {
                b: Register::R1,
                value: 3,
            },
            Instruction::Alu {
                op: AluOp::Add,
                a: Register::R0,
                b: Register::R1,
            },
            Instruction::End,
        ];
        let image = Image::from_instructions(&program);

        let decoded = image.disassemble();

        assert_eq!(
            decoded,
            vec![(0, Ok(program[0])), (2, Ok(program[1])), (3, Ok(program[2]))]
        );

        Ok(())
    }

    #[test]
    fn test_disassemble_skips_invalid_bytes() -> Result<()> {
        let image = Image::new(vec![0b0111_0000, 0b1100_1111]);

        let decoded = image.disassemble();

        assert_eq!(
            decoded,
            vec![
                (0, Err(DecodeError::Invalid { opcode: 0b0111_0000 })),
                (1, Ok(Instruction::End)),
            ]
        );

        Ok(())
    }

    #[test]
    fn test_disassemble_past_word_range() -> Result<()> {
        let image = Image::new(vec![0b0110_0000; 70_000]);

        let decoded = image.disassemble();

        assert_eq!(decoded.len(), 70_000);
        assert_eq!(decoded[69_999], (69_999, Ok(Instruction::ClearFlags)));

        Ok(())
    }
}
