use std::convert::TryFrom;

use crate::memory::Byte;

use super::error::{AsmError, AsmErrorKind, Result};
use super::parse::{Record, Statement, Target};
use super::resolve::{Layout, SymbolTable};

/// Emits the bytes of every record, substituting label addresses from the
/// first pass.
///
/// # Panics
///
/// Panics if an instruction lands on a different offset than the first pass
/// assigned it.
pub fn generate(records: &[Record], layout: &Layout) -> (Vec<Byte>, Vec<AsmError>) {
    let mut bytes = Vec::with_capacity(layout.len);
    let mut errors = Vec::new();

    for (index, record) in records.iter().enumerate() {
        let instruction = match &record.statement {
            Statement::Mark(_) => continue,
            Statement::Instruction(instruction) => instruction,
        };

        assert_eq!(
            bytes.len(),
            layout.offsets[index],
            "second pass diverged from first pass at line {}",
            record.line_nr
        );

        let encoded = match instruction
            .resolve_target(|target| lookup(target, &layout.symbols, record.line_nr))
        {
            Ok(instruction) => instruction.encode(),
            Err(err) => {
                log::error!("{}", err);
                errors.push(err);
                // keep later offsets aligned, the image is discarded anyway
                vec![0; instruction.len() as usize]
            }
        };

        bytes.extend(encoded);
    }

    log::debug!("Generated {} bytes", bytes.len());

    (bytes, errors)
}

fn lookup(target: &Target, symbols: &SymbolTable, line_nr: usize) -> Result<Byte> {
    match target {
        Target::Address(address) => Ok(*address),
        Target::Label(name) => {
            let offset = *symbols.get(name).ok_or_else(|| {
                AsmError::new(
                    AsmErrorKind::UnknownLabel,
                    format!("`{}` is never marked", name),
                    line_nr,
                )
            })?;

            Byte::try_from(offset).map_err(|_| {
                AsmError::new(
                    AsmErrorKind::OperandRange,
                    format!("`{}` resolves to {}, outside the 8-bit address space", name, offset),
                    line_nr,
                )
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::parse::Parser;
    use crate::assembler::resolve::resolve;
    use color_eyre::eyre::{eyre, Result};

    fn generate_source(data: &str) -> Result<(Vec<Byte>, Vec<AsmError>)> {
        let records = Parser::new(data)
            .parse()
            .map_err(|errors| eyre!("{:?}", errors))?;
        let (layout, errors) = resolve(&records, 256);
        assert!(errors.is_empty());
        Ok(generate(&records, &layout))
    }

    #[test]
    fn backward_reference() -> Result<()> {
        let (bytes, errors) = generate_source("MARK top\nCLF\nJMP top")?;

        assert!(errors.is_empty());
        assert_eq!(bytes, vec![0b0110_0000, 0b0100_0000, 0]);

        Ok(())
    }

    #[test]
    fn forward_reference() -> Result<()> {
        let (bytes, errors) = generate_source("JIF E skip\nCLF\nMARK skip\nEND")?;

        assert!(errors.is_empty());
        assert_eq!(bytes, vec![0b0101_0010, 3, 0b0110_0000, 0b1100_1111]);

        Ok(())
    }

    #[test]
    fn numeric_target() -> Result<()> {
        let (bytes, errors) = generate_source("JMP 0x10")?;

        assert!(errors.is_empty());
        assert_eq!(bytes, vec![0b0100_0000, 0x10]);

        Ok(())
    }

    #[test]
    fn unknown_label_keeps_alignment() -> Result<()> {
        let (bytes, errors) = generate_source("JMP nowhere\nJMP also\nEND")?;

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].kind(), AsmErrorKind::UnknownLabel);
        assert_eq!(errors[1].line_nr(), 2);
        assert_eq!(bytes.len(), 5);

        Ok(())
    }

    #[test]
    fn label_past_address_space() -> Result<()> {
        let mut source = String::from("JMP tail\n");
        for _ in 0..127 {
            source.push_str("DATA R0 0\n");
        }
        source.push_str("MARK tail\n");

        let (_, errors) = generate_source(&source)?;

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind(), AsmErrorKind::OperandRange);
        assert_eq!(errors[0].line_nr(), 1);

        Ok(())
    }
}
