//! Two-pass assembler: parse, bind labels to offsets, emit bytes.

use crate::image::Image;
use crate::isa::Instruction;

pub mod codegen;
pub mod error;
pub mod parse;
pub mod resolve;

pub use error::{AsmError, AsmErrorKind, AsmErrors};
use parse::{Parser, Record, Statement};

/// Largest image an 8-bit program counter can address
pub const MAX_IMAGE_LEN: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Append an `END` after the last source line
    pub append_end: bool,
    /// Maximum image length in bytes
    pub capacity: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            append_end: false,
            capacity: MAX_IMAGE_LEN,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Assembler {
    options: Options,
}

impl Assembler {
    pub fn new(options: Options) -> Self {
        Self { options }
    }

    /// Assembles `source` into an image.
    ///
    /// # Errors
    ///
    /// Every pass keeps going after an error so that all problems are
    /// reported together. No image is produced if any error was recorded.
    pub fn assemble(&self, source: &str) -> Result<Image, Vec<AsmError>> {
        let (mut records, mut errors) = Parser::new(source).parse_all();

        if self.options.append_end {
            records.push(Record {
                statement: Statement::Instruction(Instruction::End),
                line_nr: source.lines().count() + 1,
            });
        }

        let (layout, resolve_errors) = resolve::resolve(&records, self.options.capacity);
        errors.extend(resolve_errors);

        let (bytes, codegen_errors) = codegen::generate(&records, &layout);
        errors.extend(codegen_errors);

        if !errors.is_empty() {
            errors.sort_by_key(AsmError::line_nr);
            return Err(errors);
        }

        log::info!(
            "Assembled {} instructions into {} bytes",
            records.iter().filter(|record| record.len() > 0).count(),
            bytes.len()
        );

        Ok(Image::new(bytes))
    }
}

/// Assembles `source` with the default [`Options`]
pub fn assemble(source: &str) -> Result<Image, Vec<AsmError>> {
    Assembler::default().assemble(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::eyre::Result;

    fn kinds(source: &str) -> Vec<AsmErrorKind> {
        match assemble(source) {
            Ok(image) => panic!("expected errors, got {:?}", image),
            Err(errors) => errors.iter().map(AsmError::kind).collect(),
        }
    }

    #[test]
    fn assemble_program() -> Result<()> {
        let source = r#"
            DATA R0 5
            DATA R1 5
            ADD R0 R1
            JIF E equal
            DATA R2 1
            MARK equal
            DATA R2 99
            END
        "#;

        let image = assemble(source).map_err(AsmErrors)?;

        assert_eq!(
            image.as_bytes(),
            &[
                0b0010_0000, 5,
                0b0010_0001, 5,
                0b1000_0001,
                0b0101_0010, 9,
                0b0010_0010, 1,
                0b0010_0010, 99,
                0b1100_1111,
            ]
        );

        Ok(())
    }

    #[test]
    fn duplicate_mark_emits_nothing() -> Result<()> {
        assert_eq!(
            kinds("MARK loop\nCLF\nMARK loop\nJMP loop"),
            vec![AsmErrorKind::DuplicateLabel]
        );

        Ok(())
    }

    #[test]
    fn errors_from_every_pass_are_collected() -> Result<()> {
        let source = "CMP R0 R1\nMARK a\nMARK a\nJMP b\nDATA R0 300";

        assert_eq!(
            kinds(source),
            vec![
                AsmErrorKind::DisabledOpcode,
                AsmErrorKind::DuplicateLabel,
                AsmErrorKind::UnknownLabel,
                AsmErrorKind::OperandRange,
            ]
        );

        Ok(())
    }

    #[test]
    fn comments_do_not_shift_offsets() -> Result<()> {
        let plain = assemble("MARK a\nCLF\nJMP a").map_err(AsmErrors)?;
        let commented = assemble("// header\n\nMARK a # here\n\nCLF // clear\n# skip\nJMP a")
            .map_err(AsmErrors)?;

        assert_eq!(plain, commented);

        Ok(())
    }

    #[test]
    fn append_end() -> Result<()> {
        let assembler = Assembler::new(Options {
            append_end: true,
            ..Options::default()
        });

        let image = assembler.assemble("CLF\nMARK tail").map_err(AsmErrors)?;

        assert_eq!(image.as_bytes(), &[0b0110_0000, 0b1100_1111]);

        Ok(())
    }

    #[test]
    fn capacity_limit() -> Result<()> {
        let assembler = Assembler::new(Options {
            capacity: 2,
            ..Options::default()
        });

        let errors = assembler.assemble("CLF\nCLF\nCLF").unwrap_err();

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind(), AsmErrorKind::ImageTooLarge);

        Ok(())
    }

    #[test]
    fn source_past_word_range_is_too_large() -> Result<()> {
        let source = "DATA R0 1\n".repeat(32_770);

        assert_eq!(kinds(&source), vec![AsmErrorKind::ImageTooLarge]);

        Ok(())
    }
}
