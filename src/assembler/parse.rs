//! ```text
//! DATA R0 0x05   // comment
//! DATA R1 5
//! MARK again
//! ADD R0 R1
//! JIF E again
//! END
//! ```

use std::fmt;
use std::str::Lines;

use crate::isa::{Condition, Instruction, Mnemonic, Register, RegisterError, Shape};
use crate::memory::{Byte, Word};

use super::error::{AsmError, AsmErrorKind, Result};

macro_rules! parse_number {
    ( $ty:ty: $s:expr ) => {{
        let token: &str = $s;

        let (radix, offset) = match token.as_bytes() {
            [b'0', b'b', ..] => (2, 2),
            [b'0', b'o', ..] => (8, 2),
            [b'0', b'x', ..] => (16, 2),
            _ => (10, 0),
        };

        <$ty>::from_str_radix(&token[offset..], radix).map_err(|_| (radix, &token[offset..]))
    }};
}

/// Cuts a `//` or `#` comment off the end of `line`
pub fn strip_comment(line: &str) -> &str {
    let end = [line.find("//"), line.find('#')]
        .iter()
        .flatten()
        .copied()
        .min()
        .unwrap_or_else(|| line.len());
    &line[..end]
}

/// Jump destination as written in the source
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Label(String),
    /// Absolute address written as a number
    Address(Byte),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Label(name) => f.write_str(name),
            Target::Address(address) => write!(f, "{}", address),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Statement {
    /// Binds a label to the address of the next instruction, occupies no bytes
    Mark(String),
    Instruction(Instruction<Target>),
}

/// One parsed source line
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record {
    pub statement: Statement,
    pub line_nr: usize,
}

impl Record {
    /// Encoded length in bytes
    pub fn len(&self) -> Word {
        match &self.statement {
            Statement::Mark(_) => 0,
            Statement::Instruction(instruction) => instruction.len(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Parser<'a> {
    lines: Lines<'a>,
    line_nr: usize,
    records: Vec<Record>,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the assembly source `data`.
    pub fn new(data: &'a str) -> Self {
        Self {
            lines: data.lines(),
            line_nr: 0,
            records: Vec::new(),
        }
    }

    /// Consumes `self` and tries to parse every line into a [`Record`].
    ///
    /// # Errors
    ///
    /// All errors which may occur are collected and returned at the end.
    pub fn parse(self) -> Result<Vec<Record>, Vec<AsmError>> {
        let (records, errors) = self.parse_all();

        if errors.is_empty() {
            Ok(records)
        } else {
            Err(errors)
        }
    }

    /// Parses every line, keeping the records of the lines that did parse
    /// next to the errors of those that did not.
    pub(crate) fn parse_all(mut self) -> (Vec<Record>, Vec<AsmError>) {
        let mut errors = Vec::new();

        while let Some(res) = self.parse_next_line() {
            if let Err(err) = res {
                log::error!("{}", err);
                errors.push(err);
            }
        }

        (self.records, errors)
    }

    /// Tries to parse the next line. Each instruction should be located on
    /// it's own line.
    fn parse_next_line(&mut self) -> Option<Result<()>> {
        let line = strip_comment(self.lines.next()?).trim();
        self.line_nr += 1;

        let words: Vec<&str> = line.split_whitespace().collect();

        let statement = match words.split_first() {
            // Comment or empty line; skip
            None => return Some(Ok(())),
            Some((head, operands)) if head.eq_ignore_ascii_case("MARK") => {
                self.parse_mark(operands)
            }
            Some((head, operands)) => self.parse_instruction(head, operands),
        };

        Some(statement.map(|statement| {
            self.records.push(Record {
                statement,
                line_nr: self.line_nr,
            })
        }))
    }

    /// Tries to parse the operands of a `MARK`.
    ///
    /// # Examples
    ///
    /// - `MARK loop`
    fn parse_mark(&self, operands: &[&str]) -> Result<Statement> {
        match operands {
            [name] => {
                let name = self.label(name)?;
                log::debug!("[{}] Found mark `{}`", self.line_nr, name);
                Ok(Statement::Mark(name))
            }
            _ => Err(self.error(
                AsmErrorKind::Syntax,
                format!("`MARK` expects 1 operand, found {}", operands.len()),
            )),
        }
    }

    /// Tries to parse a line as an instruction, checking the operands
    /// against the shape of the mnemonic.
    ///
    /// # Examples
    ///
    /// - `ADD R0 R1`
    /// - `DATA R2 0x10`
    /// - `JIF CZ loop`
    fn parse_instruction(&self, name: &str, operands: &[&str]) -> Result<Statement> {
        let mnemonic: Mnemonic = name.parse().map_err(|_| {
            self.error(
                AsmErrorKind::UnknownMnemonic,
                format!("no instruction named `{}`", name),
            )
        })?;
        let shape = mnemonic.shape();

        if !shape.is_enabled() {
            return Err(self.error(
                AsmErrorKind::DisabledOpcode,
                format!("`{}` is reserved and cannot be assembled", mnemonic),
            ));
        }

        let expected = shape.operand_count();
        if operands.len() != expected {
            return Err(self.error(
                AsmErrorKind::Syntax,
                format!(
                    "`{}` expects {} operand(s), found {}",
                    mnemonic,
                    expected,
                    operands.len()
                ),
            ));
        }

        let instruction = match shape {
            Shape::Alu(op) => {
                let a = self.register(operands[0])?;
                let b = self.register(operands[1])?;

                if crate::isa::alu_byte(op, a, b) == crate::isa::END {
                    return Err(self.error(
                        AsmErrorKind::ReservedEncoding,
                        format!("`{} {} {}` encodes to the END opcode", mnemonic, a, b),
                    ));
                }

                Instruction::Alu { op, a, b }
            }
            Shape::Store => Instruction::Store {
                a: self.register(operands[0])?,
                b: self.register(operands[1])?,
            },
            Shape::Load => Instruction::Load {
                a: self.register(operands[0])?,
                b: self.register(operands[1])?,
            },
            Shape::Data => Instruction::Data {
                b: self.register(operands[0])?,
                value: self.immediate(operands[1])?,
            },
            Shape::JumpRegister => Instruction::JumpRegister {
                b: self.register(operands[0])?,
            },
            Shape::Jump => Instruction::Jump {
                target: self.target(operands[0])?,
            },
            Shape::JumpIf => Instruction::JumpIf {
                condition: self.condition(operands[0])?,
                target: self.target(operands[1])?,
            },
            Shape::ClearFlags => Instruction::ClearFlags,
            Shape::End => Instruction::End,
        };

        log::debug!("[{}] Found instruction {}", self.line_nr, instruction);

        Ok(Statement::Instruction(instruction))
    }

    fn register(&self, token: &str) -> Result<Register> {
        token.parse().map_err(|err| match err {
            RegisterError::OutOfRange => self.error(
                AsmErrorKind::OperandRange,
                format!("register `{}` does not exist, use R0 to R3", token),
            ),
            RegisterError::Malformed => self.error(
                AsmErrorKind::Syntax,
                format!("expected a register, found `{}`", token),
            ),
        })
    }

    /// Parses a number that has to fit in a byte. Well-formed numbers outside
    /// 0 to 255, negative or too wide for any integer type, are range errors.
    fn immediate(&self, token: &str) -> Result<Byte> {
        let (negative, digits) = match token.strip_prefix('-') {
            Some(digits) => (true, digits),
            None => (false, token),
        };
        let out_of_range = || {
            self.error(
                AsmErrorKind::OperandRange,
                format!("`{}` does not fit in 8 bits", token),
            )
        };

        match parse_number!(Byte: digits) {
            Ok(value) if !negative || value == 0 => Ok(value),
            Ok(_) => Err(out_of_range()),
            Err((radix, rest)) if !rest.is_empty() && rest.chars().all(|c| c.is_digit(radix)) => {
                Err(out_of_range())
            }
            Err((radix, _)) => Err(self.error(
                AsmErrorKind::Syntax,
                format!("failed to parse `{}` as number with radix `{}`", token, radix),
            )),
        }
    }

    fn condition(&self, token: &str) -> Result<Condition> {
        token.parse().map_err(|_| {
            self.error(
                AsmErrorKind::Syntax,
                format!(
                    "invalid condition `{}`, expected a CAEZ mask like `0010` or flag letters like `E`",
                    token
                ),
            )
        })
    }

    fn target(&self, token: &str) -> Result<Target> {
        if token.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
            self.immediate(token).map(Target::Address)
        } else {
            self.label(token).map(Target::Label)
        }
    }

    fn label(&self, token: &str) -> Result<String> {
        let mut chars = token.chars();
        let valid = chars
            .next()
            .map_or(false, |c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

        if valid {
            Ok(token.to_string())
        } else {
            Err(self.error(
                AsmErrorKind::Syntax,
                format!("invalid label name `{}`", token),
            ))
        }
    }

    fn error(&self, kind: AsmErrorKind, context: String) -> AsmError {
        AsmError::new(kind, context, self.line_nr)
    }
}
