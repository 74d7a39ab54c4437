//! Register names, the ALU opcode table and the 8-bit instruction encoding.
//!
//! | Class | Byte 1     | Byte 2  |
//! |-------|------------|---------|
//! | ALU   | `1CCCAABB` |         |
//! | ST    | `0001AABB` |         |
//! | LD    | `0000AABB` |         |
//! | DATA  | `001000BB` | literal |
//! | JMPR  | `001100BB` |         |
//! | JMP   | `01000000` | address |
//! | JIF   | `0101CAEZ` | address |
//! | CLF   | `01100000` |         |
//! | END   | `11001111` |         |

use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::memory::{Byte, Word};

pub const LOAD: Byte = 0b0000_0000;
pub const STORE: Byte = 0b0001_0000;
pub const DATA: Byte = 0b0010_0000;
pub const JUMP_REGISTER: Byte = 0b0011_0000;
pub const JUMP: Byte = 0b0100_0000;
pub const JUMP_IF: Byte = 0b0101_0000;
pub const CLEAR_FLAGS: Byte = 0b0110_0000;
pub const END: Byte = 0b1100_1111;
pub const ALU: Byte = 0b1000_0000;

/// One of the four general purpose registers
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(TryFromPrimitive, IntoPrimitive)]
pub enum Register {
    R0 = 0b00,
    R1 = 0b01,
    R2 = 0b10,
    R3 = 0b11,
}

impl Register {
    pub const ALL: [Self; 4] = [Self::R0, Self::R1, Self::R2, Self::R3];

    /// Position in the register file
    pub fn index(self) -> usize {
        u8::from(self) as usize
    }

    /// Reads the 2-bit register field starting at bit `shift` of `byte`
    fn field(byte: Byte, shift: u32) -> Self {
        Self::ALL[((byte >> shift) & 0b11) as usize]
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", u8::from(*self))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
    /// Looks like a register but names one that does not exist, e.g. `R4`
    OutOfRange,
    Malformed,
}

impl FromStr for Register {
    type Err = RegisterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let index = s
            .strip_prefix('R')
            .or_else(|| s.strip_prefix('r'))
            .ok_or(RegisterError::Malformed)?;

        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            return Err(RegisterError::Malformed);
        }

        index
            .parse::<u8>()
            .ok()
            .and_then(|index| Register::try_from(index).ok())
            .ok_or(RegisterError::OutOfRange)
    }
}

/// The 3-bit ALU operation selector
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(TryFromPrimitive, IntoPrimitive)]
pub enum AluOp {
    Add = 0b000,
    Shr = 0b001,
    Shl = 0b010,
    Not = 0b011,
    And = 0b100,
    Or = 0b101,
    Xor = 0b110,
    /// Reserved, never assembled or executed
    Cmp = 0b111,
}

impl AluOp {
    pub fn is_enabled(self) -> bool {
        self != AluOp::Cmp
    }

    pub fn mnemonic(self) -> Mnemonic {
        match self {
            AluOp::Add => Mnemonic::ADD,
            AluOp::Shr => Mnemonic::SHR,
            AluOp::Shl => Mnemonic::SHL,
            AluOp::Not => Mnemonic::NOT,
            AluOp::And => Mnemonic::AND,
            AluOp::Or => Mnemonic::OR,
            AluOp::Xor => Mnemonic::XOR,
            AluOp::Cmp => Mnemonic::CMP,
        }
    }
}

/// Encodes an ALU instruction byte
pub fn alu_byte(op: AluOp, a: Register, b: Register) -> Byte {
    Shape::Alu(op).opcode() | u8::from(a) << 2 | u8::from(b)
}

/// Condition mask of a `JIF`. The jump is taken when every selected flag is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Condition {
    pub carry: bool,
    pub a_larger: bool,
    pub equal: bool,
    pub zero: bool,
}

impl Condition {
    /// Reads the low nibble, `CAEZ` from bit 3 down to bit 0
    pub const fn from_bits(bits: Byte) -> Self {
        Self {
            carry: bits & 0b1000 != 0,
            a_larger: bits & 0b0100 != 0,
            equal: bits & 0b0010 != 0,
            zero: bits & 0b0001 != 0,
        }
    }

    pub const fn bits(self) -> Byte {
        (self.carry as Byte) << 3
            | (self.a_larger as Byte) << 2
            | (self.equal as Byte) << 1
            | self.zero as Byte
    }
}

/// Accepts either a 4-digit binary mask (`0010`) or flag letters (`E`, `CAEZ`)
impl FromStr for Condition {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == 4 && s.bytes().all(|b| b == b'0' || b == b'1') {
            let bits = Byte::from_str_radix(s, 2).map_err(|_| ())?;
            return Ok(Self::from_bits(bits));
        }

        if s.is_empty() {
            return Err(());
        }

        let mut condition = Self::default();
        for c in s.chars() {
            let flag = match c.to_ascii_uppercase() {
                'C' => &mut condition.carry,
                'A' => &mut condition.a_larger,
                'E' => &mut condition.equal,
                'Z' => &mut condition.zero,
                _ => return Err(()),
            };

            if *flag {
                // same letter twice
                return Err(());
            }
            *flag = true;
        }

        Ok(condition)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bits() == 0 {
            return f.write_str("0000");
        }

        for (set, letter) in [
            (self.carry, 'C'),
            (self.a_larger, 'A'),
            (self.equal, 'E'),
            (self.zero, 'Z'),
        ]
        .iter()
        {
            if *set {
                write!(f, "{}", letter)?;
            }
        }

        Ok(())
    }
}

/// Encoding shape of a mnemonic: fixed opcode bits, operands and byte length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Alu(AluOp),
    Store,
    Load,
    Data,
    JumpRegister,
    Jump,
    JumpIf,
    ClearFlags,
    End,
}

impl Shape {
    /// Fixed bits of the first byte, register and condition fields zeroed
    pub fn opcode(&self) -> Byte {
        match self {
            Shape::Alu(op) => ALU | u8::from(*op) << 4,
            Shape::Store => STORE,
            Shape::Load => LOAD,
            Shape::Data => DATA,
            Shape::JumpRegister => JUMP_REGISTER,
            Shape::Jump => JUMP,
            Shape::JumpIf => JUMP_IF,
            Shape::ClearFlags => CLEAR_FLAGS,
            Shape::End => END,
        }
    }

    /// Number of operands written after the mnemonic
    pub fn operand_count(&self) -> usize {
        match self {
            Shape::Alu(_) | Shape::Store | Shape::Load | Shape::Data | Shape::JumpIf => 2,
            Shape::JumpRegister | Shape::Jump => 1,
            Shape::ClearFlags | Shape::End => 0,
        }
    }

    /// Encoded length in bytes
    pub fn len(&self) -> Word {
        match self {
            Shape::Data | Shape::Jump | Shape::JumpIf => 2,
            _ => 1,
        }
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            Shape::Alu(op) => op.is_enabled(),
            _ => true,
        }
    }
}

macro_rules! mnemonics {
    ( $( $( #[doc = $doc:expr] )+ $name:ident => $shape:expr , )+ ) => {
        /// Defines the mnemonics accepted by the assembler
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum Mnemonic {
            $(
                $( #[doc = $doc] )+
                $name,
            )+
        }

        impl Mnemonic {
            pub const ALL: &'static [Self] = &[
                $( Self::$name , )+
            ];

            pub fn name(&self) -> &'static str {
                match self {
                    $( Self::$name => stringify!($name) , )+
                }
            }

            pub fn shape(&self) -> Shape {
                match self {
                    $( Self::$name => $shape , )+
                }
            }
        }

        impl ::std::fmt::Display for Mnemonic {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.name())
            }
        }
    }
}

mnemonics! {
    /// RB := RA + RB
    ADD => Shape::Alu(AluOp::Add),
    /// RB := RB >> 1
    SHR => Shape::Alu(AluOp::Shr),
    /// RB := RB << 1
    SHL => Shape::Alu(AluOp::Shl),
    /// RB := !RB
    NOT => Shape::Alu(AluOp::Not),
    /// RB := RA & RB
    AND => Shape::Alu(AluOp::And),
    /// RB := RA | RB
    OR => Shape::Alu(AluOp::Or),
    /// RB := RA ^ RB
    XOR => Shape::Alu(AluOp::Xor),
    /// Compare, reserved
    CMP => Shape::Alu(AluOp::Cmp),
    /// Store RA to the memory address held in RB
    ST => Shape::Store,
    /// Load the memory byte at the address held in RA into RB
    LD => Shape::Load,
    /// Load the literal in the second byte into RB
    DATA => Shape::Data,
    /// Jump to the address held in RB
    JMPR => Shape::JumpRegister,
    /// Jump to the address in the second byte
    JMP => Shape::Jump,
    /// Jump to the address in the second byte if the selected flags are set
    JIF => Shape::JumpIf,
    /// Clear all flags
    CLF => Shape::ClearFlags,
    /// Stop the execution of the program
    END => Shape::End,
}

impl FromStr for Mnemonic {
    type Err = ();

    /// Case insensitive lookup
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mnemonic::ALL
            .iter()
            .find(|mnemonic| mnemonic.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The byte matches no opcode
    Invalid { opcode: Byte },
    /// The byte is the reserved `CMP` pattern
    Disabled { opcode: Byte },
    /// A 2-byte instruction is cut off after its first byte
    Truncated,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Invalid { opcode } => write!(f, "invalid opcode `{:08b}`", opcode),
            DecodeError::Disabled { opcode } => {
                write!(f, "opcode `{:08b}` is the disabled CMP", opcode)
            }
            DecodeError::Truncated => f.write_str("instruction is missing its second byte"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// A single instruction. `T` is the jump target: a resolved [`Byte`] address
/// once assembled, or a symbolic target while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction<T = Byte> {
    Alu { op: AluOp, a: Register, b: Register },
    Store { a: Register, b: Register },
    Load { a: Register, b: Register },
    Data { b: Register, value: Byte },
    JumpRegister { b: Register },
    Jump { target: T },
    JumpIf { condition: Condition, target: T },
    ClearFlags,
    End,
}

impl<T> Instruction<T> {
    pub fn mnemonic(&self) -> Mnemonic {
        match self {
            Instruction::Alu { op, .. } => op.mnemonic(),
            Instruction::Store { .. } => Mnemonic::ST,
            Instruction::Load { .. } => Mnemonic::LD,
            Instruction::Data { .. } => Mnemonic::DATA,
            Instruction::JumpRegister { .. } => Mnemonic::JMPR,
            Instruction::Jump { .. } => Mnemonic::JMP,
            Instruction::JumpIf { .. } => Mnemonic::JIF,
            Instruction::ClearFlags => Mnemonic::CLF,
            Instruction::End => Mnemonic::END,
        }
    }

    /// Encoded length in bytes
    pub fn len(&self) -> Word {
        self.mnemonic().shape().len()
    }

    /// Rewrites the jump target, leaving every other field untouched
    pub fn resolve_target<U, E, F>(&self, resolve: F) -> Result<Instruction<U>, E>
    where
        F: FnOnce(&T) -> Result<U, E>,
    {
        Ok(match self {
            Instruction::Alu { op, a, b } => Instruction::Alu {
                op: *op,
                a: *a,
                b: *b,
            },
            Instruction::Store { a, b } => Instruction::Store { a: *a, b: *b },
            Instruction::Load { a, b } => Instruction::Load { a: *a, b: *b },
            Instruction::Data { b, value } => Instruction::Data {
                b: *b,
                value: *value,
            },
            Instruction::JumpRegister { b } => Instruction::JumpRegister { b: *b },
            Instruction::Jump { target } => Instruction::Jump {
                target: resolve(target)?,
            },
            Instruction::JumpIf { condition, target } => Instruction::JumpIf {
                condition: *condition,
                target: resolve(target)?,
            },
            Instruction::ClearFlags => Instruction::ClearFlags,
            Instruction::End => Instruction::End,
        })
    }
}

impl Instruction {
    /// Encodes the instruction into its 1 or 2 bytes
    pub fn encode(&self) -> Vec<Byte> {
        let opcode = self.mnemonic().shape().opcode();
        match *self {
            Instruction::Alu { a, b, .. }
            | Instruction::Store { a, b }
            | Instruction::Load { a, b } => vec![opcode | u8::from(a) << 2 | u8::from(b)],
            Instruction::Data { b, value } => vec![opcode | u8::from(b), value],
            Instruction::JumpRegister { b } => vec![opcode | u8::from(b)],
            Instruction::Jump { target } => vec![opcode, target],
            Instruction::JumpIf { condition, target } => vec![opcode | condition.bits(), target],
            Instruction::ClearFlags | Instruction::End => vec![opcode],
        }
    }

    /// Decodes the instruction starting at `bytes[0]`. The prefix of the
    /// first byte alone decides whether a second byte is read.
    pub fn decode(bytes: &[Byte]) -> Result<Self, DecodeError> {
        let opcode = *bytes.first().ok_or(DecodeError::Truncated)?;
        let operand = || bytes.get(1).copied().ok_or(DecodeError::Truncated);
        let a = Register::field(opcode, 2);
        let b = Register::field(opcode, 0);

        // END shares the ALU prefix, so it has to be matched first
        if opcode == END {
            return Ok(Instruction::End);
        }

        if opcode & ALU != 0 {
            let op = AluOp::try_from((opcode >> 4) & 0b111)
                .map_err(|_| DecodeError::Invalid { opcode })?;
            if !op.is_enabled() {
                return Err(DecodeError::Disabled { opcode });
            }
            return Ok(Instruction::Alu { op, a, b });
        }

        let instruction = match opcode & 0b1111_0000 {
            LOAD => Instruction::Load { a, b },
            STORE => Instruction::Store { a, b },
            DATA if opcode & 0b1100 == 0 => Instruction::Data {
                b,
                value: operand()?,
            },
            JUMP_REGISTER if opcode & 0b1100 == 0 => Instruction::JumpRegister { b },
            JUMP if opcode == JUMP => Instruction::Jump { target: operand()? },
            JUMP_IF => Instruction::JumpIf {
                condition: Condition::from_bits(opcode),
                target: operand()?,
            },
            CLEAR_FLAGS if opcode == CLEAR_FLAGS => Instruction::ClearFlags,
            _ => return Err(DecodeError::Invalid { opcode }),
        };

        Ok(instruction)
    }
}

impl<T: fmt::Display> fmt::Display for Instruction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mnemonic = self.mnemonic();
        match self {
            Instruction::Alu { a, b, .. }
            | Instruction::Store { a, b }
            | Instruction::Load { a, b } => write!(f, "{} {} {}", mnemonic, a, b),
            Instruction::Data { b, value } => write!(f, "{} {} {}", mnemonic, b, value),
            Instruction::JumpRegister { b } => write!(f, "{} {}", mnemonic, b),
            Instruction::Jump { target } => write!(f, "{} {}", mnemonic, target),
            Instruction::JumpIf { condition, target } => {
                write!(f, "{} {} {}", mnemonic, condition, target)
            }
            Instruction::ClearFlags | Instruction::End => write!(f, "{}", mnemonic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::eyre::Result;

    #[test]
    fn test_encode_table() -> Result<()> {
        use Register::*;

        let cases: &[(Instruction, &[Byte])] = &[
            (Instruction::Alu { op: AluOp::Add, a: R0, b: R1 }, &[0b1000_0001]),
            (Instruction::Alu { op: AluOp::Xor, a: R3, b: R2 }, &[0b1110_1110]),
            (Instruction::Store { a: R1, b: R2 }, &[0b0001_0110]),
            (Instruction::Load { a: R2, b: R3 }, &[0b0000_1011]),
            (Instruction::Data { b: R2, value: 99 }, &[0b0010_0010, 99]),
            (Instruction::JumpRegister { b: R3 }, &[0b0011_0011]),
            (Instruction::Jump { target: 12 }, &[0b0100_0000, 12]),
            (
                Instruction::JumpIf {
                    condition: Condition::from_bits(0b0010),
                    target: 7,
                },
                &[0b0101_0010, 7],
            ),
            (Instruction::ClearFlags, &[0b0110_0000]),
            (Instruction::End, &[0b1100_1111]),
        ];

        for (instruction, bytes) in cases {
            assert_eq!(instruction.encode(), bytes.to_vec(), "{}", instruction);
            assert_eq!(instruction.len() as usize, bytes.len());
            assert_eq!(Instruction::decode(bytes), Ok(*instruction));
        }

        Ok(())
    }

    #[test]
    fn test_decode_disabled_cmp() -> Result<()> {
        assert_eq!(
            Instruction::decode(&[0b1111_0001]),
            Err(DecodeError::Disabled {
                opcode: 0b1111_0001
            })
        );

        Ok(())
    }

    #[test]
    fn test_decode_invalid_patterns() -> Result<()> {
        for opcode in [0b0010_0100u8, 0b0011_1000, 0b0100_0001, 0b0110_0001, 0b0111_1111].iter() {
            assert_eq!(
                Instruction::decode(&[*opcode, 0]),
                Err(DecodeError::Invalid { opcode: *opcode })
            );
        }

        Ok(())
    }

    #[test]
    fn test_decode_truncated() -> Result<()> {
        assert_eq!(Instruction::decode(&[DATA]), Err(DecodeError::Truncated));
        assert_eq!(Instruction::decode(&[]), Err(DecodeError::Truncated));

        Ok(())
    }

    #[test]
    fn test_end_wins_over_and() -> Result<()> {
        assert_eq!(alu_byte(AluOp::And, Register::R3, Register::R3), END);
        assert_eq!(Instruction::decode(&[END]), Ok(Instruction::End));

        Ok(())
    }

    #[test]
    fn test_register_from_str() -> Result<()> {
        assert_eq!("R2".parse(), Ok(Register::R2));
        assert_eq!("r3".parse(), Ok(Register::R3));
        assert_eq!("R4".parse::<Register>(), Err(RegisterError::OutOfRange));
        assert_eq!("X1".parse::<Register>(), Err(RegisterError::Malformed));
        assert_eq!("R".parse::<Register>(), Err(RegisterError::Malformed));

        Ok(())
    }

    #[test]
    fn test_condition_syntax() -> Result<()> {
        let equal = Condition {
            equal: true,
            ..Condition::default()
        };
        assert_eq!("E".parse(), Ok(equal));
        assert_eq!("0010".parse(), Ok(equal));
        assert_eq!("caez".parse::<Condition>().map(Condition::bits), Ok(0b1111));
        assert_eq!("0000".parse::<Condition>().map(Condition::bits), Ok(0));
        assert!("EE".parse::<Condition>().is_err());
        assert!("X".parse::<Condition>().is_err());
        assert_eq!(equal.to_string(), "E");
        assert_eq!(Condition::default().to_string(), "0000");

        Ok(())
    }

    #[test]
    fn test_mnemonic_lookup() -> Result<()> {
        assert_eq!("add".parse(), Ok(Mnemonic::ADD));
        assert_eq!("Jmpr".parse(), Ok(Mnemonic::JMPR));
        assert!("MARK".parse::<Mnemonic>().is_err());
        assert!(!Mnemonic::CMP.shape().is_enabled());
        assert_eq!(Mnemonic::JIF.shape().operand_count(), 2);
        assert_eq!(Mnemonic::END.shape().operand_count(), 0);
        assert_eq!(Mnemonic::DATA.shape().len(), 2);
        assert_eq!(Mnemonic::CLF.shape().len(), 1);

        Ok(())
    }

    #[test]
    fn test_display() -> Result<()> {
        use Register::*;

        assert_eq!(Instruction::<Byte>::Alu { op: AluOp::Shl, a: R0, b: R1 }.to_string(), "SHL R0 R1");
        assert_eq!(Instruction::<Byte>::Data { b: R1, value: 5 }.to_string(), "DATA R1 5");
        assert_eq!(
            Instruction::JumpIf {
                condition: Condition::from_bits(0b1001),
                target: 4u8
            }
            .to_string(),
            "JIF CZ 4"
        );

        Ok(())
    }
}
