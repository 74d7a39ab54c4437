use std::error;
use std::fmt;

use crate::isa::DecodeError;
use crate::memory::{Byte, Word};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// The byte at the program counter matches no opcode
    InvalidOpcode { opcode: Byte },
    /// The program counter or a memory address points outside the image or memory
    AddressOutOfRange { address: Word },
    /// The byte at the program counter is the reserved `CMP` pattern
    DisabledOpcode { opcode: Byte },
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::InvalidOpcode { opcode } => write!(f, "invalid opcode `{:08b}`", opcode),
            FaultKind::AddressOutOfRange { address } => {
                write!(f, "address `0x{:02X}` is out of range", address)
            }
            FaultKind::DisabledOpcode { opcode } => {
                write!(f, "disabled opcode `{:08b}` (CMP)", opcode)
            }
        }
    }
}

/// Terminal emulation error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fault {
    pub kind: FaultKind,
    /// Address of the instruction that faulted
    pub pc: Word,
}

impl Fault {
    pub(crate) fn decode(err: DecodeError, pc: Word) -> Self {
        let kind = match err {
            DecodeError::Invalid { opcode } => FaultKind::InvalidOpcode { opcode },
            DecodeError::Disabled { opcode } => FaultKind::DisabledOpcode { opcode },
            DecodeError::Truncated => FaultKind::AddressOutOfRange {
                address: pc.saturating_add(1),
            },
        };

        Self { kind, pc }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fault [pc: 0x{:02X}]: {}", self.pc, self.kind)
    }
}

impl error::Error for Fault {}
