use std::fmt;

use crate::image::Image;
use crate::isa::{AluOp, Condition, Instruction, Register};
use crate::memory::{Byte, Memory, Word};
use color_eyre::eyre::{self, WrapErr};
use log::*;

pub mod fault;

pub use fault::{Fault, FaultKind};

/// Flags written by the most recent ALU instruction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Flags {
    /// Carry out of the operation
    pub carry: bool,
    /// a > b before the operation
    pub a_larger: bool,
    /// a == b before the operation
    pub equal: bool,
    /// The result was zero
    pub zero: bool,
}

impl Flags {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// True if every flag selected by `condition` is set
    pub fn satisfies(&self, condition: Condition) -> bool {
        (!condition.carry || self.carry)
            && (!condition.a_larger || self.a_larger)
            && (!condition.equal || self.equal)
            && (!condition.zero || self.zero)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = |set: bool, letter: char| if set { letter } else { '-' };
        write!(
            f,
            "{}{}{}{}",
            letter(self.carry, 'C'),
            letter(self.a_larger, 'A'),
            letter(self.equal, 'E'),
            letter(self.zero, 'Z')
        )
    }
}

/// Computes an ALU operation on `a` (RA) and `b` (RB). Returns the value
/// written back to RB and the new flags, `None` for the disabled `CMP`.
pub fn alu(op: AluOp, a: Byte, b: Byte) -> Option<(Byte, Flags)> {
    let (result, carry) = match op {
        AluOp::Add => a.overflowing_add(b),
        AluOp::Shr => (b >> 1, b & 0b0000_0001 != 0),
        AluOp::Shl => (b << 1, b & 0b1000_0000 != 0),
        AluOp::Not => (!b, false),
        AluOp::And => (a & b, false),
        AluOp::Or => (a | b, false),
        AluOp::Xor => (a ^ b, false),
        AluOp::Cmp => return None,
    };

    let flags = Flags {
        carry,
        a_larger: a > b,
        equal: a == b,
        zero: result == 0,
    };

    Some((result, flags))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Ready to fetch the instruction at the program counter
    Fetch,
    /// An instruction was fetched and is about to run
    Execute,
    /// `END` was executed
    Halted,
    Faulted(Fault),
}

/// Why [`Processor::run`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Halted,
    Faulted(Fault),
    /// The step limit was reached before the program terminated
    StepLimit,
}

/// Emulates the CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Processor {
    /// Program counter, offset into the image of the next byte to fetch
    pub pc: Word,
    /// General purpose registers R0 to R3
    pub registers: [Byte; 4],
    pub flags: Flags,
    pub state: State,
    /// Number of executed instructions
    pub steps: usize,
}

impl Default for Processor {
    /// Initializes a new CPU
    fn default() -> Self {
        Self::new()
    }
}

impl Processor {
    /// Initializes a new CPU with zeroed registers and cleared flags
    pub fn new() -> Self {
        Self {
            pc: 0,
            registers: [0; 4],
            flags: Flags::default(),
            state: State::Fetch,
            steps: 0,
        }
    }

    pub fn register(&self, register: Register) -> Byte {
        self.registers[register.index()]
    }

    fn set_register(&mut self, register: Register, value: Byte) {
        self.registers[register.index()] = value;
    }

    /// True once the CPU halted or faulted
    pub fn is_terminated(&self) -> bool {
        matches!(self.state, State::Halted | State::Faulted(_))
    }

    fn fault(&mut self, kind: FaultKind) -> Fault {
        let fault = Fault { kind, pc: self.pc };
        error!("{}", fault);
        self.state = State::Faulted(fault);
        fault
    }

    /// Reads and decodes the instruction at the program counter
    pub fn fetch(&mut self, image: &Image) -> Result<Instruction, Fault> {
        let bytes = match image.bytes_from(self.pc) {
            Some(bytes) => bytes,
            None => {
                return Err(self.fault(FaultKind::AddressOutOfRange { address: self.pc }));
            }
        };

        match Instruction::decode(bytes) {
            Ok(instruction) => {
                self.state = State::Execute;
                Ok(instruction)
            }
            Err(err) => Err(self.fault(Fault::decode(err, self.pc).kind)),
        }
    }

    /// Moves the program counter to `next`, the address after the current
    /// instruction. Faults if that address is past the end of the 16-bit
    /// program counter.
    fn advance(&mut self, next: Option<Word>) -> Result<(), Fault> {
        match next {
            Some(next) => {
                self.pc = next;
                Ok(())
            }
            None => Err(self.fault(FaultKind::AddressOutOfRange { address: self.pc })),
        }
    }

    /// Executes a single instruction. Does nothing once halted and repeats
    /// the fault once faulted.
    pub fn execute_instruction<const S: usize>(
        &mut self,
        instruction: Instruction,
        memory: &mut Memory<S>,
    ) -> Result<(), Fault> {
        match self.state {
            State::Halted => return Ok(()),
            State::Faulted(fault) => return Err(fault),
            State::Fetch | State::Execute => {}
        }

        let pc = self.pc;
        let next = pc.checked_add(instruction.len());

        match instruction {
            Instruction::Alu { op, a, b } => {
                let (x, y) = (self.register(a), self.register(b));
                let (result, flags) = match alu(op, x, y) {
                    Some(computed) => computed,
                    None => {
                        let opcode = crate::isa::alu_byte(op, a, b);
                        return Err(self.fault(FaultKind::DisabledOpcode { opcode }));
                    }
                };

                self.advance(next)?;
                self.set_register(b, result);
                self.flags = flags;

                debug!("[0x{:02X}] {} {} {}: {} {}", pc, op.mnemonic(), x, y, result, flags);
            }
            Instruction::Store { a, b } => {
                let (value, address) = (self.register(a), self.register(b));
                if memory.read_byte(address).is_none() {
                    return Err(self.fault(FaultKind::AddressOutOfRange {
                        address: address as Word,
                    }));
                }
                self.advance(next)?;
                memory.write_byte(address, value);

                debug!("[0x{:02X}] ST {} -> [0x{:02X}]", pc, value, address);
            }
            Instruction::Load { a, b } => {
                let address = self.register(a);
                let value = match memory.read_byte(address) {
                    Some(value) => value,
                    None => {
                        return Err(self.fault(FaultKind::AddressOutOfRange {
                            address: address as Word,
                        }))
                    }
                };
                self.advance(next)?;
                self.set_register(b, value);

                debug!("[0x{:02X}] LD [0x{:02X}] -> {}: {}", pc, address, b, value);
            }
            Instruction::Data { b, value } => {
                self.advance(next)?;
                self.set_register(b, value);

                debug!("[0x{:02X}] DATA {} {}", pc, b, value);
            }
            Instruction::JumpRegister { b } => {
                self.pc = self.register(b) as Word;

                debug!("[0x{:02X}] JMPR {}: 0x{:02X}", pc, b, self.pc);
            }
            Instruction::Jump { target } => {
                self.pc = target as Word;

                debug!("[0x{:02X}] JMP 0x{:02X}", pc, target);
            }
            Instruction::JumpIf { condition, target } => {
                let taken = self.flags.satisfies(condition);
                if taken {
                    self.pc = target as Word;
                } else {
                    self.advance(next)?;
                }

                debug!(
                    "[0x{:02X}] JIF {} 0x{:02X}: flags {}, taken {}",
                    pc, condition, target, self.flags, taken
                );
            }
            Instruction::ClearFlags => {
                self.advance(next)?;
                self.flags.clear();

                debug!("[0x{:02X}] CLF", pc);
            }
            Instruction::End => {
                self.advance(next)?;
                self.state = State::Halted;

                debug!("[0x{:02X}] END", pc);
            }
        }

        self.steps += 1;

        if self.state == State::Halted {
            info!(
                "Program terminated after {} steps. Registers: {:?}, flags: {}",
                self.steps, self.registers, self.flags
            );
        } else {
            self.state = State::Fetch;
        }

        Ok(())
    }

    /// Runs one execution step. Does nothing once halted and repeats the
    /// fault once faulted.
    pub fn execute<const S: usize>(
        &mut self,
        image: &Image,
        memory: &mut Memory<S>,
    ) -> Result<(), Fault> {
        match self.state {
            State::Halted => return Ok(()),
            State::Faulted(fault) => return Err(fault),
            State::Fetch | State::Execute => {}
        }

        let instruction = self.fetch(image)?;
        self.execute_instruction(instruction, memory)
    }

    /// Runs until the program halts or faults, or until `limit` steps were
    /// executed by this call.
    pub fn run<const S: usize>(
        &mut self,
        image: &Image,
        memory: &mut Memory<S>,
        limit: Option<usize>,
    ) -> Outcome {
        let mut executed = 0;

        loop {
            match self.state {
                State::Halted => return Outcome::Halted,
                State::Faulted(fault) => return Outcome::Faulted(fault),
                State::Fetch | State::Execute => {}
            }

            if limit.map_or(false, |limit| executed >= limit) {
                warn!("Stopped after {} steps at pc 0x{:02X}", executed, self.pc);
                return Outcome::StepLimit;
            }

            if let Err(fault) = self.execute(image, memory) {
                return Outcome::Faulted(fault);
            }
            executed += 1;
        }
    }

    /// Executes at most `steps` instructions
    pub fn execute_steps<const S: usize>(
        &mut self,
        image: &Image,
        memory: &mut Memory<S>,
        steps: usize,
    ) -> Outcome {
        self.run(image, memory, Some(steps))
    }

    /// Run program until a termination condition is met
    pub fn execute_until_end<const S: usize>(
        &mut self,
        image: &Image,
        memory: &mut Memory<S>,
        limit: Option<usize>,
    ) -> eyre::Result<()> {
        match self.run(image, memory, limit) {
            Outcome::Halted => Ok(()),
            Outcome::Faulted(fault) => Err(fault).wrap_err("program faulted"),
            Outcome::StepLimit => Err(eyre::eyre!(
                "program did not halt within {} steps, pc 0x{:02X}",
                self.steps,
                self.pc
            )),
        }
    }
}
