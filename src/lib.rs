//! Assembler and emulator for a 4-register, 8-bit toy CPU.

pub mod assembler;
pub mod image;
pub mod isa;
pub mod memory;
pub mod processor;

use color_eyre::eyre::{Result, WrapErr};

use crate::assembler::AsmErrors;
use crate::memory::StdMem;
use crate::processor::Processor;

pub use crate::assembler::{assemble, Assembler};
pub use crate::image::Image;

/// Assembles `source`, runs it on a fresh CPU with zeroed memory and returns
/// the final CPU and memory once the program executed `END`.
pub fn assemble_and_run(source: &str, step_limit: Option<usize>) -> Result<(Processor, StdMem)> {
    let image = assemble(source)
        .map_err(AsmErrors)
        .wrap_err("failed to assemble program")?;

    let mut memory = StdMem::default();
    let mut cpu = Processor::new();
    cpu.execute_until_end(&image, &mut memory, step_limit)?;

    Ok((cpu, memory))
}
