use color_eyre::eyre::{Result, WrapErr};

use log::LevelFilter;
use quad_cpu::assembler::AsmErrors;
use quad_cpu::memory::StdMem;
use quad_cpu::processor::Processor;
use simple_logger::SimpleLogger;

/// Upper bound on executed instructions
const STEP_LIMIT: usize = 10_000;

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    SimpleLogger::new()
        .with_level(LevelFilter::Debug)
        .init()
        .unwrap(); // logging

    let image = quad_cpu::assemble(include_str!("programs/countdown.asm"))
        .map_err(AsmErrors)
        .wrap_err("countdown.asm")?;

    let mut mem = StdMem::default();
    let mut cpu = Processor::new();

    cpu.execute_until_end(&image, &mut mem, Some(STEP_LIMIT))?;
    mem.dump();

    Ok(())
}
