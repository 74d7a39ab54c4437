use color_eyre::eyre::{Result, WrapErr};

use log::LevelFilter;
use quad_cpu::assembler::{AsmErrors, Assembler, Options};
use quad_cpu::memory::StdMem;
use quad_cpu::processor::Processor;
use simple_logger::SimpleLogger;

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .unwrap(); // logging

    let assembler = Assembler::new(Options {
        append_end: true,
        ..Options::default()
    });
    let image = assembler
        .assemble(include_str!("programs/multiply.asm"))
        .map_err(AsmErrors)
        .wrap_err("multiply.asm")?;

    print!("{}", image.to_listing());

    for (offset, instruction) in image.disassemble() {
        match instruction {
            Ok(instruction) => println!("0x{:02X}: {}", offset, instruction),
            Err(err) => println!("0x{:02X}: ?? {}", offset, err),
        }
    }

    let mut mem = StdMem::default();
    let mut cpu = Processor::new();
    cpu.execute_until_end(&image, &mut mem, Some(1_000))?;

    println!("R2 = {}", cpu.registers[2]);

    Ok(())
}
