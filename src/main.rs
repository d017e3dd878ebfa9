// SNES Emulator - Headless Entry Point
//
// Loads a ROM, runs a number of frames at full speed, and writes the last
// frame as a PNG screenshot. Window management and audio belong to a host
// frontend; this binary exercises the core.

use snes_rs::emulator::{screenshot_path, Emulator};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let rom_path = match args.next() {
        Some(path) => path,
        None => {
            eprintln!("usage: snes-rs <rom.sfc> [frames]");
            std::process::exit(2);
        }
    };
    let frames: u64 = args.next().and_then(|n| n.parse().ok()).unwrap_or(60);

    let mut emulator = Emulator::new();
    emulator.load_rom(&rom_path)?;

    println!("SNES Emulator (snes-rs) v0.1.0");
    println!("==============================");
    println!();
    println!("ROM:    {}", rom_path);
    println!("Title:  {}", emulator.rom_title().unwrap_or("(unknown)"));
    println!("Frames: {}", frames);
    println!();

    for _ in 0..frames {
        emulator.run_frame();
    }

    let registers = emulator.get_registers();
    println!("Ran {} frames.", emulator.get_frame_count());
    println!(
        "CPU: PC={:02X}:{:04X} A={:04X} X={:04X} Y={:04X} SP={:04X} P={:02X} E={}",
        registers.pb,
        registers.pc,
        registers.a,
        registers.x,
        registers.y,
        registers.sp,
        registers.p,
        registers.emulation as u8
    );

    let config = emulator.config().screenshot.clone();
    std::fs::create_dir_all(&config.screenshot_directory)?;
    let path = screenshot_path(&config.screenshot_directory, config.include_timestamp);
    emulator.screenshot(&path)?;
    println!("Screenshot written to {}", path.display());

    Ok(())
}
