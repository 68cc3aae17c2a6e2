use anyhow::{Context, Result};
use clap::Parser;
use clap::error::ErrorKind;
use console::style;
use std::path::Path;
use std::process::ExitCode;
use tracing::Level;

use ucpatch::cli::{normalize_args, Cli, Operation, USAGE};
use ucpatch::io::{open_writable, Image};
use ucpatch::record::TABLE_HEADER;
use ucpatch::{erase, extract, patch, ScanEvent, ScanReporter, TerminalGate, UcodeError};

fn main() -> ExitCode {
    let cli = match Cli::try_parse_from(normalize_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    init_tracing(cli.verbose);
    print_banner();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", style("error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_banner() {
    println!(
        "{}",
        style("ucpatch - Updater tool for CPU microcode in BIOS images").cyan().bold()
    );
    for line in USAGE {
        println!("{}", line);
    }
    println!();
}

fn run(cli: Cli) -> Result<()> {
    let operation = Operation::try_from(cli)?;

    match operation {
        Operation::Scan { image, start, json } => run_scan(&image, start, json),
        Operation::Extract {
            rom,
            offset,
            destination,
        } => run_extract(&rom, offset, destination.as_deref()),
        Operation::Patch {
            rom,
            rom_offset,
            update,
            update_offset,
            force,
        } => run_patch(&rom, rom_offset, &update, update_offset, force),
        Operation::Erase { rom, offset, fill } => run_erase(&rom, offset, fill),
    }
}

fn run_scan(path: &Path, start: u64, json: bool) -> Result<()> {
    let mut image = Image::open(path)?;
    let reporter = ScanReporter::new(&mut image, start)?;

    if json {
        let events = reporter.collect::<ucpatch::Result<Vec<_>>>()?;
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }

    println!("{}", TABLE_HEADER);
    let mut records = 0usize;
    for event in reporter {
        let event = event.with_context(|| format!("Scan of {} failed", path.display()))?;
        match &event {
            ScanEvent::Record(_) => {
                records += 1;
                println!("{}", event);
            }
            ScanEvent::NoTrailingGap => println!("{}", style(&event).green()),
            _ => println!("{}", style(&event).dim()),
        }
    }

    println!("\nFound {} microcode records.", style(records).green().bold());
    Ok(())
}

fn run_extract(path: &Path, offset: u64, destination: Option<&Path>) -> Result<()> {
    let mut image = Image::open(path)?;
    let extracted = extract(&mut image, offset, destination)?;

    println!("{}", TABLE_HEADER);
    println!("{}", extracted.record);
    println!("Saved to '{}'", extracted.path.display());
    Ok(())
}

fn run_patch(
    rom_path: &Path,
    rom_offset: u64,
    update_path: &Path,
    update_offset: u64,
    force: bool,
) -> Result<()> {
    println!("\tROM file:   {}", rom_path.display());
    println!("\tMicrocode:  {}", update_path.display());

    let mut rom = open_writable(rom_path)?;
    let mut update = Image::open(update_path).map_err(|e| match e {
        UcodeError::FileNotFound { path } => anyhow::anyhow!("BIN: {} not found", path.display()),
        other => other.into(),
    })?;

    patch(
        &mut rom,
        rom_offset,
        &mut update,
        update_offset,
        force,
        &mut TerminalGate::new(),
    )?;
    rom.sync_all().context("Failed to flush ROM image")?;

    println!("{}", style("DONE. Patched.").green().bold());
    Ok(())
}

fn run_erase(rom_path: &Path, offset: u64, fill: i64) -> Result<()> {
    println!("\tROM file:   {}", rom_path.display());

    let mut rom = open_writable(rom_path)?;
    let erased = erase(&mut rom, offset, fill, &mut TerminalGate::new())?;
    rom.sync_all().context("Failed to flush ROM image")?;

    println!(
        "{} 0x{:X} bytes at 0x{:X} filled with 0x{:02X}.",
        style("DONE. Erased.").green().bold(),
        erased.record.size,
        erased.record.position,
        erased.fill
    );
    Ok(())
}
