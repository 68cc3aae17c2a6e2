use crate::erase::DEFAULT_FILL;
use crate::error::UcodeError;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

/// Long flags the tool has always accepted with a single dash.
const LEGACY_FLAGS: &[&str] = &[
    "scan", "extract", "patch", "erase", "bin", "posr", "posb", "fill", "force", "json",
];

pub const USAGE: &[&str] = &[
    "  Patch:   -patch ROMFILE -bin MICROCODE -posr 0 [-posb 0] [-force]",
    "  Scan:    -scan FILE [-posr 0] [-json]",
    "  Extract: -extract ROMFILE [-bin DESTINATION] [-posr 0]",
    "  Erase:   -erase ROMFILE [-posr 0] [-fill 0xFF]",
];

#[derive(Parser, Debug)]
#[command(name = "ucpatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Updater tool for CPU microcode in BIOS images", long_about = None)]
pub struct Cli {
    /// List every microcode record in FILE and the regions between them
    #[arg(long, value_name = "FILE")]
    pub scan: Option<PathBuf>,

    /// Copy the record at -posr out of ROMFILE
    #[arg(long, value_name = "ROMFILE")]
    pub extract: Option<PathBuf>,

    /// Overwrite the record at -posr in ROMFILE with the one from -bin
    #[arg(long, value_name = "ROMFILE")]
    pub patch: Option<PathBuf>,

    /// Overwrite the record at -posr in ROMFILE with -fill bytes
    #[arg(long, value_name = "ROMFILE")]
    pub erase: Option<PathBuf>,

    /// Microcode file: destination for -extract, source for -patch
    #[arg(long, value_name = "FILE")]
    pub bin: Option<PathBuf>,

    /// Offset in the ROM image (decimal, 0x hex or 0 octal)
    #[arg(long, value_name = "N", value_parser = parse_offset)]
    pub posr: Option<u64>,

    /// Offset of the record inside the -bin file
    #[arg(long, value_name = "M", value_parser = parse_offset)]
    pub posb: Option<u64>,

    /// Byte written over an erased record
    #[arg(long, value_name = "BYTE", value_parser = parse_number, allow_hyphen_values = true)]
    pub fill: Option<i64>,

    /// Patch even if no valid record is present at -posr
    #[arg(long)]
    pub force: bool,

    /// Print the scan report as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

/// The single operation selected for this run, resolved from the flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Scan {
        image: PathBuf,
        start: u64,
        json: bool,
    },
    Extract {
        rom: PathBuf,
        offset: u64,
        destination: Option<PathBuf>,
    },
    Patch {
        rom: PathBuf,
        rom_offset: u64,
        update: PathBuf,
        update_offset: u64,
        force: bool,
    },
    Erase {
        rom: PathBuf,
        offset: u64,
        fill: i64,
    },
}

impl TryFrom<Cli> for Operation {
    type Error = UcodeError;

    /// Precedence when several operations are named: extract, scan, patch, erase.
    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let offset = cli.posr.unwrap_or(0);

        if let Some(rom) = cli.extract {
            return Ok(Operation::Extract {
                rom,
                offset,
                destination: cli.bin,
            });
        }

        if let Some(image) = cli.scan {
            return Ok(Operation::Scan {
                image,
                start: offset,
                json: cli.json,
            });
        }

        if let Some(rom) = cli.patch {
            let update = cli
                .bin
                .ok_or_else(|| UcodeError::InvalidArgument("-patch needs -bin MICROCODE".into()))?;
            let rom_offset = cli
                .posr
                .ok_or_else(|| UcodeError::InvalidArgument("-patch needs -posr N".into()))?;

            return Ok(Operation::Patch {
                rom,
                rom_offset,
                update,
                update_offset: cli.posb.unwrap_or(0),
                force: cli.force,
            });
        }

        if let Some(rom) = cli.erase {
            return Ok(Operation::Erase {
                rom,
                offset,
                fill: cli.fill.unwrap_or(DEFAULT_FILL),
            });
        }

        Err(UcodeError::NothingToDo)
    }
}

/// Rewrites `-scan`-style long flags to `--scan` so clap accepts both.
pub fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .enumerate()
        .map(|(i, arg)| {
            if i == 0 {
                return arg;
            }
            match arg.to_str().and_then(|s| s.strip_prefix('-')) {
                Some(name) if LEGACY_FLAGS.contains(&name) => OsString::from(format!("--{}", name)),
                _ => arg,
            }
        })
        .collect()
}

/// Parses an integer the way C's `%li` does: optional sign, then decimal,
/// `0x` hexadecimal or leading-zero octal.
pub fn parse_number(s: &str) -> Result<i64, String> {
    let trimmed = s.trim();
    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let (radix, digits) = if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        (16, hex)
    } else if unsigned.len() > 1 && unsigned.starts_with('0') {
        (8, &unsigned[1..])
    } else {
        (10, unsigned)
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(format!("'{}' is not a number", s));
    }

    let value = i64::from_str_radix(digits, radix).map_err(|e| format!("'{}': {}", s, e))?;
    Ok(if negative { -value } else { value })
}

pub fn parse_offset(s: &str) -> Result<u64, String> {
    let value = parse_number(s)?;
    u64::try_from(value).map_err(|_| format!("offset {} must not be negative", value))
}
