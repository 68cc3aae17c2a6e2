//! Human-in-the-loop gate in front of every destructive write.
//!
//! The patcher and eraser finish all validation, describe the write they are
//! about to make as a [`PendingWrite`], and only touch the image once a
//! [`ConfirmGate`] accepts it.

use crate::error::{Result, UcodeError};
use crate::record::{MicrocodeRecord, TABLE_HEADER};
use console::style;
use dialoguer::Confirm;
use dialoguer::theme::ColorfulTheme;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// Copy an incoming record over the existing one.
    Patch { incoming: MicrocodeRecord },
    /// Overwrite the existing record with a repeated byte.
    Erase { fill: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingWrite {
    pub offset: u64,
    pub length: u64,
    /// Record currently at `offset`; `None` only for forced patches.
    pub existing: Option<MicrocodeRecord>,
    pub kind: WriteKind,
}

pub trait ConfirmGate {
    /// Blocks until the write is accepted (`true`) or refused (`false`).
    fn confirm(&mut self, pending: &PendingWrite) -> Result<bool>;
}

impl<F> ConfirmGate for F
where
    F: FnMut(&PendingWrite) -> Result<bool>,
{
    fn confirm(&mut self, pending: &PendingWrite) -> Result<bool> {
        self(pending)
    }
}

/// Prints what is about to change and asks on the terminal. Defaults to no.
#[derive(Default)]
pub struct TerminalGate {
    theme: ColorfulTheme,
}

impl TerminalGate {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfirmGate for TerminalGate {
    fn confirm(&mut self, pending: &PendingWrite) -> Result<bool> {
        match pending.kind {
            WriteKind::Patch { incoming } => {
                println!("\nOld vs new microcode:");
                println!("{}", TABLE_HEADER);
                match pending.existing {
                    Some(old) => println!("{}", old),
                    None => println!("{}", style("  -- NONE OR INVALID MICROCODE --").yellow()),
                }
                println!("{}", style(incoming).green());
            }
            WriteKind::Erase { fill } => {
                println!("\nMicrocode to erase:");
                println!("{}", TABLE_HEADER);
                if let Some(old) = pending.existing {
                    println!("{}", old);
                }
                println!("Fill byte: 0x{:02X}", fill);
            }
        }

        println!(
            "\n{} 0x{:X} bytes at 0x{:X}. This cannot be undone.",
            style("About to overwrite").red().bold(),
            pending.length,
            pending.offset
        );

        let confirmed = Confirm::with_theme(&self.theme)
            .with_prompt("Write to the ROM image?")
            .default(false)
            .interact()
            .map_err(|e| UcodeError::Io(std::io::Error::other(e)))?;

        Ok(confirmed)
    }
}
