use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum, builder::{Styles, styling::{AnsiColor, Effects}}, crate_description, crate_name, crate_version};
use clap_complete::Shell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DisasmModeCli {
    Bytecode,
    Records,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StringFormatCli {
    Nul,
    LengthPrefixed,
}

#[derive(Parser)]
#[command(name = crate_name!(),
    version = crate_version!(),
    about = crate_description!(),
    styles = Styles::styled()
        .header(AnsiColor::BrightGreen.on_default() | Effects::BOLD | Effects::UNDERLINE)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Cyan.on_default()))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<TopLevel>,
}

#[derive(Subcommand)]
pub enum TopLevel {
    /// Disassembles an AVM1 action stream
    Disassemble {
        #[command(subcommand)]
        command: DisassembleCommand,
    },
    /// Generate shell completion
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum DisassembleCommand {
    /// Disassembles the action stream stored in a file
    File {
        /// Path to a file holding raw action records (e.g. a DoAction tag body)
        path: PathBuf,

        /// Output mode
        #[arg(long, value_enum, default_value_t = DisasmModeCli::Bytecode)]
        mode: DisasmModeCli,

        /// How strings inside action payloads are stored
        #[arg(long, value_enum, default_value_t = StringFormatCli::Nul)]
        strings: StringFormatCli,

        /// Byte offset of the first action in the file
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Number of bytes to decode (default: up to the end of the file)
        #[arg(long)]
        length: Option<usize>,
    },
}
