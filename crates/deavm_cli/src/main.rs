use clap::{CommandFactory, Parser};
use tracing_subscriber::filter::EnvFilter;

use crate::cli::{Cli, DisasmModeCli, DisassembleCommand, StringFormatCli, TopLevel};

mod cli;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(TopLevel::Disassemble { command }) => match command {
            DisassembleCommand::File {
                path,
                mode,
                strings,
                offset,
                length,
            } => {
                let mode = match mode {
                    DisasmModeCli::Bytecode => deavm_lib::DisasmMode::Bytecode,
                    DisasmModeCli::Records => deavm_lib::DisasmMode::Records,
                };
                let strings = match strings {
                    StringFormatCli::Nul => deavm_lib::StringFormat::NulTerminated,
                    StringFormatCli::LengthPrefixed => deavm_lib::StringFormat::LengthPrefixed,
                };
                let bytes = match std::fs::read(&path) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        eprintln!("failed to read {path:?}: {e}");
                        std::process::exit(1);
                    }
                };
                let result = deavm_lib::byte_window(&bytes, offset, length).and_then(|window| {
                    deavm_lib::disassemble_with_options(window, deavm_lib::DisasmOptions { mode, strings })
                });
                match result {
                    Ok(out) => {
                        print!("{out}");
                    }
                    Err(e) => {
                        eprintln!("disassemble error: {e}");
                        std::process::exit(1);
                    }
                }
            }
        },
        Some(TopLevel::Completion { shell }) => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
        }
        None => {
            if let Err(e) = Cli::command().print_help() {
                eprintln!("{e}");
                std::process::exit(1);
            }
        }
    }
}
