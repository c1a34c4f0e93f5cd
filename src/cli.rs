// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(
    name = "snesforge",
    version = VERSION,
    about = "65816 assembler toolchain for SNES ROM hacking"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Assemble a root file through the external assembler and run the
    /// width-dataflow lint over the written blocks.
    Lint {
        /// Root source file (the analysis entry point).
        infile: PathBuf,
        #[arg(
            long = "config",
            value_name = "FILE",
            long_help = "Project config file. Defaults to snesforge.toml next to the input file."
        )]
        config: Option<PathBuf>,
        #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        #[arg(
            short = 'E',
            long = "error",
            value_name = "FILE",
            long_help = "Write diagnostics to FILE instead of stderr."
        )]
        error_file: Option<PathBuf>,
        #[arg(
            short = 'w',
            long = "no-warn",
            action = ArgAction::SetTrue,
            long_help = "Suppress warning diagnostics."
        )]
        no_warn: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}
