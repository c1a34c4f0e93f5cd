// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for snesforge.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use serde_json::json;

use snesforge::cli::{Cli, Command, OutputFormat};
use snesforge::core::assembler::{
    AssembleOptions, AssemblerEngine, CliAssembler, Diagnostic, Severity,
};
use snesforge::core::config::{load_config_if_exists, Config, CONFIG_FILE_NAME};
use snesforge::m65816::lint::{run_lint, LintOptions};

struct DiagnosticsSink {
    writer: Box<dyn Write>,
}

impl DiagnosticsSink {
    fn from_target(target: Option<&Path>) -> io::Result<Self> {
        let writer: Box<dyn Write> = match target {
            None => Box::new(io::stderr()),
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(path)?;
                Box::new(file)
            }
        };
        Ok(Self { writer })
    }

    fn emit(&mut self, diag: &Diagnostic, format: OutputFormat) {
        let line = match format {
            OutputFormat::Json => json!({
                "severity": match diag.severity {
                    Severity::Error => "error",
                    Severity::Warning => "warning",
                },
                "message": diag.message,
                "file": diag.filename,
                "line": diag.line,
                "column": diag.column,
            })
            .to_string(),
            OutputFormat::Text => {
                let severity = match diag.severity {
                    Severity::Error => "error",
                    Severity::Warning => "warning",
                };
                match (&diag.filename, diag.line) {
                    (Some(file), line) if line > 0 => {
                        format!("{severity}: {file}:{line}: {}", diag.message)
                    }
                    (Some(file), _) => format!("{severity}: {file}: {}", diag.message),
                    (None, _) => format!("{severity}: {}", diag.message),
                }
            }
        };
        let _ = writeln!(self.writer, "{line}");
    }
}

fn resolve_config(infile: &Path, explicit: Option<&Path>) -> (Config, PathBuf) {
    if let Some(path) = explicit {
        let config = load_config_if_exists(path).unwrap_or_default();
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        return (config, dir);
    }
    let dir = infile.parent().map(Path::to_path_buf).unwrap_or_default();
    let candidate = dir.join(CONFIG_FILE_NAME);
    (
        load_config_if_exists(&candidate).unwrap_or_default(),
        dir,
    )
}

fn run_lint_command(
    infile: &Path,
    config_path: Option<&Path>,
    format: OutputFormat,
    error_file: Option<&Path>,
    no_warn: bool,
) -> io::Result<ExitCode> {
    let (config, config_dir) = resolve_config(infile, config_path);

    let mut options = AssembleOptions {
        patch_path: infile.to_path_buf(),
        ..AssembleOptions::default()
    };
    for raw in &config.include_paths {
        let path = PathBuf::from(raw);
        options.include_paths.push(if path.is_absolute() {
            path
        } else {
            config_dir.join(path)
        });
    }
    for define in &config.defines {
        match define.split_once('=') {
            Some((name, value)) => options
                .defines
                .push((name.to_string(), value.to_string())),
            None => options.defines.push((define.clone(), String::new())),
        }
    }
    options.std_includes_path = config.std_includes_path.as_ref().map(PathBuf::from);
    options.std_defines_path = config.std_defines_path.as_ref().map(PathBuf::from);
    if let Some(rom) = &config.rom_path {
        let rom_path = PathBuf::from(rom);
        let rom_path = if rom_path.is_absolute() {
            rom_path
        } else {
            config_dir.join(rom_path)
        };
        if let Ok(data) = fs::read(&rom_path) {
            options.rom_data = data;
        }
    }
    if options.rom_data.is_empty() {
        if let Some(size) = config.rom_size {
            if size > 0 {
                options.rom_data = vec![0; size as usize];
            }
        }
    }

    let engine = CliAssembler::new(config.assembler_path.as_ref().map(PathBuf::from));
    let result = engine.assemble(&options);

    // The lint command enables every check unless the config says no.
    let lint_options = LintOptions {
        default_m_width_bytes: config.default_m_width.unwrap_or(1),
        default_x_width_bytes: config.default_x_width.unwrap_or(1),
        warn_unknown_width: config.warn_unknown_width.unwrap_or(true),
        warn_branch_outside_bank: config.warn_branch_outside_bank.unwrap_or(true),
        warn_org_collision: config.warn_org_collision.unwrap_or(true),
    };
    let lint_result = run_lint(&result, &lint_options);

    let mut sink = DiagnosticsSink::from_target(error_file)?;
    let mut has_errors = !result.success;
    for diag in result.diagnostics.iter().chain(&lint_result.diagnostics) {
        if diag.severity == Severity::Warning && no_warn {
            continue;
        }
        if diag.severity == Severity::Error {
            has_errors = true;
        }
        sink.emit(diag, format);
    }

    Ok(if has_errors {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Lint {
            infile,
            config,
            format,
            error_file,
            no_warn,
        } => match run_lint_command(
            &infile,
            config.as_deref(),
            format,
            error_file.as_deref(),
            no_warn,
        ) {
            Ok(code) => code,
            Err(err) => {
                eprintln!("snesforge: {err}");
                ExitCode::FAILURE
            }
        },
    }
}
