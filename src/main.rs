//! Assembles and runs a stack VM program.
//!
//! # Usage
//! ```text
//! stackvm <program.asm>
//! ```
//!
//! Prints `Assembled N bytes.` followed by the execution trace interleaved with
//! the program's `PRINT` output. Failures are reported on stderr with exit
//! status 1.
//!
//! Limits and tracing are configured through `STACKVM_*` environment
//! variables; see [`stackvm::config`].

use stackvm::config::Config;
use stackvm::utils::log::{self, Level};
use stackvm::virtual_machine::assembler::assemble_file;
use stackvm::virtual_machine::vm::VM;
use stackvm::{debug, error, warn};
use std::env;
use std::io::{self, BufWriter, Write};
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();
    let bin = args.first().map(String::as_str).unwrap_or("stackvm");

    // Arguments after the program path are ignored.
    let Some(path) = args.get(1) else {
        print_usage(bin);
        process::exit(0);
    };

    let config = Config::from_env().unwrap_or_else(|e| {
        error!("Configuration error: {e}");
        process::exit(1);
    });
    log::set_level(config.log_level);
    log::set_timestamps(config.log_timestamp);
    debug!("{:?}", config);

    let program = assemble_file(path, config.assembler).unwrap_or_else(|e| {
        error!("{e}");
        process::exit(1);
    });
    if log::enabled(Level::Debug) {
        match program.listing() {
            Ok(listing) => debug!("Disassembly:\n{}", listing.trim_end()),
            Err(e) => warn!("Disassembly failed: {e}"),
        }
    }

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let result = writeln!(out, "Assembled {} bytes.", program.len())
        .map_err(|e| e.to_string())
        .and_then(|_| {
            VM::with_config(program.into_code(), config.vm)
                .run(&mut out)
                .map_err(|e| format!("Runtime error: {e}"))
        });

    // Program output must land before any error message.
    let flushed = out.flush();
    if let Err(msg) = result {
        error!("{msg}");
        process::exit(1);
    }
    if let Err(e) = flushed {
        error!("Failed to write output: {e}");
        process::exit(1);
    }
}

fn print_usage(program: &str) {
    println!("Usage: {program} <program.asm>");
    println!();
    println!("Integer sample: demos/sample_int.asm");
    println!("Float sample:   demos/sample_float.asm");
}
