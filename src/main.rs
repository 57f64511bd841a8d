//! VM Translator - Main Entry Point
//!
//! Translates `Nand2Tetris` VM bytecode into Hack assembly.
//!
//! # Usage
//! ```bash
//! cargo run <input.vm | directory>
//! ```
//!
//! A `.vm` path produces a sibling `.asm`; a directory path translates
//! every `.vm` file directly inside it into `<dir>/<basename>.asm`.

#![warn(clippy::all, clippy::pedantic)]

use std::env;
use std::path::Path;
use std::process;

use project8::driver;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() != 2 {
        eprintln!("Usage: {} <input.vm | directory>", args[0]);
        process::exit(1);
    }

    match driver::translate_path(Path::new(&args[1])) {
        Ok(output) => {
            println!("Translation complete: {} -> {}", args[1], output.display());
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
