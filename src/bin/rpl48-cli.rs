//! Line-oriented front end for the engine: feed expressions on stdin or
//! via `--eval`, print the resulting stack.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use clap::Parser;

use rpl48_core::{render_to_string, run_line, Runtime, Settings};

#[derive(Parser)]
#[command(name = "rpl48-cli", about = "RPL calculator engine shell")]
struct Args {
    /// Arena size in bytes.
    #[arg(long, default_value_t = 65536)]
    memory: usize,

    /// Settings file (JSON); created on exit if it does not exist.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Evaluate one expression and print the stack instead of reading
    /// stdin.
    #[arg(short = 'e', long)]
    eval: Option<String>,

    /// Stack levels printed after each line.
    #[arg(long, default_value_t = 4)]
    levels: usize,
}

fn print_stack(rt: &Runtime, levels: usize) {
    let depth = rt.depth();
    for level in (0..depth.min(levels)).rev() {
        if let Some(obj) = rt.peek(level) {
            println!("{}: {}", level + 1, render_to_string(rt, obj));
        }
    }
}

fn feed(rt: &mut Runtime, line: &str, levels: usize) {
    if let Err(err) = run_line(rt, line) {
        eprintln!("error: {err}");
        rt.clear_error();
    }
    print_stack(rt, levels);
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let mut rt = Runtime::new(args.memory);

    if let Some(path) = &args.settings {
        if path.exists() {
            let text = std::fs::read_to_string(path)?;
            rt.settings = serde_json::from_str::<Settings>(&text)?;
        }
    }

    if let Some(expr) = &args.eval {
        feed(&mut rt, expr, args.levels);
    } else {
        let stdin = std::io::stdin();
        let mut out = std::io::stdout();
        loop {
            write!(out, "> ")?;
            out.flush()?;
            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                break;
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "quit" || line == "exit" {
                break;
            }
            feed(&mut rt, line, args.levels);
        }
    }

    if let Some(path) = &args.settings {
        std::fs::write(path, serde_json::to_string_pretty(&rt.settings)?)?;
    }
    Ok(())
}
