//! `faro-cli` — a read-only dump tool layered entirely on the public viewer
//! interface (§6.5, §2.1 "a minimal developer-facing CLI"). It does no log
//! sink configuration and carries no daemon mode; it exists purely so a
//! developer can eyeball a file of framed records during debugging.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use faro::{decode_record, framed_len, HumanView};

#[derive(Parser, Debug)]
#[command(name = "faro-cli", version, about = "Inspect faro's framed log records")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pretty-print every record in a file of back-to-back framed records.
    Dump {
        /// Path to read, or "-" for standard input.
        path: String,

        /// Skip the CRC32C check and decode best-effort instead of stopping
        /// at the first corrupted record.
        #[arg(long)]
        safe_view: bool,

        /// Render level names with ANSI color.
        #[arg(long)]
        color: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("faro-cli: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> io::Result<()> {
    match cli.command {
        Command::Dump { path, safe_view, color } => dump(&path, safe_view, color),
    }
}

fn dump(path: &str, safe_view: bool, color: bool) -> io::Result<()> {
    let bytes = read_input(path)?;
    let mut rest = bytes.as_slice();
    let mut index = 0usize;

    while !rest.is_empty() {
        let len = match framed_len(rest) {
            Ok(len) => len,
            Err(err) => {
                eprintln!("faro-cli: record {index}: {err}; stopping");
                break;
            }
        };
        let (record, tail) = rest.split_at(len);

        let mut view = if color { HumanView::with_color(true) } else { HumanView::new() };
        match decode_record(record, &mut view, safe_view) {
            Ok(()) => println!("{}", view.finish()),
            Err(err) => eprintln!("faro-cli: record {index}: {err}"),
        }

        rest = tail;
        index += 1;
    }

    Ok(())
}

fn read_input(path: &str) -> io::Result<Vec<u8>> {
    if path == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        Ok(buf)
    } else {
        fs::read(PathBuf::from(path))
    }
}
