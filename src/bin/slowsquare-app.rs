//! slowsquare-app: the packaged worker program for the slowsquare problem.
//!
//! Invoked by the worker runtime as `slowsquare-app <bundle> <input-file>`.
//! Progress and the output location are reported on stdout using the
//! `DISTCLIENT` line protocol.

use anyhow::Context;
use clap::Parser;
use distributor::slowsquare::square_slowly;
use num_bigint::BigInt;
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "slowsquare-app", about = "Slowly square a number")]
struct Cli {
    /// The application bundle (unused; passed by the worker runtime)
    bundle: PathBuf,
    /// Input file whose first line holds the number to square
    input: PathBuf,
    /// Delay between additions, in milliseconds
    #[arg(long, default_value_t = 1000)]
    delay_ms: u64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let file = std::fs::File::open(&cli.input)
        .with_context(|| format!("cannot open {}", cli.input.display()))?;
    let mut first = String::new();
    std::io::BufReader::new(file).read_line(&mut first)?;
    let number: BigInt = first
        .trim()
        .parse()
        .with_context(|| format!("input is not an integer: {:?}", first.trim()))?;

    let output = square_slowly(&number, Duration::from_millis(cli.delay_ms), |step, total| {
        if step == 0 {
            println!("DISTCLIENT STATUS 0/{total}");
        } else {
            println!("DISTCLIENT STATUS {step}");
        }
    })
    .map_err(|_| anyhow::anyhow!("{number} is too large to square step by step"))?;

    std::fs::remove_file(&cli.input)
        .with_context(|| format!("cannot remove {}", cli.input.display()))?;

    let outfile = std::env::current_dir()?.join(format!("temp-output-{}", std::process::id()));
    std::fs::write(&outfile, output.to_string())
        .with_context(|| format!("cannot write {}", outfile.display()))?;
    println!("DISTCLIENT OUTPUT {}", outfile.display());
    Ok(())
}
