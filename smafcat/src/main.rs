//! CLI tool to play one MA-3 file after another.
use snafu::prelude::*;
use snafu::{report, Whatever};

use smafedit::Ma3;

#[report]
fn main() -> Result<(), Whatever> {
    let args = std::env::args().collect::<Vec<_>>();
    // Expecting 3 or 4 arguments: two input files, output file and optional gap
    if args.len() != 4 && args.len() != 5 {
        eprintln!("Usage: smafcat <first.mmf> <second.mmf> <output.mmf> [gap]");
        std::process::exit(-1);
    }
    let first = &args[1];
    let second = &args[2];
    let output = &args[3];
    let gap: u32 = match args.get(4) {
        Some(gap) => gap
            .parse()
            .whatever_context("Gap must be a number of timebase units")?,
        None => 0,
    };

    let first = Ma3::from_file(first).whatever_context("Failed to read first MA-3 file")?;
    let second = Ma3::from_file(second).whatever_context("Failed to read second MA-3 file")?;

    let music = Ma3::combine(&first, &second, gap).whatever_context("Failed to combine files")?;

    music
        .write_to_file(output)
        .whatever_context("Failed to write MA-3 file")?;
    println!("Wrote {} bytes", music.len());
    Ok(())
}
