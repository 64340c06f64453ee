//! CLI tool to remove the padding after the last note of an MA-3 file.
use snafu::prelude::*;
use snafu::{report, Whatever};

use smafedit::Ma3;

#[report]
fn main() -> Result<(), Whatever> {
    let args = std::env::args().collect::<Vec<_>>();
    // Expecting 2 arguments: input file and output file
    if args.len() != 3 {
        eprintln!("Usage: smafnop <input.mmf> <output.mmf>");
        std::process::exit(-1);
    }
    let input = &args[1];
    let output = &args[2];

    let mut ma3 = Ma3::from_file(input).whatever_context("Failed to read MA-3 file")?;
    ma3.shrink_to_fit().whatever_context("Failed to parse MA-3 file")?;
    let before = ma3.len();

    ma3.remove_nop().whatever_context("Failed to remove padding")?;

    if ma3.len() == before {
        eprintln!("No trailing padding found");
    }

    ma3.write_to_file(output).whatever_context("Failed to write MA-3 file")?;
    println!("Removed {} bytes", before - ma3.len());
    Ok(())
}
