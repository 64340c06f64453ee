//! CLI tool to change the timebase and tempo of an MA-3 file.
use snafu::prelude::*;
use snafu::{report, Whatever};

use smafedit::{Ma3, Timebase, TimebaseCode};

#[report]
fn main() -> Result<(), Whatever> {
    let args = std::env::args().collect::<Vec<_>>();
    // Expecting 3 or 4 arguments: input file, output file, timebase and optional ratio
    if args.len() != 4 && args.len() != 5 {
        eprintln!("Usage: smaftempo <input.mmf> <output.mmf> <timebase-ms> [ratio]");
        std::process::exit(-1);
    }
    let input = &args[1];
    let output = &args[2];
    let millis: u32 = args[3]
        .parse()
        .whatever_context("Timebase must be a number of milliseconds")?;
    let Some(code) = TimebaseCode::from_millis(millis) else {
        whatever!("Unsupported timebase {millis} ms (expected 1, 2, 4, 5, 10, 20, 40 or 50)");
    };
    let ratio: f64 = match args.get(4) {
        Some(ratio) => ratio.parse().whatever_context("Ratio must be a number")?,
        None => 1.,
    };

    let ma3 = Ma3::from_file(input).whatever_context("Failed to read MA-3 file")?;
    let before = ma3.timebase().whatever_context("Failed to parse MA-3 file")?;

    let ma3 = ma3
        .change_tempo(Timebase::uniform(code), ratio)
        .whatever_context("Failed to change tempo")?;

    ma3.write_to_file(output)
        .whatever_context("Failed to write MA-3 file")?;
    println!(
        "Changed timebase from {:?} to {millis} ms at {ratio}x",
        before.duration
    );
    Ok(())
}
