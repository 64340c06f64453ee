//! CLI tool to print the score header and chunk layout of an MA-3 file.
use snafu::prelude::*;
use snafu::{report, Whatever};

use smafedit::Ma3;

#[report]
fn main() -> Result<(), Whatever> {
    let args = std::env::args().collect::<Vec<_>>();
    if args.len() != 2 {
        eprintln!("Usage: smafinfo <input.mmf>");
        std::process::exit(-1);
    }
    let input = &args[1];

    let ma3 = Ma3::from_file(input).whatever_context("Failed to read MA-3 file")?;
    let layout = ma3.layout().whatever_context("Failed to parse MA-3 file")?;
    let header = ma3
        .score_header()
        .whatever_context("Failed to parse score header")?;

    println!("File size: {} bytes", ma3.len());
    if ma3.len() > layout.container_end {
        println!(
            "  {} bytes past the end of the container",
            ma3.len() - layout.container_end
        );
    }
    println!("MMMD length: {}", layout.file_size.value);
    println!("MTR* length: {}", layout.score_size.value);
    println!(
        "Mtsq length: {} (offset {})",
        layout.sequence_size.value, layout.sequence_start
    );
    println!("Format: {:?}", header.format);
    println!("Sequence type: {}", header.sequence_type);
    match (header.timebase.duration_ms(), header.timebase.gatetime_ms()) {
        (Some(d), Some(g)) => println!("Timebase: {d} ms (duration), {g} ms (gatetime)"),
        _ => println!("Timebase: {:?} (invalid)", header.timebase),
    }

    if header.format.is_mobile() {
        for (channel, status) in header.channels.iter().enumerate() {
            println!(
                "Channel {channel:2}: {:?}, vibration {}, LED {}, {:?}",
                status.key_control(),
                status.vibration(),
                status.led(),
                status.channel_type()
            );
        }
    }

    let crc_ok = ma3.verify_crc16().whatever_context("Failed to check CRC")?;
    println!("CRC: {}", if crc_ok { "OK" } else { "MISMATCH" });
    Ok(())
}
