//! Reconstruct a region of a single image.
//!
//! Usage:
//! ```sh
//! cargo run --example clean_image -- input.jpg output.png 10,10,120,40 [inpaint|crop|blur]
//! ```

use std::env;
use std::process;

use watermark_surgeon::{Rect, Strategy, WatermarkEngine};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        eprintln!("Usage: {} <input> <output> <x,y,w,h> [inpaint|crop|blur]", args[0]);
        process::exit(1);
    }

    let region: Rect = match args[3].parse() {
        Ok(region) => region,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };
    let strategy = match args.get(4).map(String::as_str) {
        None | Some("inpaint") => Strategy::Inpaint,
        Some("crop") => Strategy::Crop,
        Some("blur") => Strategy::Blur,
        Some(other) => {
            eprintln!("Error: unknown method '{other}'");
            process::exit(1);
        }
    };

    let engine = WatermarkEngine::new();
    let result = engine.process_image_file(args[1].as_ref(), args[2].as_ref(), region, strategy);

    if result.skipped {
        println!("Skipped: {}", result.message);
    } else if result.success {
        println!("Done: {}", args[2]);
    } else {
        eprintln!("Error: {}", result.message);
        process::exit(1);
    }
}
