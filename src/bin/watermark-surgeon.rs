use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};

use watermark_surgeon::{
    default_document_output, default_image_output, summarize_document, DocumentMode,
    ProcessResult, ReconstructOptions, Rect, Session, Strategy, StripOptions, WatermarkEngine,
};

#[derive(Parser)]
#[command(
    name = "watermark-surgeon",
    about = "Remove watermarks from images and PPTX presentations",
    version,
    after_help = "Images: the selected region is reconstructed and the result saved as PNG.\n\
                  Presentations: watermark shapes, tables, backgrounds or vendor logos are\n\
                  deleted from the slide XML; every other archive entry is kept as is."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct OutputArgs {
    /// Enable verbose output (debug logging and the full removal log)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Reconstruct a region of an image (or of every image in a directory)
    Image {
        /// Input image file or directory
        input: PathBuf,

        /// Region to reconstruct as X,Y,WIDTH,HEIGHT in image pixels
        #[arg(short, long)]
        region: Rect,

        /// Reconstruction method
        #[arg(short, long, value_enum, default_value = "inpaint")]
        method: Strategy,

        /// Inpaint sampling radius
        #[arg(long, default_value_t = watermark_surgeon::region::DEFAULT_INPAINT_RADIUS)]
        inpaint_radius: u32,

        /// Blur neighbourhood radius
        #[arg(long, default_value_t = watermark_surgeon::region::DEFAULT_BLUR_RADIUS)]
        blur_radius: u32,

        /// Output file or directory (default: no-watermark-{name}.png)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Strip watermark shapes, tables and backgrounds from slides
    Pptx {
        /// Input .pptx file
        input: PathBuf,

        /// Remove watermark text shapes and tables
        #[arg(long)]
        text: bool,

        /// Remove image watermarks (currently has no effect on slides)
        #[arg(long)]
        image: bool,

        /// Remove slide backgrounds
        #[arg(long)]
        background: bool,

        /// Output file (default: {name}-no-watermark.pptx)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Remove a generator's injected logo and link from slide layouts
    Vendor {
        /// Input .pptx file
        input: PathBuf,

        /// Output file (default: {name}-no-watermark.pptx)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    let opts = cli.output;
    init_logging(&opts);

    let results = match cli.command {
        Command::Image {
            input,
            region,
            method,
            inpaint_radius,
            blur_radius,
            output,
        } => {
            let engine = WatermarkEngine::with_options(ReconstructOptions {
                inpaint_radius,
                blur_radius,
            });
            run_image(&engine, &input, output, region, method)
        }
        Command::Pptx {
            input,
            text,
            image,
            background,
            output,
        } => {
            let options = StripOptions {
                text,
                image,
                background,
            };
            if options.is_empty() {
                eprintln!("Error: Select at least one of --text, --image, --background");
                process::exit(1);
            }
            vec![run_document(&input, output, DocumentMode::Generic(options), &opts)]
        }
        Command::Vendor { input, output } => {
            vec![run_document(&input, output, DocumentMode::Vendor, &opts)]
        }
    };

    let mut success_count = 0u32;
    let mut skip_count = 0u32;
    let mut fail_count = 0u32;

    for r in &results {
        print_result(r, &opts);
        if r.skipped {
            skip_count += 1;
        } else if r.success {
            success_count += 1;
        } else {
            fail_count += 1;
        }
    }

    if results.len() > 1 && !opts.quiet {
        eprintln!();
        eprint!("[Summary] Processed: {success_count}");
        if skip_count > 0 {
            eprint!(", Skipped: {skip_count}");
        }
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    if fail_count > 0 {
        process::exit(1);
    }
}

fn init_logging(opts: &OutputArgs) {
    let level = if opts.quiet {
        "error"
    } else if opts.verbose {
        "debug"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run_image(
    engine: &WatermarkEngine,
    input: &Path,
    output: Option<PathBuf>,
    region: Rect,
    method: Strategy,
) -> Vec<ProcessResult> {
    if !input.exists() {
        eprintln!("Error: Input path does not exist: {}", input.display());
        process::exit(1);
    }

    if input.is_dir() {
        let Some(output_dir) = output else {
            eprintln!("Error: Output directory is required for batch processing");
            eprintln!("Usage: watermark-surgeon image <input_dir> -r X,Y,W,H -o <output_dir>");
            process::exit(1);
        };
        if let Err(e) = std::fs::create_dir_all(&output_dir) {
            eprintln!("Error: Failed to create output directory: {e}");
            process::exit(1);
        }
        return engine.process_directory(input, &output_dir, region, method);
    }

    let output = output.unwrap_or_else(|| default_image_output(input));
    vec![engine.process_image_file(input, &output, region, method)]
}

fn run_document(
    input: &Path,
    output: Option<PathBuf>,
    mode: DocumentMode,
    opts: &OutputArgs,
) -> ProcessResult {
    if !opts.quiet {
        if let Ok(summary) = std::fs::read(input)
            .map_err(watermark_surgeon::Error::from)
            .and_then(|bytes| summarize_document(&bytes))
        {
            #[allow(clippy::cast_precision_loss)]
            let mb = summary.size as f64 / 1024.0 / 1024.0;
            eprintln!(
                "{}: {} slide(s), {mb:.2} MB",
                input.display(),
                summary.slides.len()
            );
        }
    }

    let output = output.unwrap_or_else(|| default_document_output(input));
    let mut session = Session::new();
    let quiet = opts.quiet;
    let result = WatermarkEngine::new().process_document_file(
        &mut session,
        input,
        &output,
        mode,
        |p| {
            if !quiet {
                eprint!("\rProcessing... {:3.0}%", p.percent());
                if p.done == p.total {
                    eprintln!();
                }
            }
        },
    );

    if opts.verbose {
        for entry in session.log().entries() {
            eprintln!("  {entry}");
        }
    }
    result
}

fn print_result(result: &ProcessResult, opts: &OutputArgs) {
    if opts.quiet && result.success {
        return;
    }

    let filename = result.path.file_name().map_or_else(
        || result.path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );

    if result.skipped {
        if !opts.quiet {
            eprintln!("[SKIP] {filename}: {}", result.message);
        }
    } else if result.success {
        if !opts.quiet {
            match &result.output {
                Some(out) => eprintln!("[OK] {filename} -> {}", out.display()),
                None => eprintln!("[OK] {filename}"),
            }
        }
    } else {
        eprintln!("[FAIL] {filename}: {}", result.message);
    }

    if opts.verbose && !result.message.is_empty() {
        eprintln!("  -> {}", result.message);
    }
}
