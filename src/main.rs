use clap::{Parser, Subcommand};
use imgpipe::{Operation, SiteContext, StaticFileRegistry, Transformer, config, output, process};
use log::LevelFilter;
use std::path::PathBuf;
use std::sync::Arc;

/// Source image and option string shared by the single-request commands.
#[derive(clap::Args, Clone)]
struct RequestArgs {
    /// Source image, relative to the site root
    source: String,

    /// Comma-separated options (whitespace-separated for `magick`)
    #[arg(allow_hyphen_values = true)]
    options: String,
}

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup; called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "imgpipe")]
#[command(about = "Cached image transforms for static site builds")]
#[command(long_about = "\
Cached image transforms for static site builds

Each command transforms one source image, writes the result under the
cache directory of the site root, and prints the URL to embed. A result
that is newer than its source is reused without decoding anything.

Options:

  resize   GEOMETRY[,FORMAT[,QUALITY[,CROP[,GRAVITY]]]]   400x400>,webp,80
  format   FORMAT                                         webp
  crop     CROP[,GRAVITY]                                 16:9+0+0,center
  quality  QUALITY                                        80
  magick   TOOL ARGS...                                   \"-colorspace Gray\"

Geometry:  W  xH  WxH  P%  P%xQ%  @AREA, optionally followed by
           > (only shrink)  < (only enlarge)  ! (exact)  ^ (fill)
Crop:      WxH+X+Y (pixels or %), or W:H+X+Y (aspect ratio)
Gravity:   northwest north northeast west center east southwest south southeast

Run 'imgpipe gen-config' to generate a documented imgpipe.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Site root: sources are resolved and the cache is written here
    #[arg(long, default_value = ".", global = true)]
    site_root: PathBuf,

    /// Prefix for returned URLs
    #[arg(long, default_value = "", global = true)]
    base_url: String,

    /// Log cache decisions and list written files
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resize, optionally converting, setting quality and cropping first
    Resize(RequestArgs),
    /// Convert to another format
    Format(RequestArgs),
    /// Crop to a rectangle or aspect ratio
    Crop(RequestArgs),
    /// Re-encode at a quality (1-100)
    Quality(RequestArgs),
    /// Pass arguments straight to the external pixel tool
    Magick(RequestArgs),
    /// Run a JSON list of requests in parallel
    Batch {
        /// JSON file: [{"operation": ..., "source": ..., "options": ...}]
        requests: PathBuf,
    },
    /// Print a stock imgpipe.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .parse_default_env()
        .init();

    let operation = match &cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            return Ok(());
        }
        Command::Batch { .. } => None,
        Command::Resize(args) => Some((Operation::Resize, args)),
        Command::Format(args) => Some((Operation::Format, args)),
        Command::Crop(args) => Some((Operation::Crop, args)),
        Command::Quality(args) => Some((Operation::Quality, args)),
        Command::Magick(args) => Some((Operation::RawTool, args)),
    };

    let pipeline_config = config::load_config(&cli.site_root)?;
    let registry = Arc::new(StaticFileRegistry::new());
    let site = SiteContext::new(&cli.site_root, cli.base_url.clone(), registry.clone());
    let transformer = Transformer::new(site, &pipeline_config);

    match (operation, &cli.command) {
        (Some((operation, args)), _) => {
            let outcome = transformer.run(operation, &args.source, &args.options)?;
            println!("{}", outcome.url);
        }
        (None, Command::Batch { requests }) => {
            let requests = process::load_requests(requests)?;
            init_thread_pool(&pipeline_config.processing);
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_batch_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = process::run_batch(&transformer, &requests, Some(tx));
            printer.join().ok();
            let result = result?;
            println!("{}", output::format_cache_summary(&result.cache_stats));
        }
        (None, _) => {}
    }

    if cli.verbose && !registry.is_empty() {
        eprintln!("Generated:");
        for line in output::format_generated_files(&registry.files()) {
            eprintln!("{}", line);
        }
    }

    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: users can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
