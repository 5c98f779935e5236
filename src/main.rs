use clap::{Parser, Subcommand};
use imageprinter::options::OptionSet;
use imageprinter::warm::WarmJob;
use imageprinter::{audit, config, output, warm};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Image options given on the command line.
#[derive(clap::Args, Clone)]
struct OptionArgs {
    /// Image option, repeatable (e.g. -o width=200 -o crop=false)
    #[arg(short = 'o', long = "option", value_name = "KEY=VALUE", value_parser = parse_option)]
    options: Vec<(String, String)>,
}

impl OptionArgs {
    fn to_options(&self) -> OptionSet {
        self.options.iter().cloned().collect()
    }
}

fn parse_option(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))
}

#[derive(Parser)]
#[command(name = "imageprinter")]
#[command(about = "Request-triggered image resizing with an on-disk cache")]
#[command(long_about = "\
Request-triggered image resizing with an on-disk cache

Variant URLs carry their rendering options in the file name:

  /ip/large/image__width-200,height-100,quality-80,crop-true.jpg
   │   │     │     └─ options, key-value pairs joined by ','
   │   │     └─ source base name, then the '__' marker
   │   └─ source directory (relative to `source`)
   └─ prefix

The first request renders the variant into `destination` under the same
relative path; later requests are served from disk until the source
changes.

Run 'imageprinter gen-config' to generate a documented imageprinter.toml.")]
#[command(version)]
struct Cli {
    /// Config file [default: imageprinter.toml]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a variant request path, rendering it if needed
    Fetch {
        /// Request path, e.g. /ip/large/image__width-200.jpg
        path: String,
        /// Also print the response headers
        #[arg(long)]
        headers: bool,
    },
    /// Print the URL of a variant
    Link {
        /// Source path relative to the source directory
        source: String,
        #[command(flatten)]
        options: OptionArgs,
    },
    /// Pre-render variants in parallel
    Warm {
        /// Source paths relative to the source directory
        #[arg(required = true)]
        sources: Vec<String>,
        #[command(flatten)]
        options: OptionArgs,
    },
    /// Classify cache entries as valid, stale, empty, orphaned or foreign
    Audit {
        /// Delete stale, empty and orphaned entries
        #[arg(long)]
        prune: bool,
        /// With --prune, also delete files that are not variants
        #[arg(long, requires = "prune")]
        foreign: bool,
    },
    /// Print a stock imageprinter.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.config;

    match cli.command {
        Command::Fetch { path, headers } => {
            let printer = load_config(config_path.as_deref())?.printer()?;
            let result = printer.resolve_request(&path);
            output::print_fetch(&path, &result);
            if result.is_err() {
                std::process::exit(1);
            }
            if headers {
                output::print_response(&printer.handle(&path));
            }
        }
        Command::Link { source, options } => {
            let link = load_config(config_path.as_deref())?
                .link_generator()
                .link(&source, Some(&options.to_options()))?;
            println!("{}", link);
        }
        Command::Warm { sources, options } => {
            let config = load_config(config_path.as_deref())?;
            let printer = config.printer()?;
            init_thread_pool(&config.processing);
            let options = options.to_options().with_defaults(&config.image.to_options());
            let jobs = sources
                .into_iter()
                .map(|source| WarmJob::new(source, options.clone()))
                .collect();
            let report = warm::warm(&printer, jobs);
            output::print_warm(&report, printer.destination());
            if report.stats.failed > 0 {
                std::process::exit(1);
            }
        }
        Command::Audit { prune, foreign } => {
            let printer = load_config(config_path.as_deref())?.printer()?;
            let report = audit::audit(&printer)?;
            let pruned = if prune {
                Some(audit::prune(&printer, &report, foreign)?)
            } else {
                None
            };
            output::print_audit(&report, pruned);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load `path`, or `imageprinter.toml` in the working directory when none
/// was given. An explicit path must exist; the default may be absent.
fn load_config(path: Option<&Path>) -> Result<config::PrinterConfig, Box<dyn std::error::Error>> {
    let path = match path {
        Some(path) if !path.exists() => {
            return Err(format!("config file not found: {}", path.display()).into());
        }
        Some(path) => path,
        None => Path::new(config::CONFIG_FILE),
    };
    let config = config::load_config(path)?;
    debug!(config = %path.display(), "loaded config");
    Ok(config)
}

/// Log to stderr: 0 = warn, 1 = info, 2+ = debug. `RUST_LOG` wins when set.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "imageprinter=warn",
        1 => "imageprinter=info",
        _ => "imageprinter=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
