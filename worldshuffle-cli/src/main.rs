use clap::Parser;
use rand::Rng;
use std::path::PathBuf;

use worldshuffle_core::locate::locate;
use worldshuffle_core::nbt::NbtDocument;
use worldshuffle_core::{run, ShuffleConfig, ShuffleSettings};

#[derive(Debug, Parser)]
#[command(
    name = "worldshuffle",
    version,
    about = "Randomise block ids in datapack worldgen and structure files"
)]
struct Args {
    /// Datapack directory to read. It is copied, never modified.
    #[arg(long, required_unless_present = "locate")]
    input: Option<PathBuf>,

    #[arg(long, required_unless_present = "locate")]
    output: Option<PathBuf>,

    /// CSV file with an `id` column listing candidate block ids.
    #[arg(long, default_value = "block_id.csv")]
    catalog: PathBuf,

    /// Seed for all random choices. A random one is picked when omitted.
    #[arg(long)]
    seed: Option<u64>,

    /// JSON file overriding exclusions, weights, skip-list and friends.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    workers: Option<usize>,

    #[arg(long)]
    namespace: Option<String>,

    /// Leave the rewritten tree unpacked instead of zipping it.
    #[arg(long, default_value_t = false)]
    no_archive: bool,

    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Debug-only: print where the palette sits in a single structure file
    /// and exit without rewriting anything.
    #[arg(long, value_name = "NBT", hide = true)]
    locate: Option<PathBuf>,
}

fn init_logging(debug: bool) -> Result<(), log::SetLoggerError> {
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}] {} - {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
}

fn load_config(args: &Args) -> worldshuffle_core::Result<ShuffleConfig> {
    let mut config = match &args.config {
        Some(path) => ShuffleConfig::load(path)?,
        None => ShuffleConfig::default(),
    };
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(namespace) = &args.namespace {
        config.namespace = namespace.clone();
    }
    config.validate()?;
    Ok(config)
}

fn main() {
    let args = Args::parse();

    if let Err(e) = init_logging(args.debug) {
        eprintln!("Failed to initialise logging: {e}");
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    };

    // Debug path: inspect a single structure file and exit.
    if let Some(nbt_path) = args.locate.as_ref() {
        match NbtDocument::load(nbt_path) {
            Ok(doc) => {
                match locate(&doc.root, &config.opaque_branches()) {
                    Some(path) => println!("palette: {path}"),
                    None => println!("palette: not found"),
                }
            }
            Err(e) => {
                eprintln!("Failed to read {:?}: {}", nbt_path, e);
                std::process::exit(1);
            }
        }
        return;
    }

    let (Some(input_path), Some(output_path)) = (args.input, args.output) else {
        eprintln!("Error: --input and --output are required");
        std::process::exit(1);
    };

    let seed = args.seed.unwrap_or_else(|| rand::thread_rng().gen::<u64>());
    log::info!("using seed {seed}");

    let settings = ShuffleSettings {
        seed,
        input_path,
        output_path,
        catalog_path: args.catalog,
        archive: !args.no_archive,
        debug: args.debug,
        config,
    };

    match run(settings) {
        Ok(outcome) => {
            println!(
                "seed {}: {} files rewritten, {} failed, {} pool resets",
                outcome.seed,
                outcome.summary.succeeded.len(),
                outcome.summary.failed.len(),
                outcome.summary.reset_count
            );
            match &outcome.archive_path {
                Some(path) => println!("archive: {}", path.display()),
                None => println!("output: {}", outcome.staging_dir.display()),
            }
        }
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    }
}
