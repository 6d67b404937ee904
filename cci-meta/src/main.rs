//! cci-meta CLI
//!
//! Command-line interface for catalog generation and recipe diagnostics.

use std::{path::PathBuf, sync::LazyLock, time::Instant};

use cci_parser::RecipeSource;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use cci_meta::{
    catalog::Catalog,
    config::{
        Settings, DEFAULT_PATTERN, DEFAULT_PROFILE, DEFAULT_RECIPES_DIR, DEFAULT_REMOTE,
        DEFAULT_SCRATCH_DIR,
    },
    conan::{DEFAULT_INSPECT_TIMEOUT, DEFAULT_INSTALL_TIMEOUT, DEFAULT_PROGRAM},
    corpus::CorpusWalker,
    ConanCli, Error, Pipeline, Result,
};

static CHECK_MARK: LazyLock<colored::ColoredString> =
    LazyLock::new(|| "✔".bright_green().bold());
static CROSS_MARK: LazyLock<colored::ColoredString> =
    LazyLock::new(|| "〤".bright_red().bold());

#[derive(Parser)]
#[command(name = "cci-meta")]
#[command(about = "Catalog generator for ConanCenter recipes", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the catalog of every recipe in the corpus
    Generate {
        /// Recipe corpus (the recipes/ directory of conan-center-index)
        #[arg(short, long, env = "CCI_RECIPES", default_value = DEFAULT_RECIPES_DIR)]
        recipes: PathBuf,

        /// Remote to list versions from and install packages with
        #[arg(long, default_value = DEFAULT_REMOTE)]
        remote: String,

        /// Reference pattern listed on the remote
        #[arg(long, default_value = DEFAULT_PATTERN)]
        pattern: String,

        /// conan executable
        #[arg(long, env = "CONAN_BIN", default_value = DEFAULT_PROGRAM)]
        conan: PathBuf,

        /// Host profile for install-based resolution
        #[arg(long, default_value = DEFAULT_PROFILE)]
        host_profile: String,

        /// Build profile for install-based resolution
        #[arg(long, default_value = DEFAULT_PROFILE)]
        build_profile: String,

        /// Parent directory of install output folders
        #[arg(long, default_value = DEFAULT_SCRATCH_DIR)]
        scratch_dir: PathBuf,

        /// Keep install output folders after resolution
        #[arg(long)]
        keep_scratch: bool,

        /// Number of concurrent installs
        #[arg(short, long, default_value = "1")]
        parallel: usize,

        /// Timeout for conan inspect (in seconds)
        #[arg(long, default_value_t = DEFAULT_INSPECT_TIMEOUT)]
        inspect_timeout: u64,

        /// Timeout for each conan install (in seconds)
        #[arg(long, default_value_t = DEFAULT_INSTALL_TIMEOUT)]
        install_timeout: u64,

        /// Packages resolved by installing, whatever their recipe declares
        #[arg(short, long, num_args = 1..)]
        force: Vec<String>,

        /// Output JSON file (stdout if not provided)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write a JSON report of per-package outcomes
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Print what the static extractor finds in one recipe
    Extract {
        /// Path to conanfile.py
        recipe: PathBuf,
    },

    /// List the recipe selected for every package of the corpus
    Walk {
        /// Recipe corpus
        #[arg(short, long, env = "CCI_RECIPES", default_value = DEFAULT_RECIPES_DIR)]
        recipes: PathBuf,
    },
}

fn setup_logging(level: &str) {
    let level = match level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    match cli.command {
        Commands::Generate {
            recipes,
            remote,
            pattern,
            conan,
            host_profile,
            build_profile,
            scratch_dir,
            keep_scratch,
            parallel,
            inspect_timeout,
            install_timeout,
            force,
            output,
            report,
        } => {
            let settings = Settings {
                recipes,
                remote,
                pattern,
                force,
                host_profile,
                build_profile,
                scratch_dir,
                keep_scratch,
                parallel,
            };
            let conan = ConanCli::new(conan)
                .with_inspect_timeout(inspect_timeout)
                .with_install_timeout(install_timeout);
            cmd_generate(conan, settings, output, report).await
        }
        Commands::Extract { recipe } => cmd_extract(recipe),
        Commands::Walk { recipes } => cmd_walk(recipes),
    }
}

async fn cmd_generate(
    conan: ConanCli,
    settings: Settings,
    output: Option<PathBuf>,
    report: Option<PathBuf>,
) -> Result<()> {
    if which::which(conan.program()).is_err() {
        return Err(Error::Other(format!(
            "{} is unavailable. Please install conan 2 to continue.",
            conan.program().display()
        )));
    }

    let now = Instant::now();
    let pipeline = Pipeline::new(conan, settings);
    let catalog = pipeline.run().await.inspect_err(|e| error!("{}", e))?;

    let json = catalog.to_json()?;
    match &output {
        Some(path) => {
            std::fs::write(path, json)?;
            info!("Wrote {} packages -> {:?}", catalog.len(), path);
        }
        None => println!("{}", json),
    }

    if let Some(path) = &report {
        std::fs::write(path, serde_json::to_string_pretty(&catalog.report())?)?;
        info!("Wrote outcome report -> {:?}", path);
    }

    print_summary(&catalog, now);
    Ok(())
}

fn print_summary(catalog: &Catalog, started: Instant) {
    let report = catalog.report();

    eprintln!();
    eprintln!(
        "[{}] {} packages resolved",
        *CHECK_MARK,
        report.successes
    );
    eprintln!(
        "[{}] {} packages unresolved",
        *CROSS_MARK,
        report.failures.len()
    );
    for name in &report.failures {
        let reason = report.reasons.get(name).map(String::as_str).unwrap_or("unknown");
        eprintln!("    {} -> {}", name.bold(), reason.red());
    }
    eprintln!(
        "[{}] Processed {} package(s) in {:#?}",
        "+".bright_blue().bold(),
        report.total,
        started.elapsed()
    );
}

fn cmd_extract(recipe: PathBuf) -> Result<()> {
    let content = std::fs::read_to_string(&recipe)?;
    let source = RecipeSource::parse(content)?;

    let extracted = serde_json::json!({
        "basic_info": source.basic_info(),
        "properties": source.properties()?,
    });
    println!("{}", serde_json::to_string_pretty(&extracted)?);
    Ok(())
}

fn cmd_walk(recipes: PathBuf) -> Result<()> {
    let mut count = 0;
    for entry in CorpusWalker::new(&recipes)? {
        let entry = entry?;
        println!(
            "{} [{}] -> {}",
            entry.name,
            entry.folder,
            entry.recipe_path.display()
        );
        count += 1;
    }
    info!("Found {} packages", count);
    Ok(())
}
