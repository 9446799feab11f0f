use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use dialoguer::{Confirm, Input, Select};
use globe_etl::report::{self, ConsoleReporter};
use globe_etl::config::DEFAULT_LOG_FILE;
use globe_etl::storage::{self, ExportFormat};
use globe_etl::{Config, Pipeline, Store, logging, stats};
use std::path::PathBuf;
use std::process::Command as Process;

#[derive(Parser, Debug)]
#[command(
    name = "globe-etl",
    version,
    about = "Fetch countries, enrich them with current weather, and keep them in SQLite"
)]
struct Cli {
    /// SQLite database file (overrides DB_PATH).
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Write logs to this file (rotated at 5 MiB) instead of stderr.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    /// Without a subcommand the interactive menu starts.
    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the ETL pipeline for a country name, ISO code, or `all`.
    Run(RunArgs),
    /// Re-fetch weather for every stored country.
    Refresh,
    /// Print the stored rows as a table.
    View,
    /// Export the stored rows.
    Export(ExportArgs),
    /// Delete every stored row.
    Clean {
        /// Do not ask for confirmation.
        #[arg(long, short)]
        yes: bool,
    },
    /// Print temperature statistics per region.
    Stats,
    /// Check the country API and the database.
    Health,
    /// Print version, platform and configuration.
    Info,
    /// Interactive menu.
    Menu,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Country name or code (e.g. "gb", "Japan"), or `all`.
    query: String,
    /// Process at most this many countries.
    #[arg(long)]
    limit: Option<usize>,
    /// Where to write the run summary CSV.
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Skip writing the summary CSV.
    #[arg(long, default_value_t = false, conflicts_with = "csv")]
    no_csv: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutFormat {
    Csv,
    Json,
}

impl From<OutFormat> for ExportFormat {
    fn from(f: OutFormat) -> Self {
        match f {
            OutFormat::Csv => ExportFormat::Csv,
            OutFormat::Json => ExportFormat::Json,
        }
    }
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Output format. If omitted, inferred from --out (default csv).
    #[arg(long, value_enum)]
    format: Option<OutFormat>,
    /// Output file (default countries_export.<format>).
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if cli.log_file.is_some() {
        config.log_file = cli.log_file;
    }
    let cmd = cli.cmd.unwrap_or(Command::Menu);
    // Keep log lines out of the interactive prompts.
    if matches!(cmd, Command::Menu) && config.log_file.is_none() {
        config.log_file = Some(PathBuf::from(DEFAULT_LOG_FILE));
    }
    logging::init(config.log_file.as_deref()).context("initialise logging")?;

    match cmd {
        Command::Run(args) => cmd_run(&config, args),
        Command::Refresh => cmd_refresh(&config),
        Command::View => cmd_view(&config),
        Command::Export(args) => cmd_export(&config, args),
        Command::Clean { yes } => cmd_clean(&config, yes),
        Command::Stats => cmd_stats(&config),
        Command::Health => cmd_health(&config),
        Command::Info => {
            println!("{}", report::render_pairs(&report::system_info(&config)));
            Ok(())
        }
        Command::Menu => menu(&config),
    }
}

fn open_store(config: &Config) -> Result<Store> {
    Store::open(&config.db_path)
        .with_context(|| format!("open database {}", config.db_path.display()))
}

fn cmd_run(config: &Config, args: RunArgs) -> Result<()> {
    let pipeline = Pipeline::from_config(config)
        .context("set up pipeline")?
        .with_limit(args.limit);
    let mut reporter = ConsoleReporter::new(std::io::stdout());
    if !args.no_csv {
        reporter = reporter.with_summary_csv(args.csv.unwrap_or_else(|| config.summary_csv.clone()));
    }
    let summary = pipeline.run(&args.query, &mut reporter);
    if let Some(e) = &summary.source_error {
        eprintln!("Warning: {e}");
    }
    if summary.storage_failures > 0 {
        eprintln!("Warning: {} row(s) could not be saved", summary.storage_failures);
    }
    Ok(())
}

fn cmd_refresh(config: &Config) -> Result<()> {
    let pipeline = Pipeline::from_config(config).context("set up pipeline")?;
    let mut reporter = ConsoleReporter::new(std::io::stdout());
    pipeline.refresh(&mut reporter);
    Ok(())
}

fn cmd_view(config: &Config) -> Result<()> {
    let rows = open_store(config)?.read_all()?;
    println!("\n--- Database Contents ---");
    println!("{}", report::render_table(&rows));
    Ok(())
}

fn cmd_export(config: &Config, args: ExportArgs) -> Result<()> {
    let format: ExportFormat = match (args.format, args.out.as_deref()) {
        (Some(f), _) => f.into(),
        (None, Some(path)) => ExportFormat::from_path(path).unwrap_or(ExportFormat::Csv),
        (None, None) => ExportFormat::Csv,
    };
    let path = args
        .out
        .unwrap_or_else(|| PathBuf::from(format.default_file_name()));
    export_to(config, format, path)
}

fn export_to(config: &Config, format: ExportFormat, path: PathBuf) -> Result<()> {
    let rows = open_store(config)?.read_all()?;
    storage::export(&rows, &path, format)
        .with_context(|| format!("export to {}", path.display()))?;
    println!("Exported {} rows to {}", rows.len(), path.display());
    Ok(())
}

fn cmd_clean(config: &Config, yes: bool) -> Result<()> {
    if !config.db_path.exists() {
        println!("No database found to remove.");
        return Ok(());
    }
    let confirmed = yes
        || Confirm::new()
            .with_prompt(format!(
                "Delete every row in {}?",
                config.db_path.display()
            ))
            .default(false)
            .interact()?;
    if confirmed {
        open_store(config)?.drop_all()?;
        println!("Database {} cleaned.", config.db_path.display());
    }
    Ok(())
}

fn cmd_stats(config: &Config) -> Result<()> {
    let rows = open_store(config)?.read_all()?;
    println!("{}", report::render_stats(&stats::grouped_summary(&rows)));
    Ok(())
}

fn cmd_health(config: &Config) -> Result<()> {
    let transport = globe_etl::http::HttpTransport::new(config)?;
    let store = if config.db_path.exists() {
        Some(open_store(config)?)
    } else {
        None
    };
    let health = report::health_check(&transport, config, store.as_ref());
    println!("{}", report::render_pairs(&health.lines()));
    Ok(())
}

fn menu(config: &Config) -> Result<()> {
    let items = [
        "Run ETL pipeline",
        "Database operations",
        "Tests",
        "System information",
        "Health check",
        "Web access",
        "Exit",
    ];
    loop {
        let choice = Select::new()
            .with_prompt("==== Main Menu ====")
            .items(&items)
            .default(0)
            .interact()?;
        let result = match choice {
            0 => menu_run(config),
            1 => database_menu(config),
            2 => run_tests(),
            3 => {
                println!("{}", report::render_pairs(&report::system_info(config)));
                Ok(())
            }
            4 => cmd_health(config),
            5 => launch_web(config),
            _ => {
                println!("Exiting... Goodbye!");
                return Ok(());
            }
        };
        if let Err(e) = result {
            eprintln!("Error: {e:#}");
        }
    }
}

fn menu_run(config: &Config) -> Result<()> {
    let query = Input::<String>::new()
        .with_prompt("Enter a country name (or 'all' for all countries)")
        .interact_text()?;
    cmd_run(
        config,
        RunArgs {
            query,
            limit: None,
            csv: None,
            no_csv: false,
        },
    )
}

fn database_menu(config: &Config) -> Result<()> {
    let items = [
        "View database contents",
        "Export as CSV",
        "Export as JSON",
        "Clean database",
        "Back to Main Menu",
    ];
    loop {
        let choice = Select::new()
            .with_prompt("--- Database Menu ---")
            .items(&items)
            .default(0)
            .interact()?;
        match choice {
            0 => cmd_view(config)?,
            1 => export_to(
                config,
                ExportFormat::Csv,
                PathBuf::from(ExportFormat::Csv.default_file_name()),
            )?,
            2 => export_to(
                config,
                ExportFormat::Json,
                PathBuf::from(ExportFormat::Json.default_file_name()),
            )?,
            3 => cmd_clean(config, false)?,
            _ => return Ok(()),
        }
    }
}

fn run_tests() -> Result<()> {
    let status = Process::new("cargo")
        .arg("test")
        .status()
        .context("run `cargo test` (is cargo on PATH?)")?;
    println!("cargo test exited with {status}");
    Ok(())
}

fn launch_web(config: &Config) -> Result<()> {
    let exe = std::env::current_exe()
        .context("locate current executable")?
        .with_file_name(format!("globe-web{}", std::env::consts::EXE_SUFFIX));
    let child = Process::new(&exe)
        .env(globe_etl::config::DB_PATH_ENV, &config.db_path)
        .spawn()
        .with_context(|| format!("launch {}", exe.display()))?;
    println!("Web dashboard launched (pid {}).", child.id());
    Ok(())
}
