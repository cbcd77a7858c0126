use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use handheld_catalog::browse::{find_item, repository_items};
use handheld_catalog::catalog::HttpCatalogClient;
use handheld_catalog::config::{ConfigLoader, ResolvedConfig};
use handheld_catalog::database::{
    HandheldDatabase, HttpHandheldDatabase, RankFilter, filter_games,
};
use handheld_catalog::domain::{CollectionId, Progress};
use handheld_catalog::download::{CancelToken, Downloader};
use handheld_catalog::error::{CatalogError, ErrorKind};
use handheld_catalog::fetcher::MetadataFetcher;
use handheld_catalog::output::{JsonOutput, OutputMode};
use handheld_catalog::store::CacheStore;
use handheld_catalog::tui::Tui;
use handheld_catalog::unpack::unpack;

#[derive(Parser)]
#[command(name = "hhcat")]
#[command(about = "Browse and download handheld ROM collections from a remote catalog")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "List configured repositories")]
    Repos,
    #[command(about = "List the files of a repository")]
    Items { repository: String },
    #[command(about = "Fetch raw collection listings")]
    Listing {
        #[arg(required = true)]
        collections: Vec<String>,
    },
    #[command(about = "Download one file of a repository")]
    Download {
        repository: String,
        name: String,
        #[arg(long)]
        dest: Option<PathBuf>,
    },
    #[command(about = "Query the handheld game compatibility database")]
    Db(DbArgs),
}

#[derive(Args)]
struct DbArgs {
    #[command(subcommand)]
    command: DbCommand,
}

#[derive(Subcommand)]
enum DbCommand {
    #[command(about = "List device platforms")]
    Platforms,
    #[command(about = "List the systems of a platform")]
    Systems { platform: String },
    #[command(about = "List tested games of a system")]
    Games {
        platform: String,
        system: String,
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value = "ALL")]
        rank: String,
    },
    #[command(about = "Show the report data of one game")]
    Game {
        platform: String,
        system: String,
        game: String,
    },
    #[command(about = "Print the markdown review of one game")]
    Review {
        platform: String,
        system: String,
        game: String,
    },
    #[command(about = "Print the markdown overview of one game")]
    Overview { game: String },
    #[command(about = "List database collaborators")]
    Collaborators,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<CatalogError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CatalogError) -> u8 {
    match error {
        CatalogError::MissingConfig
        | CatalogError::ConfigRead(_)
        | CatalogError::ConfigParse(_)
        | CatalogError::UnknownRepository(_)
        | CatalogError::ItemNotFound { .. } => 2,
        _ => match error.kind() {
            ErrorKind::Network => 3,
            ErrorKind::Cancelled => 130,
            _ => 1,
        },
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    // `listing` and `db` work without a config file; everything else needs one.
    let config = match (ConfigLoader::resolve(cli.config.as_deref()), &cli.command) {
        (Ok(config), _) => config,
        (
            Err(CatalogError::MissingConfig),
            Some(Commands::Listing { .. } | Commands::Db(_)),
        ) => ResolvedConfig::default(),
        (Err(err), _) => {
            init_tracing(false);
            return Err(err.into());
        }
    };
    init_tracing(config.logs);

    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let catalog = HttpCatalogClient::with_base_url(&config.catalog_url)?;
    let fetcher = MetadataFetcher::new(CacheStore::new(config.cache_dir.clone()), catalog);

    match cli.command {
        Some(Commands::Repos) => JsonOutput::print_repositories(&config).into_diagnostic(),
        Some(Commands::Items { repository }) => {
            let repository = config.repository(&repository)?;
            let items = repository_items(&fetcher, repository)?;
            JsonOutput::print_items(&items).into_diagnostic()
        }
        Some(Commands::Listing { collections }) => {
            let ids = collections
                .iter()
                .map(|c| c.parse::<CollectionId>())
                .collect::<Result<Vec<_>, _>>()?;
            let listings = fetcher.fetch_all(&ids)?;
            JsonOutput::print_listings(&listings).into_diagnostic()
        }
        Some(Commands::Download {
            repository,
            name,
            dest,
        }) => run_download(&config, &fetcher, &repository, &name, dest, output_mode),
        Some(Commands::Db(args)) => {
            let database = HttpHandheldDatabase::with_base_url(&config.database_url)?;
            run_db(args.command, &database)
        }
        None => match output_mode {
            OutputMode::Interactive => Tui::new(config, fetcher).run(),
            OutputMode::NonInteractive => Err(miette::Report::msg(
                "command required (try `hhcat --help`)",
            )),
        },
    }
}

fn init_tracing(logs: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if logs { "info" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_download(
    config: &ResolvedConfig,
    fetcher: &MetadataFetcher<HttpCatalogClient>,
    repository: &str,
    name: &str,
    dest: Option<PathBuf>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let repository = config.repository(repository)?;
    let items = repository_items(fetcher, repository)?;
    let item = find_item(&items, name).ok_or_else(|| CatalogError::ItemNotFound {
        repository: repository.key.clone(),
        name: name.to_string(),
    })?;
    let destination_dir = dest.unwrap_or_else(|| repository.path.clone());

    let downloader = Downloader::new(fetcher.catalog().clone());
    let cancel = CancelToken::new();
    let interactive = matches!(output_mode, OutputMode::Interactive);
    let path = downloader.download(
        &cancel,
        &destination_dir,
        &item.name,
        &item.url,
        |progress| {
            if interactive {
                print_progress(item.file_name(), progress);
            }
        },
    )?;
    if interactive {
        eprintln!();
    }

    if item.unzip {
        unpack(&path, &destination_dir)?;
        println!("{}", destination_dir.display());
    } else {
        println!("{}", path.display());
    }
    Ok(())
}

fn run_db(command: DbCommand, database: &impl HandheldDatabase) -> miette::Result<()> {
    let printed = match command {
        DbCommand::Platforms => JsonOutput::print_json(&database.platforms()?),
        DbCommand::Systems { platform } => {
            JsonOutput::print_json(&database.platform(&platform)?.systems)
        }
        DbCommand::Games {
            platform,
            system,
            search,
            rank,
        } => {
            let rank: RankFilter = rank.parse()?;
            let games = database.games(&platform, &system)?;
            JsonOutput::print_json(&filter_games(&games, &search, rank))
        }
        DbCommand::Game {
            platform,
            system,
            game,
        } => JsonOutput::print_json(&database.game_details(&platform, &system, &game)?),
        DbCommand::Review {
            platform,
            system,
            game,
        } => {
            println!("{}", database.game_review(&platform, &system, &game)?);
            Ok(())
        }
        DbCommand::Overview { game } => {
            println!("{}", database.game_overview(&game)?);
            Ok(())
        }
        DbCommand::Collaborators => JsonOutput::print_json(&database.collaborators()?),
    };
    printed.into_diagnostic()
}

fn print_progress(file_name: &str, progress: Progress) {
    let mut stderr = io::stderr();
    let _ = match progress.percent() {
        Some(percent) => write!(
            stderr,
            "\r{file_name}: {percent:>3}% ({}/{} bytes)",
            progress.downloaded,
            progress.total.unwrap_or_default()
        ),
        None => write!(stderr, "\r{file_name}: {} bytes", progress.downloaded),
    };
    let _ = stderr.flush();
}
