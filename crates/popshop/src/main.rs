use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use popshop::config::{load_rules, ConfigWatcher, ServerSettings};
use popshop::pipeline::Pipeline;
use popshop::store::RuleStore;

#[derive(Parser, Debug)]
#[command(name = "popshop", about = "Declarative HTTP mocking and forward proxying")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the rules at a config path
    Serve {
        /// Rule file or directory of .yaml/.yml files
        config_path: PathBuf,
        /// Server settings file (YAML); flags below override it
        #[arg(long)]
        settings: Option<PathBuf>,
        /// Listen port (default 8080)
        #[arg(long)]
        port: Option<u16>,
        /// Bind address (default 127.0.0.1)
        #[arg(long)]
        host: Option<String>,
        /// Reload rules when the config path changes
        #[arg(long)]
        watch: bool,
        /// Maximum request body size in bytes (default 1 MiB)
        #[arg(long)]
        max_request_size: Option<usize>,
        #[arg(short, long)]
        verbose: bool,
    },
    /// Parse a config path and report rule counts without serving
    Validate {
        config_path: PathBuf,
        #[arg(short, long)]
        verbose: bool,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config_path,
            settings,
            port,
            host,
            watch,
            max_request_size,
            verbose,
        } => {
            init_logging(verbose);

            let rules = load_rules(&config_path)
                .with_context(|| format!("failed to load rules from {}", config_path.display()))?;
            info!(
                "loaded {} rules ({} mock, {} proxy)",
                rules.len(),
                rules.mock_count(),
                rules.proxy_count()
            );

            let mut settings = match settings {
                Some(path) => ServerSettings::from_file(&path)
                    .with_context(|| format!("failed to load settings from {}", path.display()))?,
                None => ServerSettings::default(),
            };
            if let Some(port) = port {
                settings.port = port;
            }
            if let Some(host) = host {
                settings.host = host;
            }
            if let Some(max_request_size) = max_request_size {
                settings.max_request_size = max_request_size;
            }
            settings.watch = settings.watch || watch;
            settings.validate()?;

            let store = Arc::new(RuleStore::new(rules));

            // The watcher lives for the whole serve call; dropping it would
            // stop reloads.
            let _watcher = if settings.watch {
                Some(ConfigWatcher::spawn(config_path, Arc::clone(&store))?)
            } else {
                None
            };

            let (host, port) = (settings.host.clone(), settings.port);
            let pipeline = Arc::new(Pipeline::new(settings, store));
            popshop::server::run(pipeline, &host, port).await
        }
        Command::Validate {
            config_path,
            verbose,
        } => {
            init_logging(verbose);

            let rules = load_rules(&config_path)
                .with_context(|| format!("invalid configuration at {}", config_path.display()))?;
            println!(
                "Configuration valid: {} rules ({} mock, {} proxy)",
                rules.len(),
                rules.mock_count(),
                rules.proxy_count()
            );
            Ok(())
        }
    }
}
