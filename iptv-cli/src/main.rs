use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use iptv_connectivity::{
    ConnectivityConfig, ConnectivitySupervisor, CredentialStore, RegistrationPolicy, StoredCredential,
    SubscriptionRegistry,
};

mod commands;
mod console;
mod source;

use source::TextSource;

/// IPTV Manager
///
/// Imports IPTV subscription endpoints from pasted text, files or web pages,
/// validates them, and keeps re-checking them so that dead endpoints are
/// taken out of rotation.
#[derive(Parser, Debug)]
#[command(name = "iptv-manager")]
#[command(about = "Import, validate and monitor IPTV subscription endpoints")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file layered over the defaults
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Credential file for the remembered endpoint
    #[arg(long, global = true)]
    pub credentials: Option<PathBuf>,

    /// Per-attempt probe timeout in seconds
    #[arg(short = 't', long, global = true)]
    pub timeout: Option<u64>,

    /// Probe attempts per endpoint
    #[arg(short = 'r', long, global = true)]
    pub max_attempts: Option<u32>,

    /// Maximum number of endpoints probed at the same time
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Register imported endpoints before their first probe
    #[arg(long, global = true)]
    pub register_immediately: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract endpoints from text and validate them
    Import {
        /// Read the text from a file
        #[arg(short, long, conflicts_with = "url")]
        file: Option<PathBuf>,
        /// Fetch the text from a web page
        #[arg(short, long)]
        url: Option<String>,
    },

    /// Validate a single endpoint
    Add {
        #[arg(required_unless_present = "record")]
        server_url: Option<String>,
        #[arg(required_unless_present = "record")]
        device_id: Option<String>,
        /// A "server_url,device_id" record instead of the two arguments
        #[arg(long, conflicts_with_all = ["server_url", "device_id"])]
        record: Option<String>,
        /// Remember the endpoint for later runs
        #[arg(long)]
        remember: bool,
    },

    /// Run one full check of the remembered and imported endpoints
    Check {
        /// Import endpoints from this file before checking
        #[arg(long)]
        import: Option<PathBuf>,
        /// Only list endpoints that are active after the check
        #[arg(long)]
        active_only: bool,
        /// Only list endpoints whose URL or device id contains this text
        #[arg(long)]
        filter: Option<String>,
        /// Print the endpoint list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check periodically and report state changes until Ctrl+C
    Watch {
        /// Import endpoints from this file first
        #[arg(long, conflicts_with = "url")]
        import: Option<PathBuf>,
        /// Import endpoints from this web page first
        #[arg(long)]
        url: Option<String>,
        /// Seconds between full checks
        #[arg(short, long)]
        interval: Option<u64>,
    },
}

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

impl Args {
    /// Fill unset options from `IPTV_*` environment variables
    fn apply_env(&mut self) -> Result<()> {
        if self.config.is_none() {
            self.config = std::env::var_os("IPTV_CONFIG").map(PathBuf::from);
        }

        if self.credentials.is_none() {
            self.credentials = std::env::var_os("IPTV_CREDENTIALS").map(PathBuf::from);
        }

        if let (None, Ok(timeout)) = (self.timeout, std::env::var("IPTV_TIMEOUT")) {
            self.timeout = Some(timeout.parse().context("Invalid IPTV_TIMEOUT environment variable")?);
        }

        if let (None, Ok(attempts)) = (self.max_attempts, std::env::var("IPTV_MAX_ATTEMPTS")) {
            self.max_attempts = Some(
                attempts
                    .parse()
                    .context("Invalid IPTV_MAX_ATTEMPTS environment variable")?,
            );
        }

        if let (None, Ok(concurrency)) = (self.concurrency, std::env::var("IPTV_CONCURRENCY")) {
            self.concurrency = Some(
                concurrency
                    .parse()
                    .context("Invalid IPTV_CONCURRENCY environment variable")?,
            );
        }

        if std::env::var("IPTV_REGISTER_IMMEDIATELY").is_ok() {
            self.register_immediately = true;
        }

        if self.log_level.is_none() {
            self.log_level = std::env::var("IPTV_LOG_LEVEL").ok();
        }

        Ok(())
    }

    /// Validate command line arguments
    fn validate(&self) -> Result<()> {
        if self.timeout == Some(0) {
            return Err(anyhow!("Timeout must be positive"));
        }

        if self.max_attempts == Some(0) {
            return Err(anyhow!("Max attempts must be at least 1"));
        }

        if self.concurrency == Some(0) {
            return Err(anyhow!("Concurrency must be at least 1"));
        }

        if let Command::Watch { interval: Some(0), .. } = self.command {
            return Err(anyhow!("Check interval must be positive"));
        }

        let level = self.log_level();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}'. Valid levels: {}",
                level,
                LOG_LEVELS.join(", ")
            ));
        }

        Ok(())
    }

    fn log_level(&self) -> String {
        self.log_level.as_deref().unwrap_or("info").to_lowercase()
    }
}

/// Configuration derived from the defaults, the config file, command line
/// arguments and environment variables, in increasing priority
#[derive(Debug, Clone)]
pub struct Config {
    pub connectivity: ConnectivityConfig,
    pub credentials: Option<CredentialStore>,
    pub log_level: String,
}

impl Config {
    /// Parse the command line and layer the configuration sources
    pub fn from_env() -> Result<(Self, Command)> {
        let mut args = Args::parse();
        args.apply_env()?;
        args.validate()?;

        let config = Self::from_args(&args)?;
        Ok((config, args.command))
    }

    fn from_args(args: &Args) -> Result<Self> {
        let mut connectivity = match &args.config {
            Some(path) => ConnectivityConfig::load(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
            None => ConnectivityConfig::default(),
        };

        if let Some(secs) = args.timeout {
            connectivity = connectivity.with_probe_timeout(Duration::from_secs(secs));
        }
        if let Some(attempts) = args.max_attempts {
            connectivity.retry.max_attempts = attempts;
        }
        if let Some(max) = args.concurrency {
            connectivity = connectivity.with_max_concurrent_probes(max);
        }
        if args.register_immediately {
            connectivity = connectivity.with_registration(RegistrationPolicy::Immediately);
        }
        if let Command::Watch { interval: Some(secs), .. } = args.command {
            connectivity = connectivity.with_check_interval(Duration::from_secs(secs));
        }
        connectivity.validate()?;

        let credentials = match &args.credentials {
            Some(path) => Some(CredentialStore::new(path)),
            None => CredentialStore::default_location(),
        };

        Ok(Self {
            connectivity,
            credentials,
            log_level: args.log_level(),
        })
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let probe = &self.connectivity.probe;
        info!("Configuration:");
        info!("  Probe timeout: {}s", probe.timeout.as_secs());
        info!("  Device header: {}", probe.device_header);
        info!("  Max attempts: {}", self.connectivity.retry.max_attempts);
        info!("  Base delay: {}ms", self.connectivity.retry.base_delay.as_millis());
        info!("  Check interval: {}s", self.connectivity.check_interval.as_secs());
        match self.connectivity.max_concurrent_probes {
            Some(max) => info!("  Max concurrent probes: {}", max),
            None => info!("  Max concurrent probes: unbounded"),
        }
        info!("  Registration: {:?}", self.connectivity.registration);
        match &self.credentials {
            Some(store) => info!("  Credentials: {}", store.path().display()),
            None => info!("  Credentials: none"),
        }
    }
}

/// Initialize tracing/logging with the specified log level
fn init_tracing(log_level: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("{e}"))
}

async fn run(config: Config, command: Command) -> Result<()> {
    let registry = Arc::new(SubscriptionRegistry::new());
    let mut supervisor = ConnectivitySupervisor::new(Arc::clone(&registry), config.connectivity.clone())
        .context("Failed to set up the connectivity supervisor")?;
    if let Some(store) = config.credentials.clone() {
        supervisor = supervisor.with_credential_store(store);
    }

    match command {
        Command::Import { file, url } => {
            commands::import(&supervisor, &TextSource::from_args(file, url)).await?;
        }
        Command::Add {
            server_url,
            device_id,
            record,
            remember,
        } => {
            let credential = match (record, server_url, device_id) {
                (Some(record), _, _) => StoredCredential::from_record(&record)
                    .ok_or_else(|| anyhow!("Expected a \"server_url,device_id\" record, got {record:?}"))?,
                (None, Some(server_url), Some(device_id)) => StoredCredential::new(server_url, device_id),
                _ => return Err(anyhow!("Both a server URL and a device id are required")),
            };
            commands::add(&supervisor, &credential.server_url, &credential.device_id, remember).await?;
        }
        Command::Check {
            import,
            active_only,
            filter,
            json,
        } => {
            seed(&supervisor, import.is_some())?;
            let listing = commands::Listing {
                active_only,
                filter,
                json,
            };
            commands::check(&supervisor, import.map(TextSource::File), &listing).await?;
        }
        Command::Watch { import, url, .. } => {
            seed(&supervisor, import.is_some() || url.is_some())?;
            let import_from = match (import, url) {
                (None, None) => None,
                (file, url) => Some(TextSource::from_args(file, url)),
            };
            let interval = supervisor.config().check_interval;
            commands::watch(Arc::new(supervisor), interval, import_from).await?;
        }
    }

    Ok(())
}

/// Without anything to import the remembered endpoint is all there is to check.
fn seed(supervisor: &ConnectivitySupervisor, importing: bool) -> Result<()> {
    if importing {
        supervisor.seed_from_store()?;
    } else {
        supervisor
            .seed_required()
            .context("Nothing to check: pass --import or remember an endpoint with `add --remember`")?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration from command line and environment
    let (config, command) = Config::from_env().context("Failed to parse configuration")?;

    init_tracing(&config.log_level).context("Failed to initialize logging")?;
    config.print_summary();

    if let Err(e) = run(config, command).await {
        error!("{e:#}");
        std::process::exit(1);
    }

    Ok(())
}
