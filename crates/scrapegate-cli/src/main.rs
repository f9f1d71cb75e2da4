use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use scrapegate_client::{BrowserSessions, JobTableExtractor, TraceNumberExtractor};
use scrapegate_core::config::{DEFAULT_DASHBOARD_URL, DEFAULT_MACHINE_SUBNET};
use scrapegate_core::{ScrapeConfig, ScrapeService};

#[derive(Parser)]
#[command(name = "scrapegate", version, about = "Headless-browser dashboard and job-table scraper")]
struct Cli {
    #[command(flatten)]
    upstream: UpstreamArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the dashboard's KPI numbers as a JSON array
    Performance,

    /// Print a device's job table grouped by PDF file
    Jobs {
        /// Device number (71-110)
        #[arg(short, long)]
        machine: String,
    },
}

#[derive(Args)]
struct UpstreamArgs {
    /// Performance dashboard URL
    #[arg(long, global = true, env = "DASHBOARD_URL", default_value = DEFAULT_DASHBOARD_URL)]
    dashboard_url: String,

    /// Dashboard basic-auth user
    #[arg(long, global = true, env = "DASHBOARD_USERNAME")]
    username: Option<String>,

    /// Dashboard basic-auth password
    #[arg(long, global = true, env = "DASHBOARD_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// First three octets of the device network
    #[arg(long, global = true, env = "MACHINE_SUBNET", default_value = DEFAULT_MACHINE_SUBNET)]
    subnet: String,

    /// Seconds to wait for navigation
    #[arg(long, global = true, env = "NAVIGATION_TIMEOUT_SECS", default_value_t = 30)]
    navigation_timeout: u64,

    /// Seconds to wait for the readiness selector
    #[arg(long, global = true, env = "READY_TIMEOUT_SECS", default_value_t = 30)]
    ready_timeout: u64,
}

impl UpstreamArgs {
    /// Runs the arguments through the same validation as the server's
    /// environment config.
    fn into_config(self) -> Result<ScrapeConfig> {
        let navigation = self.navigation_timeout.to_string();
        let ready = self.ready_timeout.to_string();

        ScrapeConfig::from_lookup(|key| match key {
            "DASHBOARD_URL" => Some(self.dashboard_url.clone()),
            "DASHBOARD_USERNAME" => self.username.clone(),
            "DASHBOARD_PASSWORD" => self.password.clone(),
            "MACHINE_SUBNET" => Some(self.subnet.clone()),
            "NAVIGATION_TIMEOUT_SECS" => Some(navigation.clone()),
            "READY_TIMEOUT_SECS" => Some(ready.clone()),
            _ => None,
        })
        .context("Invalid upstream configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // stdout carries only the JSON result
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("scrapegate=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.upstream.into_config()?;

    let sessions = BrowserSessions::new();
    let service = ScrapeService::new(
        sessions.clone(),
        TraceNumberExtractor::new(),
        JobTableExtractor::new(),
        config.performance_target(),
        config.jobs_target(),
    );

    let result = match cli.command {
        Commands::Performance => {
            tracing::info!("Scraping {}", config.dashboard_url);
            service
                .performance()
                .await
                .and_then(|numbers| serde_json::to_string_pretty(&numbers).map_err(Into::into))
        }
        Commands::Jobs { machine } => {
            tracing::info!("Scraping jobs for machine {machine}");
            service
                .jobs(&machine)
                .await
                .and_then(|groups| serde_json::to_string_pretty(&groups).map_err(Into::into))
        }
    };

    sessions.shutdown().await;

    let json = result.context("Scrape failed")?;
    println!("{json}");
    Ok(())
}
