//! Card-key license client.
//!
//! Binds this installation to a license key, checks the cached license,
//! releases the binding, and shows the service announcement.
//!
//! Usage:
//!   kami login ABC123
//!   kami status
//!   kami --transport proxy --proxy-url http://127.0.0.1:17530 unbind

use std::path::PathBuf;
use std::process::ExitCode;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kami_cli::{CliConfig, StatusReport, TransportKind};
use kami_license::{LicenseError, LicenseSession};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "kami")]
#[command(about = "Card-key license verification client")]
struct Args {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Transport used to reach the license service
    #[arg(short, long, value_enum)]
    transport: Option<TransportKind>,

    /// Legacy endpoint URL
    #[arg(long)]
    api_base: Option<String>,

    /// Send legacy parameters in the clear instead of RC4-obfuscated
    #[arg(long)]
    plain: bool,

    /// Base URL of the local backend proxy
    #[arg(long)]
    proxy_url: Option<String>,

    /// Path of the license store file
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print this installation's device code
    DeviceCode,
    /// Bind a license key to this device
    Login {
        /// The license key
        key: String,
    },
    /// Release this device's binding
    Unbind,
    /// Show the cached license without contacting the service
    Status,
    /// Show the service announcement
    Notice,
}

impl Args {
    fn config(&self) -> Result<CliConfig> {
        let mut config = CliConfig::load(self.config.as_deref())?;
        if let Some(transport) = self.transport {
            config.transport = transport;
        }
        if let Some(api_base) = &self.api_base {
            config.legacy.api_base = api_base.clone();
        }
        if self.plain {
            config.legacy.obfuscate_params = false;
        }
        if let Some(proxy_url) = &self.proxy_url {
            config.proxy.base_url = proxy_url.clone();
        }
        if let Some(store) = &self.store {
            config.store_path = Some(store.clone());
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::WARN };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Service and network failures get their user-facing text; anything
            // else shows the full context chain.
            match err.downcast_ref::<LicenseError>() {
                Some(license_err) => {
                    debug!("{err:#}");
                    eprintln!("error: {}", license_err.user_message());
                    if license_err.is_transient() {
                        eprintln!("the license service could not be reached, try again later");
                    }
                }
                None => eprintln!("error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = args.config()?;
    debug!("Using {:?} transport", config.transport);
    let mut session = config.session()?;

    match args.command {
        Command::DeviceCode => {
            println!("{}", session.device_code()?);
        }
        Command::Login { key } => {
            let info = session.login(&key).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                let message = session
                    .last_auth_result()
                    .map(|r| r.message.clone())
                    .unwrap_or_default();
                println!("{message}");
                println!("Remaining: {}", session.remaining_time(info.vip_expire_time));
            }
        }
        Command::Unbind => {
            let message = session.unbind().await?;
            println!("{message}");
        }
        Command::Status => print_status(&mut session, args.json)?,
        Command::Notice => {
            let notice = session.notice().await?;
            if notice.is_empty() {
                println!("(no announcement)");
            } else {
                println!("{notice}");
            }
        }
    }
    Ok(())
}

fn print_status(session: &mut LicenseSession, json: bool) -> Result<()> {
    let report = StatusReport::collect(session)?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize status")?
        );
    } else {
        print!("{}", report.render());
    }
    Ok(())
}
