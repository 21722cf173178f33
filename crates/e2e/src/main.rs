//! osd-e2e - runs YAML specs against OpenSearch Dashboards

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use osd_e2e::driver::{DriverConfig, DriverHandle};
use osd_e2e::fixtures::{FixtureDescriptor, FixtureLoader};
use osd_e2e::runner::{self, RunnerOptions, TestRunner};
use osd_e2e::stub_llm::{self, StubLlmConfig};
use osd_e2e::{RunConfig, WebDriverPage};

/// E2E browser harness for OpenSearch Dashboards
#[derive(Parser)]
#[command(name = "osd-e2e")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Runner configuration file (TOML)
    #[arg(short, long, env = "OSD_E2E_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run specs against a live dashboards instance
    Run {
        /// Directory holding the YAML specs
        #[arg(long, default_value = "crates/e2e/specs")]
        specs: PathBuf,

        /// Directory holding fixture files
        #[arg(long, default_value = "crates/e2e/fixtures")]
        fixtures: PathBuf,

        /// Where test-results.json and screenshots go
        #[arg(short, long, default_value = "test-results")]
        output: PathBuf,

        /// Only run specs carrying this tag
        #[arg(long)]
        tag: Option<String>,

        /// Only run specs whose name contains this
        #[arg(long)]
        name: Option<String>,

        /// Spawn chromedriver/geckodriver instead of using webdriver_url
        #[arg(long)]
        spawn_driver: bool,

        /// Parse and print the selected specs without opening a browser
        #[arg(long)]
        dry_run: bool,
    },

    /// Seed or remove fixture indices
    #[command(subcommand)]
    Fixtures(FixtureCommand),

    /// Serve canned LLM responses
    StubLlm {
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: SocketAddr,

        /// Directory holding chat_response.json and suggestions_response.json
        #[arg(long, default_value = "crates/e2e/fixtures/llm")]
        responses: PathBuf,

        /// Delay before each matched response
        #[arg(long, default_value_t = 1000)]
        delay_ms: u64,
    },
}

#[derive(Subcommand)]
enum FixtureCommand {
    /// Create an index and bulk load its data
    Load {
        index: String,
        #[arg(long)]
        mapping: Option<PathBuf>,
        #[arg(long)]
        data: Option<PathBuf>,
        /// Skip when the index already holds documents
        #[arg(long)]
        if_needed: bool,
    },

    /// Delete an index
    Delete { index: String },

    /// Print the document count of an index
    Count { index: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    match cli.log_format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer().with_target(false))
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init(),
    }

    let mut config = RunConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Command::Run {
            specs,
            fixtures,
            output,
            tag,
            name,
            spawn_driver,
            dry_run,
        } => {
            let options = RunnerOptions {
                specs_dir: specs,
                fixtures_dir: fixtures,
                output_dir: output,
                tag,
                name,
            };

            if dry_run {
                let selected = options.load_specs()?;
                let planned = runner::plan(&config, &selected);
                println!("{}", serde_json::to_string_pretty(&planned)?);
                return Ok(());
            }

            let driver = if spawn_driver {
                let handle = DriverHandle::spawn(DriverConfig::new(config.browser.kind)).await?;
                config.browser.webdriver_url = handle.url().to_string();
                Some(handle)
            } else {
                None
            };

            let config = Arc::new(config);
            let page = WebDriverPage::connect(&config.browser, &config.timeouts)
                .await
                .context("opening browser session")?;
            let runner = TestRunner::new(config, page, options)?;

            let (outcome, page) = runner.run_and_report().await;
            let quit = page.quit().await;
            drop(driver);
            let results = outcome?;
            quit?;

            if !results.success() {
                std::process::exit(1);
            }
        }

        Command::Fixtures(cmd) => {
            let loader = FixtureLoader::new(&config, ".")?;
            match cmd {
                FixtureCommand::Load {
                    index,
                    mapping,
                    data,
                    if_needed,
                } => {
                    let descriptor = FixtureDescriptor {
                        index,
                        mapping,
                        data,
                        if_needed,
                        delete_after: false,
                    };
                    let report = loader.seed(&descriptor).await?;
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                FixtureCommand::Delete { index } => {
                    loader.delete_index(&index).await?;
                    info!("Deleted {}", index);
                }
                FixtureCommand::Count { index } => {
                    println!("{}", loader.count(&index).await?);
                }
            }
        }

        Command::StubLlm {
            addr,
            responses,
            delay_ms,
        } => {
            let stub = StubLlmConfig {
                delay_ms,
                ..StubLlmConfig::default()
            }
            .with_fixture_dir(&responses);
            stub_llm::serve(&stub, addr).await?;
        }
    }

    Ok(())
}
