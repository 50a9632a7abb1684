//! aqgrid: air-quality sensor grid over MCP
//!
//! Polls a JSON sensor feed on a fixed interval, maps every reading to colour,
//! opacity, blur and size, and keeps the newest grid for AI clients.
//!
//! Commands:
//! - (none): MCP server on stdio with a background poll loop
//! - watch: draw the grid in the terminal
//! - check: validate the config and print the sensor ranges
//! - config: open the config file in your editor

use clap::{Parser, Subcommand};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters, ServerHandler},
    model::*,
    ErrorData as McpError,
    ServiceExt,
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// === Modules ===

mod config;
mod error;
mod mapper;
mod poll;
mod sensors;
mod shared;
mod sinks;
mod tools;

use config::{Config, Settings};
use mapper::Mapper;
use poll::{HttpSource, PollControl, Poller};
use sinks::{SharedSnapshot, SnapshotSink};

// === CLI ===

#[derive(Parser)]
#[command(name = "aqgrid")]
#[command(about = "Air-quality sensor grid: poll, map and serve sensor readings over MCP")]
struct Cli {
    /// Config file to use instead of ~/.config/aqgrid/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the config file in your editor
    Config,
    /// Validate the config and print the sensor ranges
    Check,
    /// Draw the live grid in this terminal until Ctrl-C
    #[cfg(feature = "terminal")]
    Watch {
        /// Override the configured cell layout
        #[arg(long, value_enum)]
        layout: Option<sinks::Layout>,
    },
}

// === Common Parameter Types ===

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EmptyParams {}

// === Server ===

#[derive(Debug)]
pub struct AirQualityServer {
    pub tool_router: ToolRouter<Self>,
    snapshot: SharedSnapshot,
    mapper: Mapper,
    cell_size: f64,
    endpoint: String,
    interval: Duration,
    control: PollControl,
}

impl AirQualityServer {
    pub fn new(settings: &Settings, snapshot: SharedSnapshot, control: PollControl) -> Self {
        Self {
            tool_router: Self::tool_router(),
            snapshot,
            mapper: settings.mapper.clone(),
            cell_size: settings.grid.cell_size(),
            endpoint: settings.endpoint.clone(),
            interval: settings.interval,
            control,
        }
    }
}

// Tool implementations
#[rmcp::tool_router]
impl AirQualityServer {
    #[rmcp::tool(description = "Get current air quality: newest reading per sensor with unit, normalized level and colour, plus the local AQI (0-300) and its band")]
    pub async fn get_air_quality(
        &self,
        Parameters(_params): Parameters<EmptyParams>,
    ) -> Result<CallToolResult, McpError> {
        tools::air::get_air_quality(&self.snapshot).await
    }

    #[rmcp::tool(description = "Get the reading grid: AQI per cell, or the full visual encoding of one cell")]
    pub async fn get_grid(
        &self,
        Parameters(params): Parameters<tools::air::GridParams>,
    ) -> Result<CallToolResult, McpError> {
        tools::air::get_grid(&self.snapshot, params).await
    }

    #[rmcp::tool(description = "Map a raw sensor value to its normalized level, colour, opacity, blur radius and size")]
    pub async fn encode_value(
        &self,
        Parameters(params): Parameters<tools::mapping::EncodeParams>,
    ) -> Result<CallToolResult, McpError> {
        tools::mapping::encode_value(&self.mapper, self.cell_size, params).await
    }

    #[rmcp::tool(description = "List configured sensors with their normalization ranges, units and base colours")]
    pub async fn get_sensor_ranges(
        &self,
        Parameters(_params): Parameters<EmptyParams>,
    ) -> Result<CallToolResult, McpError> {
        tools::mapping::get_sensor_ranges(&self.mapper).await
    }

    #[rmcp::tool(description = "Get poll loop status: endpoint, interval, tick/failure counts and the last error")]
    pub async fn get_poll_status(
        &self,
        Parameters(_params): Parameters<EmptyParams>,
    ) -> Result<CallToolResult, McpError> {
        tools::air::get_poll_status(&self.snapshot, &self.endpoint, self.interval).await
    }

    #[rmcp::tool(description = "Clear the buffered readings so the grid refills from the next poll")]
    pub async fn reset_buffer(
        &self,
        Parameters(_params): Parameters<EmptyParams>,
    ) -> Result<CallToolResult, McpError> {
        tools::air::reset_buffer(&self.control).await
    }
}

#[rmcp::tool_handler]
impl ServerHandler for AirQualityServer {
    fn get_info(&self) -> ServerInfo {
        let sensors: Vec<&str> = self.mapper.ranges().keys().map(|k| k.as_str()).collect();
        let description = format!(
            "aqgrid: live air-quality grid from {}.\n- sensors: {}\n- tools: air quality, grid, value encoding, ranges, poll status\n",
            self.endpoint,
            sensors.join(", ")
        );

        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(description),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Some(Commands::Config) => run_config_command(cli.config)?,
        Some(Commands::Check) => run_check(load_config(cli.config.as_deref())?)?,
        #[cfg(feature = "terminal")]
        Some(Commands::Watch { layout }) => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(layout) = layout {
                config.grid.layout = layout;
            }
            run_watch(config).await?;
        }
        None => run_server(load_config(cli.config.as_deref())?).await?,
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config, error::ConfigError> {
    match path {
        Some(p) => Config::load_from(p),
        None => Config::load(),
    }
}

/// Open config file in user's editor
fn run_config_command(path: Option<PathBuf>) -> anyhow::Result<()> {
    let config_path = path
        .or_else(Config::path)
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    // Create config dir if needed
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Create config file from template if it doesn't exist
    if !config_path.exists() {
        let template = include_str!("../config.toml.example");
        std::fs::write(&config_path, template)?;
        println!("Created config file: {}", config_path.display());
    }

    // Get editor from environment or use defaults
    let editor = std::env::var("EDITOR")
        .or_else(|_| std::env::var("VISUAL"))
        .unwrap_or_else(|_| {
            #[cfg(target_os = "windows")]
            { "notepad".to_string() }
            #[cfg(not(target_os = "windows"))]
            { "nano".to_string() }
        });

    println!("Opening {} with {}", config_path.display(), editor);

    std::process::Command::new(&editor)
        .arg(&config_path)
        .status()?;

    Ok(())
}

/// Validate config and print what the mapper will use
fn run_check(config: Config) -> anyhow::Result<()> {
    let settings = config.validate()?;

    println!("endpoint: {}", settings.endpoint);
    println!("interval: {}s (timeout {}s)", settings.interval.as_secs(), settings.timeout.as_secs());
    println!(
        "grid:     {}x{} {:?}, cell {:.1}px",
        settings.grid.rows,
        settings.grid.cols,
        settings.grid.layout,
        settings.grid.cell_size()
    );
    println!("window:   {:?}", settings.window);
    println!("colours:  {:?}", settings.mapper.policy());
    for (key, range) in settings.mapper.ranges().iter() {
        println!(
            "  {:<9} {:>8} .. {:<8} {:<6} {}",
            key.as_str(),
            range.min(),
            range.max(),
            key.unit(),
            settings.mapper.palette().base_color(key)
        );
    }
    Ok(())
}

/// Run the MCP server with a background poll loop
async fn run_server(config: Config) -> anyhow::Result<()> {
    let settings = config.validate()?;
    tracing::info!("Starting aqgrid server");

    let snapshot = SharedSnapshot::new();
    let source = HttpSource::new(settings.endpoint.clone(), settings.timeout)?;
    let handle = Poller::new(source, SnapshotSink::new(snapshot.clone()), &settings).spawn();

    let server = AirQualityServer::new(&settings, snapshot, handle.control());
    let service = server.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;

    handle.cancel().await;
    tracing::info!("aqgrid server stopped");
    Ok(())
}

/// Draw the grid on stdout until Ctrl-C
#[cfg(feature = "terminal")]
async fn run_watch(config: Config) -> anyhow::Result<()> {
    let settings = config.validate()?;

    let source = HttpSource::new(settings.endpoint.clone(), settings.timeout)?;
    let sink = sinks::terminal::TerminalSink::new(std::io::stdout());
    let handle = Poller::new(source, sink, &settings).spawn();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        // the grid is a fixed number of glyphs wide, so a resize is a repaint
        let control = handle.control();
        let mut resized = signal(SignalKind::window_change())?;
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                Some(()) = resized.recv() => {
                    control.replay().await;
                }
            }
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    handle.cancel().await;
    Ok(())
}
