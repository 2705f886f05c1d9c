//! Command line shared by the fixture binaries.
//!
//! # Design Decisions
//! - One flag set for every binary; each binary only picks a [`Preset`]
//! - Precedence: preset < config file < flags
//! - Errors print `Error: <message>` and exit with code 2

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use crate::config::validation::parse_host_port;
use crate::config::{load_layered, validate_config, ConfigError, RuntimeConfig, ServerConfig, TopologyMode};
use crate::delay::DelayStrategy;
use crate::error::Error;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::logging::{init_logging, LogTarget};
use crate::observability::metrics;
use crate::server::Server;
use crate::session::Rewrite;

/// Name of the relay executable installed next to the pipe bridge.
pub const RELAY_BINARY: &str = "bridge_relay";

#[derive(Debug, Clone, Default, Parser)]
#[command(version, about = "HTTP test fixture server", allow_negative_numbers = true)]
pub struct Args {
    /// Address to listen on
    #[arg(short = 'a', long)]
    pub address: Option<String>,

    /// Port to listen on
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Destination host
    #[arg(short = 'T', long = "target-address")]
    pub target_address: Option<String>,

    /// Destination port
    #[arg(short = 'P', long = "target-port")]
    pub target_port: Option<u16>,

    /// Minimal pause before a synthetic response, milliseconds
    #[arg(short = 'm', long = "min-pause")]
    pub min_pause: Option<i64>,

    /// Maximal pause before a synthetic response, milliseconds
    #[arg(short = 'M', long = "max-pause")]
    pub max_pause: Option<i64>,

    /// Trace this server's activity
    #[arg(short = 't', long)]
    pub tracing: bool,

    /// TOML configuration file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Delay strategy applied to responses
    #[arg(long, value_enum)]
    pub delay: Option<DelayStrategy>,

    /// Fixed delay or gap between chunks, milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Chunk size for per-chunk delay, bytes
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Body bytes sent before truncating
    #[arg(long)]
    pub cutoff: Option<u64>,

    /// Concurrent session limit, 0 for none
    #[arg(long)]
    pub max_sessions: Option<usize>,

    #[arg(long)]
    pub request_timeout_ms: Option<u64>,

    #[arg(long)]
    pub upstream_timeout_ms: Option<u64>,

    #[arg(long)]
    pub drain_timeout_ms: Option<u64>,

    /// Relay executable for the pipe topology
    #[arg(long)]
    pub relay_program: Option<String>,

    /// Translate `/data?year&month&day` queries and answer with a report
    #[arg(long)]
    pub data_query: bool,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    pub metrics_address: Option<String>,
}

impl Args {
    /// Write every given flag into `config`.
    pub fn apply(&self, config: &mut ServerConfig) {
        if self.address.is_some() || self.port.is_some() {
            config.listener.bind_address =
                override_host_port(&config.listener.bind_address, self.address.as_deref(), self.port);
        }
        if self.target_address.is_some() || self.target_port.is_some() {
            config.topology.destination =
                override_host_port(&config.topology.destination, self.target_address.as_deref(), self.target_port);
        }
        if let Some(min) = self.min_pause {
            config.synthetic.min_pause_ms = min;
        }
        if let Some(max) = self.max_pause {
            config.synthetic.max_pause_ms = max;
        }
        if self.tracing {
            config.observability.tracing = true;
        }
        if let Some(strategy) = self.delay {
            config.delay.strategy = strategy;
        }
        if let Some(delay_ms) = self.delay_ms {
            config.delay.delay_ms = delay_ms;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.delay.chunk_size = chunk_size;
        }
        if let Some(cutoff) = self.cutoff {
            config.delay.cutoff_bytes = cutoff;
        }
        if let Some(max_sessions) = self.max_sessions {
            config.listener.max_sessions = max_sessions;
        }
        if let Some(ms) = self.request_timeout_ms {
            config.timeouts.request_ms = ms;
        }
        if let Some(ms) = self.upstream_timeout_ms {
            config.timeouts.upstream_ms = ms;
        }
        if let Some(ms) = self.drain_timeout_ms {
            config.timeouts.drain_ms = ms;
        }
        if let Some(program) = &self.relay_program {
            config.topology.relay_program = Some(program.clone());
        }
        if self.data_query {
            config.topology.rewrite = Rewrite::DataQuery;
        }
        if let Some(address) = &self.metrics_address {
            config.observability.metrics_address = Some(address.clone());
        }
    }
}

/// Replace the host and/or port of a `host:port` string.
fn override_host_port(current: &str, host: Option<&str>, port: Option<u16>) -> String {
    let (current_host, current_port) = parse_host_port(current).unwrap_or(("localhost", 0));
    format!("{}:{}", host.unwrap_or(current_host), port.unwrap_or(current_port))
}

/// Defaults of each fixture binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Synthetic date endpoint on port 8090.
    DelayServer,
    /// Direct bridge on port 8080 towards the delay server.
    Bridge,
    /// Bridge on port 8080 that reaches the delay server through `bridge_relay`.
    PipeBridge,
}

impl Preset {
    pub fn name(&self) -> &'static str {
        match self {
            Preset::DelayServer => "delay_server",
            Preset::Bridge => "bridge_server",
            Preset::PipeBridge => "bridge_server_1_pipe",
        }
    }

    pub fn config(&self) -> ServerConfig {
        let mut config = ServerConfig::default();
        match self {
            Preset::DelayServer => {
                config.listener.bind_address = "localhost:8090".to_string();
                config.topology.mode = TopologyMode::Synthetic;
            }
            Preset::Bridge => {}
            Preset::PipeBridge => {
                config.topology.mode = TopologyMode::Pipe;
                config.topology.relay_program = sibling_relay();
            }
        }
        config
    }

    /// Fill in what depends on other settings once all layers are applied.
    fn finish(&self, config: &mut ServerConfig) {
        let topology = &mut config.topology;
        if topology.mode == TopologyMode::Pipe && topology.relay_args.is_empty() {
            let is_default_relay = topology
                .relay_program
                .as_deref()
                .map(Path::new)
                .and_then(Path::file_stem)
                .map_or(false, |stem| stem == RELAY_BINARY);
            if is_default_relay {
                topology.relay_args = vec!["--target".to_string(), topology.destination.clone()];
            }
        }
    }
}

/// `bridge_relay` in the directory of the running executable.
fn sibling_relay() -> Option<String> {
    let exe = std::env::current_exe().ok()?;
    let relay = exe.with_file_name(format!("{}{}", RELAY_BINARY, std::env::consts::EXE_SUFFIX));
    Some(relay.to_string_lossy().into_owned())
}

/// Layer preset, config file and flags, then validate.
pub fn build_config(preset: Preset, args: &Args) -> Result<ServerConfig, ConfigError> {
    let mut config = preset.config();
    if let Some(path) = &args.config {
        config = load_layered(&config, path)?;
    }
    args.apply(&mut config);
    preset.finish(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Entry point of the fixture binaries.
pub async fn run(preset: Preset) -> ExitCode {
    let args = Args::parse();
    match serve(preset, &args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(2)
        }
    }
}

/// Run a server until SIGINT/SIGTERM, then drain.
pub async fn serve(preset: Preset, args: &Args) -> Result<(), Error> {
    let config = build_config(preset, args)?;
    init_logging(
        &config.observability.log_level,
        config.observability.tracing,
        LogTarget::Stdout,
    );
    let runtime = RuntimeConfig::from_config(&config)?;

    if let Some(address) = &config.observability.metrics_address {
        // Validation guarantees a socket address.
        if let Ok(addr) = address.parse() {
            metrics::install_exporter(addr)?;
        }
    }

    tracing::info!(
        server = preset.name(),
        version = env!("CARGO_PKG_VERSION"),
        "Starting"
    );

    let server = Server::bind(&runtime.server, runtime.session).await?;
    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    signals::spawn_signal_handler(shutdown);

    let drained = server.run(stop).await;
    tracing::info!(
        completed = drained.completed,
        forced = drained.forced,
        "Shutdown complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("fixture").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn original_short_flags() {
        let args = args(&["-a", "0.0.0.0", "-p", "9000", "-T", "example", "-P", "81", "-m", "10", "-M", "20", "-t"]);
        let config = build_config(Preset::Bridge, &args).unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:9000");
        assert_eq!(config.topology.destination, "example:81");
        assert_eq!(config.synthetic.min_pause_ms, 10);
        assert_eq!(config.synthetic.max_pause_ms, 20);
        assert!(config.observability.tracing);
    }

    #[test]
    fn presets_pick_ports_and_modes() {
        let delay = build_config(Preset::DelayServer, &Args::default()).unwrap();
        assert_eq!(delay.listener.bind_address, "localhost:8090");
        assert_eq!(delay.topology.mode, TopologyMode::Synthetic);

        let bridge = build_config(Preset::Bridge, &Args::default()).unwrap();
        assert_eq!(bridge.listener.bind_address, "localhost:8080");
        assert_eq!(bridge.topology.destination, "localhost:8090");
    }

    #[test]
    fn pipe_preset_targets_destination_through_relay() {
        let config = build_config(Preset::PipeBridge, &args(&["-P", "9999"])).unwrap();
        assert_eq!(config.topology.mode, TopologyMode::Pipe);
        assert!(config.topology.relay_program.as_deref().unwrap().contains(RELAY_BINARY));
        assert_eq!(config.topology.relay_args, vec!["--target", "localhost:9999"]);
    }

    #[test]
    fn custom_relay_gets_no_implicit_args() {
        let config = build_config(Preset::PipeBridge, &args(&["--relay-program", "cat"])).unwrap();
        assert!(config.topology.relay_args.is_empty());
    }

    #[test]
    fn bad_pauses_are_reported() {
        let err = build_config(Preset::DelayServer, &args(&["-m", "-1"])).unwrap_err();
        assert!(err.to_string().contains("minimal pause can't be less or equal to 0"));
    }

    #[test]
    fn delay_flags() {
        let config = build_config(
            Preset::Bridge,
            &args(&["--delay", "per-chunk", "--chunk-size", "8", "--delay-ms", "20", "--data-query"]),
        )
        .unwrap();
        assert_eq!(config.delay.strategy, DelayStrategy::PerChunk);
        assert_eq!(config.delay.chunk_size, 8);
        assert_eq!(config.delay.delay_ms, 20);
        assert_eq!(config.topology.rewrite, Rewrite::DataQuery);
    }
}
