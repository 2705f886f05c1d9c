//! Immutable runtime values derived from a validated configuration.

use std::time::Duration;

use crate::config::loader::ConfigError;
use crate::config::schema::{ServerConfig, TopologyMode};
use crate::config::validation::{validate_config, ValidationError};
use crate::delay::{DelayPolicy, DelayStrategy};
use crate::http::ParserLimits;
use crate::server::ServerSettings;
use crate::session::{BridgeTopology, PauseRange, PhaseTimeouts, SessionContext};
use crate::transport::RelaySpec;

/// Everything a server needs, in the types the core works with.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub server: ServerSettings,
    pub session: SessionContext,
}

impl RuntimeConfig {
    pub fn from_config(config: &ServerConfig) -> Result<Self, ConfigError> {
        validate_config(config).map_err(ConfigError::Validation)?;

        let server = ServerSettings {
            bind_address: config.listener.bind_address.clone(),
            max_sessions: (config.listener.max_sessions > 0).then_some(config.listener.max_sessions),
            drain_timeout: Duration::from_millis(config.timeouts.drain_ms),
        };

        let session = SessionContext {
            topology: topology(config)?,
            delay: delay_policy(config),
            timeouts: PhaseTimeouts {
                connect: Duration::from_millis(config.timeouts.connect_ms),
                request: Duration::from_millis(config.timeouts.request_ms),
                upstream: Duration::from_millis(config.timeouts.upstream_ms),
            },
            limits: ParserLimits {
                max_line_bytes: config.http.max_line_bytes,
                max_headers: config.http.max_headers,
            },
            rewrite: config.topology.rewrite,
            max_buffered_body: config.http.max_buffered_body,
        };

        Ok(Self { server, session })
    }
}

fn topology(config: &ServerConfig) -> Result<BridgeTopology, ConfigError> {
    let topology = &config.topology;
    Ok(match topology.mode {
        TopologyMode::Direct => BridgeTopology::Direct {
            destination: topology.destination.clone(),
        },
        TopologyMode::Pipe => {
            let program = topology.relay_program.clone().unwrap_or_default();
            let relay = topology
                .relay_args
                .iter()
                .fold(RelaySpec::new(program), |relay, arg| relay.arg(arg.as_str()));
            BridgeTopology::Pipe {
                relay,
                destination: topology.destination.clone(),
            }
        }
        TopologyMode::Synthetic => {
            let pause = u64::try_from(config.synthetic.min_pause_ms)
                .ok()
                .zip(u64::try_from(config.synthetic.max_pause_ms).ok())
                .and_then(|(min, max)| PauseRange::new(min, max))
                .ok_or_else(|| {
                    ConfigError::Validation(vec![ValidationError {
                        field: "synthetic",
                        message: "invalid pause range".to_string(),
                    }])
                })?;
            BridgeTopology::Synthetic { pause }
        }
    })
}

fn delay_policy(config: &ServerConfig) -> DelayPolicy {
    let delay = &config.delay;
    match delay.strategy {
        DelayStrategy::None => DelayPolicy::None,
        DelayStrategy::Fixed => DelayPolicy::Fixed {
            delay: Duration::from_millis(delay.delay_ms),
        },
        DelayStrategy::PerChunk => DelayPolicy::PerChunk {
            chunk_size: delay.chunk_size,
            delay: Duration::from_millis(delay.delay_ms),
        },
        DelayStrategy::Truncate => DelayPolicy::TruncateAfter {
            bytes: delay.cutoff_bytes,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_derive_direct_bridge() {
        let runtime = RuntimeConfig::from_config(&ServerConfig::default()).unwrap();
        assert_eq!(
            runtime.session.topology,
            BridgeTopology::Direct {
                destination: "localhost:8090".to_string()
            }
        );
        assert_eq!(runtime.session.delay, DelayPolicy::None);
        assert_eq!(runtime.server.max_sessions, None);
    }

    #[test]
    fn pipe_mode_carries_relay_and_destination() {
        let mut config = ServerConfig::default();
        config.topology.mode = TopologyMode::Pipe;
        config.topology.relay_program = Some("/usr/bin/relay".to_string());
        config.topology.relay_args = vec!["--target".to_string(), "localhost:8090".to_string()];
        config.listener.max_sessions = 3;

        let runtime = RuntimeConfig::from_config(&config).unwrap();
        let BridgeTopology::Pipe { relay, destination } = runtime.session.topology else {
            panic!("expected pipe topology");
        };
        assert_eq!(relay.program.to_str(), Some("/usr/bin/relay"));
        assert_eq!(relay.args, vec!["--target", "localhost:8090"]);
        assert_eq!(destination, "localhost:8090");
        assert_eq!(runtime.server.max_sessions, Some(3));
    }

    #[test]
    fn delay_settings_become_policy() {
        let mut config = ServerConfig::default();
        config.delay.strategy = DelayStrategy::PerChunk;
        config.delay.chunk_size = 64;
        config.delay.delay_ms = 250;

        let runtime = RuntimeConfig::from_config(&config).unwrap();
        assert_eq!(
            runtime.session.delay,
            DelayPolicy::PerChunk {
                chunk_size: 64,
                delay: Duration::from_millis(250)
            }
        );
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = ServerConfig::default();
        config.timeouts.request_ms = 0;
        assert!(matches!(
            RuntimeConfig::from_config(&config),
            Err(ConfigError::Validation(_))
        ));
    }
}
