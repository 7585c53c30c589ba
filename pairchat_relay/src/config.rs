// Relay configuration.
//
// Every setting can come from a command-line flag or an environment
// variable; flags win. The listen port reads the conventional `PORT`
// variable so the relay drops into PaaS environments unchanged. Tests build
// `RelayConfig` directly, usually with `port: 0` so the OS picks a free port.

use clap::{Parser, ValueEnum};
use tracing::info;

/// Port used when neither `--port` nor `PORT` is given.
pub const DEFAULT_PORT: u16 = 3000;

/// Who hears about a disconnect.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum DisconnectNotice {
    /// Only the departing endpoint's current partner.
    #[default]
    Partner,
    /// Every other connected endpoint. Clients ignore notices for ids that
    /// aren't their partner.
    Broadcast,
}

/// What happens to the still-connected half of a pair whose other half
/// vanished before the match was delivered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum SurvivorPolicy {
    /// Put it back at the head of the wait queue.
    #[default]
    Requeue,
    /// Leave it unqueued; the client has to send `queue-join` again.
    Drop,
}

/// Matchmaking relay for anonymous peer-to-peer chat.
#[derive(Parser, Clone, Debug)]
#[command(name = "pairchat-relay", version, about)]
pub struct RelayConfig {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind
    #[arg(long = "bind", env = "PAIRCHAT_BIND", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Who is told when an endpoint disconnects
    #[arg(long, env = "PAIRCHAT_DISCONNECT_NOTICE", value_enum, default_value_t = DisconnectNotice::Partner)]
    pub disconnect_notice: DisconnectNotice,

    /// Fate of the surviving half of a pair that could not be matched
    #[arg(long, env = "PAIRCHAT_SURVIVOR", value_enum, default_value_t = SurvivorPolicy::Requeue)]
    pub survivor: SurvivorPolicy,

    /// Emit logs as JSON lines
    #[arg(long, env = "PAIRCHAT_JSON_LOGS")]
    pub json_logs: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_address: "0.0.0.0".into(),
            disconnect_notice: DisconnectNotice::default(),
            survivor: SurvivorPolicy::default(),
            json_logs: false,
        }
    }
}

impl RelayConfig {
    /// Loopback config on an OS-assigned port.
    pub fn ephemeral() -> Self {
        Self {
            port: 0,
            bind_address: "127.0.0.1".into(),
            ..Self::default()
        }
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn log_config(&self) {
        info!(
            listen = %self.listen_address(),
            disconnect_notice = ?self.disconnect_notice,
            survivor = ?self.survivor,
            "relay configuration"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let config = RelayConfig::try_parse_from([
            "pairchat-relay",
            "--port",
            "8080",
            "--bind",
            "127.0.0.1",
            "--disconnect-notice",
            "broadcast",
            "--survivor",
            "drop",
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.listen_address(), "127.0.0.1:8080");
        assert_eq!(config.disconnect_notice, DisconnectNotice::Broadcast);
        assert_eq!(config.survivor, SurvivorPolicy::Drop);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let result =
            RelayConfig::try_parse_from(["pairchat-relay", "--disconnect-notice", "everyone"]);
        assert!(result.is_err());
    }

    #[test]
    fn ephemeral_binds_loopback_port_zero() {
        let config = RelayConfig::ephemeral();
        assert_eq!(config.listen_address(), "127.0.0.1:0");
        assert_eq!(config.disconnect_notice, DisconnectNotice::Partner);
        assert_eq!(config.survivor, SurvivorPolicy::Requeue);
    }
}
