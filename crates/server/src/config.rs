use std::env;

use crate::protocol::is_allowed_time_control;

/// Fallback when `DEFAULT_TIME_CONTROL` is unset or not an allowed value.
pub const DEFAULT_TIME_CONTROL: u32 = 600;

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub moderation_host: String,
    pub moderation_port: u16,
    /// Seconds per side when the handshake omits a time control.
    pub default_time_control: u32,
    /// Clock task period in milliseconds.
    pub clock_tick_ms: u64,
    pub blocklist_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            moderation_host: "127.0.0.1".to_string(),
            moderation_port: 8001,
            default_time_control: DEFAULT_TIME_CONTROL,
            clock_tick_ms: 1000,
            blocklist_path: "data/nickname_blocklist.txt".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let default_time_control = match env::var("DEFAULT_TIME_CONTROL")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            Some(tc) if is_allowed_time_control(tc) => tc,
            Some(tc) => {
                tracing::warn!(
                    "DEFAULT_TIME_CONTROL={} is not an allowed value, using {}",
                    tc,
                    DEFAULT_TIME_CONTROL
                );
                DEFAULT_TIME_CONTROL
            }
            None => DEFAULT_TIME_CONTROL,
        };

        Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            moderation_host: env::var("MODERATION_HOST").unwrap_or(defaults.moderation_host),
            moderation_port: env::var("MODERATION_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.moderation_port),
            default_time_control,
            clock_tick_ms: env::var("CLOCK_TICK_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|ms| *ms > 0)
                .unwrap_or(defaults.clock_tick_ms),
            blocklist_path: env::var("NICKNAME_BLOCKLIST").unwrap_or(defaults.blocklist_path),
        }
    }
}
