use serde::Deserialize;

/// Complete server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MenagerieConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub tick: TickConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub rooms: RoomsConfig,
}

/// HTTP/WebSocket listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Pet store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// SQLite database path; ":memory:" for an ephemeral world
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_path() -> String {
    "menagerie.db".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Decay scheduler configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TickConfig {
    /// Seconds between full-population decay passes
    #[serde(default = "default_tick_interval")]
    pub interval_seconds: u64,
    /// Amount subtracted from hunger, hygiene and fun per pass
    #[serde(default = "default_decay_amount")]
    pub decay_amount: u8,
    /// Soft per-cycle deadline; a pass stops early past this
    #[serde(default = "default_cycle_deadline")]
    pub cycle_deadline_seconds: u64,
}

fn default_tick_interval() -> u64 {
    300
}

fn default_decay_amount() -> u8 {
    25
}

fn default_cycle_deadline() -> u64 {
    60
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_tick_interval(),
            decay_amount: default_decay_amount(),
            cycle_deadline_seconds: default_cycle_deadline(),
        }
    }
}

/// Notification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    /// Window within which an identical (pet, message) alert is suppressed
    #[serde(default = "default_dedup_window")]
    pub dedup_window_ms: u64,
}

fn default_dedup_window() -> u64 {
    2000
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            dedup_window_ms: default_dedup_window(),
        }
    }
}

/// Geo room configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RoomsConfig {
    /// Proximity query radius in meters when the client omits one
    #[serde(default = "default_radius")]
    pub default_radius_m: f64,
}

fn default_radius() -> f64 {
    1000.0
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            default_radius_m: default_radius(),
        }
    }
}

impl Default for MenagerieConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            tick: TickConfig::default(),
            notify: NotifyConfig::default(),
            rooms: RoomsConfig::default(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<MenagerieConfig, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let config: MenagerieConfig = toml::from_str(&contents)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MenagerieConfig::default();
        assert_eq!(config.server.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.tick.interval_seconds, 300);
        assert_eq!(config.tick.decay_amount, 25);
        assert_eq!(config.notify.dedup_window_ms, 2000);
        assert_eq!(config.rooms.default_radius_m, 1000.0);
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [server]
            bind_addr = "127.0.0.1:8080"

            [store]
            path = "/var/lib/menagerie/world.db"

            [tick]
            interval_seconds = 60
            decay_amount = 5
            cycle_deadline_seconds = 10

            [notify]
            dedup_window_ms = 500

            [rooms]
            default_radius_m = 250.0
        "#;

        let config: MenagerieConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.store.path, "/var/lib/menagerie/world.db");
        assert_eq!(config.tick.interval_seconds, 60);
        assert_eq!(config.tick.decay_amount, 5);
        assert_eq!(config.tick.cycle_deadline_seconds, 10);
        assert_eq!(config.notify.dedup_window_ms, 500);
        assert_eq!(config.rooms.default_radius_m, 250.0);
    }

    #[test]
    fn test_partial_config() {
        // Missing sections use defaults
        let toml = r#"
            [tick]
            interval_seconds = 30
        "#;

        let config: MenagerieConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.tick.interval_seconds, 30);
        assert_eq!(config.tick.decay_amount, 25); // Default
        assert_eq!(config.store.path, "menagerie.db"); // Default
    }
}
