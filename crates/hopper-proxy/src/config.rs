use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_motd")]
    pub motd: String,
    #[serde(default = "default_max_players")]
    pub max_players: u32,
}

fn default_bind() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    25565
}

fn default_motd() -> String {
    "A Hopper Proxy".into()
}

fn default_max_players() -> u32 {
    20
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            motd: default_motd(),
            max_players: default_max_players(),
        }
    }
}

impl ProxyConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: ProxyConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::info!("No config file found at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_field_defaults() {
        let config: ProxyConfig = toml::from_str("port = 25577").unwrap();
        assert_eq!(config.port, 25577);
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.motd, "A Hopper Proxy");
        assert_eq!(config.max_players, 20);
    }
}
