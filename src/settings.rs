use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;

use crate::handler::Handler;
use crate::http::HttpConfig;
use crate::socks::socks4::Socks4Config;
use crate::socks::socks5::Socks5Config;

/// One listener's configuration, as read from the settings file. Tagged by
/// `kind` so a single TOML array of tables can mix protocols.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProxyDef {
    Socks5 {
        bind: SocketAddr,
        username: Option<String>,
        password: Option<String>,
    },
    Socks4 {
        bind: SocketAddr,
        userid: Option<String>,
    },
    Http {
        bind: SocketAddr,
        username: Option<String>,
        password: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(rename = "proxy")]
    pub proxies: Vec<ProxyDef>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            proxies: vec![
                ProxyDef::Socks5 {
                    bind: "127.0.0.1:1080".parse().unwrap(),
                    username: None,
                    password: None,
                },
                ProxyDef::Socks4 {
                    bind: "127.0.0.1:1081".parse().unwrap(),
                    userid: None,
                },
                ProxyDef::Http {
                    bind: "127.0.0.1:8080".parse().unwrap(),
                    username: None,
                    password: None,
                },
            ],
        }
    }
}

/// A listener's bind address paired with its already-constructed handler,
/// ready to hand to [`crate::listener::run_listener`].
pub struct ProxyEntry {
    pub bind_addr: SocketAddr,
    pub handler: Handler,
}

fn merge_credentials(username: Option<String>, password: Option<String>) -> Option<(String, String)> {
    match (username, password) {
        (Some(u), Some(p)) => Some((u, p)),
        _ => None,
    }
}

impl From<ProxyDef> for ProxyEntry {
    fn from(def: ProxyDef) -> Self {
        match def {
            ProxyDef::Socks5 { bind, username, password } => ProxyEntry {
                bind_addr: bind,
                handler: Handler::socks5(Socks5Config {
                    credentials: merge_credentials(username, password),
                }),
            },
            ProxyDef::Socks4 { bind, userid } => ProxyEntry {
                bind_addr: bind,
                handler: Handler::socks4(Socks4Config { userid }),
            },
            ProxyDef::Http { bind, username, password } => ProxyEntry {
                bind_addr: bind,
                handler: Handler::http(HttpConfig {
                    credentials: merge_credentials(username, password),
                }),
            },
        }
    }
}

impl Settings {
    pub fn into_entries(self) -> Vec<ProxyEntry> {
        self.proxies.into_iter().map(ProxyEntry::from).collect()
    }
}

/// Loads settings from `path` if it exists, otherwise falls back to the
/// built-in default listener set.
pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Settings> {
    match path {
        Some(path) if path.exists() => {
            let text = std::fs::read_to_string(path)?;
            let settings: Settings = toml::from_str(&text)?;
            Ok(settings)
        }
        _ => Ok(Settings::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_has_one_listener_per_protocol() {
        let settings = Settings::default();
        assert_eq!(settings.proxies.len(), 3);
    }

    #[test]
    fn parses_mixed_proxy_table_from_toml() {
        let text = r#"
            [[proxy]]
            kind = "socks5"
            bind = "127.0.0.1:1080"
            username = "user"
            password = "pass"

            [[proxy]]
            kind = "http"
            bind = "127.0.0.1:8080"
        "#;
        let settings: Settings = toml::from_str(text).unwrap();
        assert_eq!(settings.proxies.len(), 2);
        match &settings.proxies[0] {
            ProxyDef::Socks5 { username, .. } => assert_eq!(username.as_deref(), Some("user")),
            _ => panic!("expected socks5 entry"),
        }
    }
}
