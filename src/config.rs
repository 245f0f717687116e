//! Runtime configuration read from the environment, and the league-status lives table.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_LIVES: u32 = 3;

/// Starting lives per league status.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LivesTable {
    pub by_status: HashMap<String, u32>,
    /// Used for statuses missing from `by_status`.
    pub default_lives: u32,
}

impl Default for LivesTable {
    /// Stronger league tiers start with fewer lives.
    fn default() -> Self {
        let by_status = [("A", 2), ("B", 3), ("C", 4)]
            .into_iter()
            .map(|(s, l)| (s.to_string(), l))
            .collect();
        Self {
            by_status,
            default_lives: DEFAULT_LIVES,
        }
    }
}

impl LivesTable {
    pub fn new(by_status: HashMap<String, u32>, default_lives: u32) -> Self {
        Self {
            by_status,
            default_lives,
        }
    }

    /// Starting lives for a status (case-insensitive).
    pub fn lives_for(&self, status: &str) -> u32 {
        let status = status.trim();
        self.by_status
            .iter()
            .find(|(s, _)| s.eq_ignore_ascii_case(status))
            .map(|(_, &l)| l)
            .unwrap_or(self.default_lives)
    }

    /// Parse `"A=2,B=3"`. Malformed entries are logged and skipped.
    pub fn parse(spec: &str, default_lives: u32) -> Self {
        let mut by_status = HashMap::new();
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let parsed = entry
                .split_once('=')
                .and_then(|(s, l)| Some((s.trim(), l.trim().parse::<u32>().ok()?)))
                .filter(|(s, l)| !s.is_empty() && *l > 0);
            match parsed {
                Some((status, lives)) => {
                    by_status.insert(status.to_string(), lives);
                }
                None => log::warn!("Ignoring invalid LIVES_BY_STATUS entry {:?}", entry),
            }
        }
        Self::new(by_status, default_lives)
    }
}

/// Web server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub lives_table: LivesTable,
    /// Cookie signing key material; a random key is generated when missing.
    pub session_key: Option<Vec<u8>>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl ServerConfig {
    /// Read HOST, PORT, DEFAULT_LIVES, LIVES_BY_STATUS and SESSION_KEY.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let host = lookup("HOST").unwrap_or_else(default_host);
        let port: u16 = lookup("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or_else(default_port);
        let default_lives = lookup("DEFAULT_LIVES")
            .and_then(|l| l.parse().ok())
            .filter(|&l| l > 0)
            .unwrap_or(DEFAULT_LIVES);
        let lives_table = match lookup("LIVES_BY_STATUS") {
            Some(spec) => LivesTable::parse(&spec, default_lives),
            None => LivesTable {
                default_lives,
                ..LivesTable::default()
            },
        };
        let session_key = lookup("SESSION_KEY")
            .map(String::into_bytes)
            .filter(|k| {
                let ok = k.len() >= 64;
                if !ok {
                    log::warn!("SESSION_KEY shorter than 64 bytes; using a random key");
                }
                ok
            });
        Self {
            host,
            port,
            lives_table,
            session_key,
        }
    }
}
