use std::env;
use std::str::FromStr;
use std::time::Duration;

use log::warn;
use uuid::Uuid;

use crate::blockchain::proof::{DEFAULT_DIFFICULTY, MAX_DIFFICULTY};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_PEER_TIMEOUT_SECS: u64 = 5;

/// Node settings read from the environment
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,

    /// Leading hex zeros required by the proof of work
    pub difficulty: usize,

    /// Identifier credited with this node's mining rewards
    pub node_id: String,

    /// Timeout for fetching a peer's chain
    pub peer_timeout: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            difficulty: DEFAULT_DIFFICULTY,
            node_id: new_node_id(),
            peer_timeout: Duration::from_secs(DEFAULT_PEER_TIMEOUT_SECS),
        }
    }
}

impl NodeConfig {
    /// Loads the configuration from the process environment
    ///
    /// Recognized variables: `HOST`, `PORT`, `POW_DIFFICULTY`, `NODE_ID`
    /// and `PEER_TIMEOUT_SECS`. Missing or unparseable values fall back to
    /// their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = NodeConfig::default();

        let difficulty = parse_or(&lookup, "POW_DIFFICULTY", defaults.difficulty);
        if difficulty > MAX_DIFFICULTY {
            warn!(
                "POW_DIFFICULTY {} exceeds {}, capping",
                difficulty, MAX_DIFFICULTY
            );
        }

        NodeConfig {
            host: lookup("HOST")
                .filter(|host| !host.trim().is_empty())
                .unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port),
            difficulty: difficulty.min(MAX_DIFFICULTY),
            node_id: lookup("NODE_ID")
                .filter(|id| !id.trim().is_empty())
                .unwrap_or(defaults.node_id),
            peer_timeout: Duration::from_secs(parse_or(
                &lookup,
                "PEER_TIMEOUT_SECS",
                DEFAULT_PEER_TIMEOUT_SECS,
            )),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring unparseable {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}

/// A fresh node identifier: a v4 UUID without hyphens
pub fn new_node_id() -> String {
    Uuid::new_v4().simple().to_string()
}
