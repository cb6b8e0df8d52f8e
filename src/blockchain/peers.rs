use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

/// Errors that can occur while registering peers
#[derive(Debug, Error, PartialEq)]
pub enum PeerError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

/// Extracts `host[:port]` from a URL-like address.
///
/// Scheme, userinfo, path, query and fragment are dropped, so
/// `http://192.168.0.5:5000/chain` and `192.168.0.5:5000` both yield
/// `192.168.0.5:5000`.
pub fn parse_peer_address(address: &str) -> Result<String, PeerError> {
    let invalid = || PeerError::InvalidAddress(address.to_string());

    let trimmed = address.trim();
    let rest = match trimmed.find("://") {
        Some(pos) => &trimmed[pos + 3..],
        None => trimmed,
    };

    let authority = rest
        .split(|c| c == '/' || c == '?' || c == '#')
        .next()
        .unwrap_or_default();
    let host_port = match authority.rfind('@') {
        Some(pos) => &authority[pos + 1..],
        None => authority,
    };

    if host_port.is_empty() || host_port.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    // Bracketed IPv6 literals carry colons of their own
    let (host, port) = if let Some(stripped) = host_port.strip_prefix('[') {
        let end = stripped.find(']').ok_or_else(invalid)?;
        let after = &stripped[end + 1..];
        let port = match after.strip_prefix(':') {
            Some(port) => Some(port),
            None if after.is_empty() => None,
            None => return Err(invalid()),
        };
        (&stripped[..end], port)
    } else {
        match host_port.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (host_port, None),
        }
    };

    if host.is_empty() {
        return Err(invalid());
    }

    if let Some(port) = port {
        port.parse::<u16>().map_err(|_| invalid())?;
    }

    Ok(host_port.to_lowercase())
}

/// Deduplicated set of known peer locations.
///
/// Iteration is in sorted order, which keeps conflict resolution
/// reproducible across runs.
#[derive(Debug, Default)]
pub struct PeerSet {
    peers: Mutex<BTreeSet<String>>,
}

impl PeerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `address` and adds it to the set
    ///
    /// # Returns
    ///
    /// The normalized location and whether it was newly added
    pub fn register(&self, address: &str) -> Result<(String, bool), PeerError> {
        let location = parse_peer_address(address)?;
        let added = self
            .peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(location.clone());
        Ok((location, added))
    }

    /// Snapshot of all known peers in sorted order
    pub fn snapshot(&self) -> Vec<String> {
        self.peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}
