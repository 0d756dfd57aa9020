use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::{transport::Transport, ClientConfig, HttpClient, HttpError, Result};

/// Idle threshold applied to pooled clients that do not set one.
pub const POOL_AUTO_DISPOSE_AFTER_MS: u64 = 300_000;

/// Keyed cache of [`HttpClient`]s, one per distinct configuration.
///
/// Entries whose client has been disposed (explicitly or after idling) are
/// replaced on the next lookup.
#[derive(Default)]
pub struct ClientPool {
    clients: Mutex<HashMap<String, HttpClient>>,
    transport: Option<Arc<dyn Transport>>,
}

impl fmt::Debug for ClientPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientPool")
            .field("clients", &self.len())
            .field("shared_transport", &self.transport.is_some())
            .finish()
    }
}

impl ClientPool {
    /// Creates an empty pool whose clients each build a `reqwest` transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty pool whose clients all share `transport`.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            transport: Some(transport),
        }
    }

    /// Process-wide pool, created on first use.
    pub fn global() -> &'static ClientPool {
        static GLOBAL: OnceLock<ClientPool> = OnceLock::new();
        GLOBAL.get_or_init(ClientPool::new)
    }

    /// Returns the live client for `config`, creating it if needed.
    pub fn get_client(&self, mut config: ClientConfig) -> Result<HttpClient> {
        if config.auto_dispose_after_ms.is_none() {
            config.auto_dispose_after_ms = Some(POOL_AUTO_DISPOSE_AFTER_MS);
        }
        let key = pool_key(&config)?;

        let mut clients = self.lock_clients();
        if let Some(client) = clients.get(&key) {
            if !client.is_disposed() {
                return Ok(client.clone());
            }
        }

        let client = match &self.transport {
            Some(transport) => HttpClient::with_transport(config, Arc::clone(transport)),
            None => HttpClient::new(config)?,
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(pooled = clients.len() + 1, "pooled new client");

        clients.insert(key, client.clone());
        Ok(client)
    }

    /// Disposes every pooled client and empties the pool.
    pub fn dispose_all(&self) {
        let drained: Vec<HttpClient> = self.lock_clients().drain().map(|(_, client)| client).collect();
        for client in drained {
            client.dispose();
        }
    }

    /// Number of entries, including ones whose client has since been disposed.
    pub fn len(&self) -> usize {
        self.lock_clients().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_clients(&self) -> MutexGuard<'_, HashMap<String, HttpClient>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Canonical key for `config`.
///
/// Fields serialize in declaration order and headers live in a `BTreeMap`, so
/// two equal configurations always produce the same key.
pub(crate) fn pool_key(config: &ClientConfig) -> Result<String> {
    serde_json::to_string(config)
        .map_err(|err| HttpError::Config(format!("cannot derive pool key: {err}")))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::pool_key;
    use crate::{ClientConfig, ProxySetting};

    #[test]
    fn key_ignores_header_insertion_order() {
        let mut first = BTreeMap::new();
        first.insert("b".to_owned(), "2".to_owned());
        first.insert("a".to_owned(), "1".to_owned());
        let mut second = BTreeMap::new();
        second.insert("a".to_owned(), "1".to_owned());
        second.insert("b".to_owned(), "2".to_owned());

        let left = ClientConfig {
            headers: first,
            ..ClientConfig::with_base_url("https://api.test")
        };
        let right = ClientConfig {
            headers: second,
            ..ClientConfig::with_base_url("https://api.test")
        };
        assert_eq!(pool_key(&left).expect("key"), pool_key(&right).expect("key"));
    }

    #[test]
    fn key_distinguishes_settings() {
        let plain = ClientConfig::default();
        let no_proxy = ClientConfig {
            proxy: ProxySetting::Disabled,
            ..ClientConfig::default()
        };
        assert_ne!(pool_key(&plain).expect("key"), pool_key(&no_proxy).expect("key"));
    }
}
