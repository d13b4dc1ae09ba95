//! Redis-backed window cache.
//!
//! Windows are Redis lists written with `RPUSH` + `LTRIM` inside one
//! `MULTI/EXEC` pipeline, so the trim is never observed half-applied.

use crate::cache::WindowCache;
use crate::error::{CacheError, CacheResult};
use crate::keys::Namespace;
use async_trait::async_trait;
use oi_core::{CurrentSnapshot, HistoricalSample, OpenInterest, Symbol, ThresholdState};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Keys requested per SCAN round-trip.
const SCAN_COUNT: usize = 500;

/// Redis connection settings.
#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
}

impl RedisSettings {
    fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis: RedisConnectionInfo {
                db: self.db,
                username: None,
                password: self.password.clone().filter(|p| !p.is_empty()),
                ..Default::default()
            },
        }
    }
}

/// Window cache on top of a shared Redis connection.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    window_size: usize,
}

impl RedisCache {
    /// Connect to Redis.
    pub async fn connect(settings: &RedisSettings, window_size: usize) -> CacheResult<Self> {
        info!(host = %settings.host, port = settings.port, db = settings.db, "Connecting to Redis");

        let client = Client::open(settings.connection_info())?;
        let conn = ConnectionManager::new(client).await?;

        Ok(Self {
            conn,
            window_size: window_size.max(1),
        })
    }

    fn decode<T: serde::de::DeserializeOwned>(key: &str, raw: &str) -> CacheResult<T> {
        serde_json::from_str(raw).map_err(|e| CacheError::Parse(format!("{key}: {e}")))
    }
}

#[async_trait]
impl WindowCache for RedisCache {
    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    fn window_size(&self) -> usize {
        self.window_size
    }

    async fn push_history(
        &self,
        symbol: &Symbol,
        samples: &[HistoricalSample],
    ) -> CacheResult<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let key = Namespace::History.key(symbol);
        let payloads = samples
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;

        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .rpush(&key, payloads)
            .ignore()
            .ltrim(&key, -(self.window_size as isize), -1)
            .ignore()
            .query_async(&mut conn)
            .await?;

        debug!(%symbol, pushed = samples.len(), key = %key, "Pushed samples into window");
        Ok(())
    }

    async fn read_window(&self, symbol: &Symbol) -> CacheResult<Vec<HistoricalSample>> {
        let key = Namespace::History.key(symbol);
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn.lrange(&key, 0, -1).await?;

        let mut window = Vec::with_capacity(raw.len());
        for entry in raw {
            match Self::decode::<HistoricalSample>(&key, &entry) {
                Ok(sample) => window.push(sample),
                Err(e) => warn!(%symbol, error = %e, "Skipping undecodable window entry"),
            }
        }
        Ok(window)
    }

    async fn set_current(&self, snapshot: &CurrentSnapshot) -> CacheResult<()> {
        let key = Namespace::Current.key(&snapshot.symbol);
        let payload = serde_json::to_string(snapshot)?;
        let mut conn = self.conn.clone();
        let _: () = conn.set(&key, payload).await?;
        Ok(())
    }

    async fn get_current(&self, symbol: &Symbol) -> CacheResult<Option<CurrentSnapshot>> {
        let key = Namespace::Current.key(symbol);
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(&key).await?;
        raw.map(|r| Self::decode(&key, &r)).transpose()
    }

    async fn get_threshold(&self, symbol: &Symbol) -> CacheResult<Option<ThresholdState>> {
        let key = Namespace::Threshold.key(symbol);
        let mut conn = self.conn.clone();
        let (raw, pttl): (Option<String>, i64) = redis::pipe()
            .get(&key)
            .pttl(&key)
            .query_async(&mut conn)
            .await?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let value: OpenInterest = raw
            .parse()
            .map_err(|e| CacheError::Parse(format!("{key}={raw:?}: {e}")))?;

        Ok(Some(ThresholdState {
            value,
            expires_in: (pttl > 0).then(|| Duration::from_millis(pttl as u64)),
        }))
    }

    async fn set_threshold(
        &self,
        symbol: &Symbol,
        value: OpenInterest,
        ttl: Duration,
    ) -> CacheResult<()> {
        let key = Namespace::Threshold.key(symbol);
        let ttl_ms = (ttl.as_millis() as u64).max(1);
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(&key)
            .arg(value.to_string())
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn clear_namespace(&self, namespace: Namespace) -> CacheResult<usize> {
        let pattern = namespace.pattern();
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut removed = 0usize;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let deleted: usize = redis::cmd("DEL").arg(&keys).query_async(&mut conn).await?;
                removed += deleted;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        info!(pattern = %pattern, removed, "Cleared cache namespace");
        Ok(removed)
    }
}
