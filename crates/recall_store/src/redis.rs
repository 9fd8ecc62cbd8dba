// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Redis-backed store.

use std::time::Duration;

use redis::aio::ConnectionManager;

use crate::{Error, RemoteStore, SetMode, SetOutcome, ttl_millis};

/// A [`RemoteStore`] backed by Redis.
///
/// Uses a multiplexed [`ConnectionManager`] that reconnects on its own, so clones are cheap
/// and share one connection. Writes use `SET ... PX` with millisecond expiry, and
/// [`SetMode::IfAbsent`] maps to `NX`.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").field("connection", &"ConnectionManager").finish()
    }
}

impl RedisStore {
    /// Wraps an existing connection manager.
    #[must_use]
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    /// Connects to the Redis server at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the initial connection fails.
    pub async fn from_url(url: &str) -> Result<Self, Error> {
        let client = redis::Client::open(url).map_err(Error::from_message)?;
        let connection = ConnectionManager::new(client).await.map_err(Error::from_message)?;

        tracing::debug!(url = %redact_url(url), "connected to redis");

        Ok(Self { connection })
    }
}

impl RemoteStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        let mut connection = self.connection.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut connection)
            .await
            .map_err(Error::from_message)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration, mode: SetMode) -> Result<SetOutcome, Error> {
        let mut connection = self.connection.clone();
        let mut command = redis::cmd("SET");
        command.arg(key).arg(value).arg("PX").arg(ttl_millis(ttl));
        if mode == SetMode::IfAbsent {
            command.arg("NX");
        }

        // NX writes reply with nil when the key already exists.
        let reply: Option<String> = command.query_async(&mut connection).await.map_err(Error::from_message)?;
        Ok(if reply.is_some() {
            SetOutcome::Stored
        } else {
            SetOutcome::AlreadyExists
        })
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        let mut connection = self.connection.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<()>(&mut connection)
            .await
            .map_err(Error::from_message)
    }
}

/// Hides the password in a connection URL so it can be logged.
fn redact_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://").map(|i| i + 3) else {
        return url.to_owned();
    };
    let rest = &url[scheme_end..];
    let Some(at) = rest.find('@') else {
        return url.to_owned();
    };

    let userinfo = &rest[..at];
    let host = &rest[at..];
    match userinfo.find(':') {
        Some(colon) => format!("{}{}:***{host}", &url[..scheme_end], &userinfo[..colon]),
        None => url.to_owned(),
    }
}
