//! Hublist side of the registration exchange.
//!
//! One task per accepted connection. Each connection gets a single deadline
//! covering lock, key and all fields; it is not refreshed per read.

use std::num::ParseIntError;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use dcpp_common::nmdc_unescape;
use log::{debug, error, info, warn};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::timeout;

use crate::error::{AutoregError, AutoregResult};
use crate::framing::TokenReader;
use crate::handshake::{
    default_party_key, KeyDerivation, Lock, LockChallenge, NmdcKeyDerivation, Responder,
};
use crate::info::{HubInfo, Registry};

/// Deadline for a whole registration connection.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Capacity of the per-connection token buffer.
const TOKEN_BUFFER_SIZE: usize = 2048;

/// Registration server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub handshake_timeout: Duration,
    pub lock: LockChallenge,
    /// Identifier sent as the lock's `Pk=`.
    pub party_key: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: HANDSHAKE_TIMEOUT,
            lock: LockChallenge::default(),
            party_key: default_party_key(),
        }
    }
}

struct ServerInner<R> {
    registry: R,
    config: ServerConfig,
    derivation: Box<dyn KeyDerivation>,
}

/// Hublist registration server.
pub struct Server<R> {
    inner: Arc<ServerInner<R>>,
}

impl<R> Clone for Server<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R> Server<R>
where
    R: Registry + 'static,
{
    pub fn new(registry: R) -> Self {
        Self::with_config(registry, ServerConfig::default())
    }

    pub fn with_config(registry: R, config: ServerConfig) -> Self {
        Self::with_key_derivation(registry, config, NmdcKeyDerivation)
    }

    pub fn with_key_derivation(
        registry: R,
        config: ServerConfig,
        derivation: impl KeyDerivation + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                registry,
                config,
                derivation: Box::new(derivation),
            }),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &R {
        &self.inner.registry
    }

    /// Accept connections until the listener fails.
    ///
    /// Per-connection failures are logged and never stop the loop.
    pub async fn serve(&self, listener: TcpListener) -> AutoregResult<()> {
        info!(
            "Hublist registration server listening on {}",
            listener.local_addr()?
        );

        loop {
            let (stream, peer_addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Accept error: {}", e);
                    return Err(e.into());
                }
            };
            debug!("Registration connection from {}", peer_addr);

            let server = self.clone();
            tokio::spawn(async move {
                if let Err(e) = server.serve_conn(stream).await {
                    debug!("Registration from {} failed: {}", peer_addr, e);
                }
            });
        }
    }

    /// Handle one registration connection under the handshake deadline.
    ///
    /// The stream is closed when this returns, whatever the outcome.
    pub async fn serve_conn<S>(&self, stream: S) -> AutoregResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        timeout(self.inner.config.handshake_timeout, self.exchange(stream)).await?
    }

    async fn exchange<S>(&self, mut stream: S) -> AutoregResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let lock = Lock::new(
            self.inner.config.lock.generate(),
            self.inner.config.party_key.clone(),
        );
        let mut responder = Responder::new(lock, self.inner.derivation.as_ref());
        stream.write_all(&responder.lock_command()).await?;
        stream.flush().await?;

        let mut tokens = TokenReader::new(&mut stream, TOKEN_BUFFER_SIZE);
        let key = tokens.expect_token().await?;
        if let Err(e) = responder.verify(key) {
            warn!("Rejected registration key: {}", e);
            return Err(e);
        }

        let info = HubInfo {
            name: read_escaped(&mut tokens).await?,
            host: read_raw(&mut tokens).await?,
            description: read_escaped(&mut tokens).await?,
            users: read_number(&mut tokens, "user count").await?,
            share: read_number(&mut tokens, "share size").await?,
        };

        let name = info.name.clone();
        let host = info.host.clone();
        self.inner
            .registry
            .register_hub(info)
            .map_err(AutoregError::Registry)?;
        info!("Registered hub '{}' at {}", name, host);
        Ok(())
    }
}

async fn read_raw<R>(tokens: &mut TokenReader<R>) -> AutoregResult<String>
where
    R: AsyncRead + Unpin,
{
    let token = tokens.expect_token().await?;
    Ok(String::from_utf8_lossy(token).into_owned())
}

async fn read_escaped<R>(tokens: &mut TokenReader<R>) -> AutoregResult<String>
where
    R: AsyncRead + Unpin,
{
    Ok(nmdc_unescape(&read_raw(tokens).await?))
}

async fn read_number<R, T>(tokens: &mut TokenReader<R>, field: &'static str) -> AutoregResult<T>
where
    R: AsyncRead + Unpin,
    T: FromStr<Err = ParseIntError>,
{
    let raw = read_raw(tokens).await?;
    raw.parse()
        .map_err(|source| AutoregError::InvalidNumber { field, source })
}
