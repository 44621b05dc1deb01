// SPDX-License-Identifier: MIT

//! Low-level RouterOS API connection handling
//!
//! One connection per logical operation: connect, login, execute, close.
//! Nothing here retries; callers decide retry policy. A connection is
//! `&mut self` throughout, so only one command can be in flight per socket.

mod auth;

use std::collections::HashMap;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;

use super::protocol::{encode_sentence, read_length};
use super::tls;
use crate::config::RouterConfig;
use crate::error::{AppError, Result};

/// Connect timeout (TCP and TLS handshake combined)
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-command read timeout
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-command write timeout
///
/// A peer that accepts the connection but stops reading would otherwise
/// block `write_all` forever once the send buffer fills.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// One decoded reply row: attribute key to value
pub(crate) type Row = HashMap<String, String>;

trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// Raw outcome of one command: `!re` rows plus any `!trap` rows
///
/// Login needs the traps unthrown to tell credential failure apart from
/// network failure; everything else goes through [`RouterOsConnection::execute`].
pub(crate) struct CommandReply {
    pub rows: Vec<Row>,
    pub traps: Vec<Row>,
}

impl CommandReply {
    pub(crate) fn trap_message(&self) -> Option<String> {
        self.traps
            .first()
            .map(|t| t.get("message").cloned().unwrap_or_else(|| "trap".to_string()))
    }
}

/// Low-level RouterOS API connection (plain TCP or TLS)
pub(crate) struct RouterOsConnection {
    stream: Box<dyn Transport>,
    peer: String,
}

impl RouterOsConnection {
    /// Opens a socket to the router described by `config`
    ///
    /// Does not log in; call [`RouterOsConnection::login`] next.
    pub(crate) async fn connect(config: &RouterConfig) -> Result<Self> {
        let endpoint = config.endpoint();
        tracing::trace!("Attempting TCP connection to: {}", endpoint);
        let tcp = timeout(CONNECTION_TIMEOUT, TcpStream::connect(&endpoint))
            .await
            .map_err(|_| AppError::Network(format!("connect to {endpoint} timed out")))?
            .map_err(|e| AppError::Network(format!("connect to {endpoint} failed: {e}")))?;

        let stream: Box<dyn Transport> = if config.use_tls {
            let connector = TlsConnector::from(std::sync::Arc::new(tls::client_config(
                config.verify_tls,
            )));
            let name = tls::server_name(&config.host)?;
            let tls_stream = timeout(CONNECTION_TIMEOUT, connector.connect(name, tcp))
                .await
                .map_err(|_| AppError::Network(format!("TLS handshake with {endpoint} timed out")))?
                .map_err(|e| AppError::Network(format!("TLS handshake with {endpoint} failed: {e}")))?;
            tracing::trace!("TLS session established with: {}", endpoint);
            Box::new(tls_stream)
        } else {
            Box::new(tcp)
        };

        tracing::trace!("Connection established to: {}", endpoint);
        Ok(Self {
            stream,
            peer: endpoint,
        })
    }

    /// Runs one command and returns the aggregated `!re` rows
    ///
    /// Parameter keys starting with `?` or `.` are written verbatim as
    /// `key=value` (query filters and `.id`); everything else becomes
    /// `=key=value`. A `!trap` reply raises [`AppError::RouterApi`] with the
    /// router's message. A bare `!done` with no rows is a valid empty result.
    pub(crate) async fn execute(
        &mut self,
        command: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<Row>> {
        let reply = self.execute_raw(command, params).await?;
        if let Some(message) = reply.trap_message() {
            tracing::debug!("{}: {} trapped: {}", self.peer, command, message);
            return Err(AppError::RouterApi(message));
        }
        Ok(reply.rows)
    }

    /// Like [`RouterOsConnection::execute`] but keeps `!trap` rows in the reply
    pub(crate) async fn execute_raw(
        &mut self,
        command: &str,
        params: &[(&str, &str)],
    ) -> Result<CommandReply> {
        let mut words: Vec<String> = Vec::with_capacity(1 + params.len());
        words.push(command.to_string());
        for (key, value) in params {
            if key.starts_with('?') || key.starts_with('.') {
                words.push(format!("{key}={value}"));
            } else {
                words.push(format!("={key}={value}"));
            }
        }
        timeout(WRITE_TIMEOUT, self.write_sentence(&words))
            .await
            .map_err(|_| {
                AppError::Network(format!(
                    "write timeout: {} did not accept the command within {}s",
                    self.peer,
                    WRITE_TIMEOUT.as_secs()
                ))
            })??;

        timeout(READ_TIMEOUT, self.read_reply())
            .await
            .map_err(|_| {
                AppError::Network(format!(
                    "read timeout: {} did not respond within {}s",
                    self.peer,
                    READ_TIMEOUT.as_secs()
                ))
            })?
    }

    /// Best-effort shutdown, consuming the connection
    ///
    /// Dropping the connection closes the socket as well; this only makes
    /// the close explicit at the end of a logical operation.
    pub(crate) async fn close(mut self) {
        let _ = self.stream.shutdown().await;
        tracing::trace!("Connection to {} closed", self.peer);
    }

    async fn write_sentence(&mut self, words: &[String]) -> Result<()> {
        self.stream.write_all(&encode_sentence(words)).await?;
        Ok(())
    }

    /// Reads reply sentences until `!done`
    async fn read_reply(&mut self) -> Result<CommandReply> {
        let mut rows: Vec<Row> = Vec::new();
        let mut traps: Vec<Row> = Vec::new();
        let mut current: Option<Row> = None;

        loop {
            let sentence = self.read_sentence().await?;
            let Some(tag) = sentence.first() else {
                // lone terminator, keep waiting for a tagged sentence
                continue;
            };
            tracing::trace!("Received sentence: {:?}", sentence);

            let mut attrs = Row::new();
            for word in &sentence[1..] {
                if let Some(stripped) = word.strip_prefix('=') {
                    if let Some((k, v)) = stripped.split_once('=') {
                        attrs.insert(k.to_string(), v.to_string());
                    }
                }
                // ignore other headers (.tag and API attributes are unused here)
            }

            match tag.as_str() {
                "!re" => {
                    if let Some(row) = current.take() {
                        rows.push(row);
                    }
                    current = Some(attrs);
                }
                "!trap" => {
                    traps.push(attrs);
                }
                "!fatal" => {
                    let reason = sentence
                        .get(1)
                        .cloned()
                        .unwrap_or_else(|| "connection closed by router".to_string());
                    return Err(AppError::RouterApi(format!("fatal: {reason}")));
                }
                "!done" => {
                    // a done sentence may carry `=ret=` (new rule id, login challenge)
                    if let Some(ret) = attrs.get("ret") {
                        match &mut current {
                            Some(row) => {
                                row.insert("ret".to_string(), ret.clone());
                            }
                            None => {
                                let mut row = Row::new();
                                row.insert("ret".to_string(), ret.clone());
                                rows.push(row);
                            }
                        }
                    }
                    if let Some(row) = current.take() {
                        rows.push(row);
                    }
                    tracing::trace!("Command complete, {} row(s) received", rows.len());
                    break;
                }
                other => {
                    tracing::trace!("Ignoring reply tag: {}", other);
                }
            }
        }

        Ok(CommandReply { rows, traps })
    }

    async fn read_sentence(&mut self) -> Result<Vec<String>> {
        let mut words = Vec::new();
        loop {
            let word = self.read_word().await?;
            if word.is_empty() {
                return Ok(words);
            }
            words.push(word);
        }
    }

    async fn read_word(&mut self) -> Result<String> {
        let len = read_length(&mut self.stream).await?;
        if len == 0 {
            return Ok(String::new());
        }
        let mut buf = vec![0u8; len];
        self.stream.read_exact(&mut buf).await?;
        Ok(String::from_utf8_lossy(&buf).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// Peer that accepts the connection but never reads or replies
    struct StalledStream;

    impl AsyncRead for StalledStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Pending
        }
    }

    impl AsyncWrite for StalledStream {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Pending
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Peer that swallows writes but never replies
    struct SilentStream;

    impl AsyncRead for SilentStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Pending
        }
    }

    impl AsyncWrite for SilentStream {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn connection(stream: Box<dyn Transport>) -> RouterOsConnection {
        RouterOsConnection {
            stream,
            peer: "192.168.88.1:8728".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_to_stalled_peer_times_out() {
        let mut conn = connection(Box::new(StalledStream));

        let err = conn
            .execute("/ip/firewall/address-list/print", &[])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Network(_)), "{err}");
        assert!(err.to_string().contains("write timeout"), "{err}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_from_silent_peer_times_out() {
        let mut conn = connection(Box::new(SilentStream));

        let err = conn
            .execute("/ip/firewall/address-list/print", &[])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Network(_)), "{err}");
        assert!(err.to_string().contains("read timeout"), "{err}");
    }
}
