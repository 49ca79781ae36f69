use std::sync::Arc;
use std::time::Duration;

use tokio::select;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::codec::{BufferedReader, RequestProvider, ResponseHead};
use crate::connection::{Client, ConnectionConfig, MessageWriter};
use crate::handler::Pipeline;
use crate::protocol::{Context, HttpError};

/// Lifecycle of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Transport negotiation, e.g. the TLS handshake
    Initializing,
    /// Waiting for a request on a fresh connection
    Serving,
    /// Waiting for the next request on a persistent connection
    KeepAlive { retries: u32 },
    Closing,
    Terminated,
}

/// What reading and answering one request amounted to.
enum Exchange {
    Responded { keep_alive: bool },
    NoRequest,
    Idle,
    Shutdown,
}

/// Serves requests from one client until the connection ends.
///
/// Requests are handled strictly one after another. The read buffer lives as
/// long as the connection, so bytes a client pipelined behind a request are
/// kept for the next one.
///
/// With a shutdown token the connection stops waiting for further requests
/// once the token is cancelled. A request that is already being handled is
/// still answered.
pub struct HttpConnection<C: Client> {
    reader: BufferedReader<C>,
    writer: MessageWriter,
    provider: Arc<dyn RequestProvider>,
    pipeline: Arc<Pipeline>,
    config: ConnectionConfig,
    shutdown: Option<CancellationToken>,
}

impl<C: Client> std::fmt::Debug for HttpConnection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConnection")
            .field("remote", &self.reader.get_ref().remote_addr())
            .field("pipeline", &self.pipeline)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C: Client> HttpConnection<C> {
    pub fn new(client: C, provider: Arc<dyn RequestProvider>, pipeline: Arc<Pipeline>, config: ConnectionConfig) -> Self {
        Self {
            reader: BufferedReader::with_capacity(client, config.get_read_buffer_size()),
            writer: MessageWriter::with_capacity(config.get_write_buffer_size()),
            provider,
            pipeline,
            config,
            shutdown: None,
        }
    }

    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// Runs the connection to completion.
    ///
    /// Errors are logged and end the connection; they never reach the caller.
    pub async fn process(mut self) {
        let remote = self.reader.get_ref().remote_addr();
        let mut state = State::Initializing;

        loop {
            trace!(?remote, ?state, "connection state");
            state = match state {
                State::Initializing => match self.handshake().await {
                    Ok(()) => State::Serving,
                    Err(e) => {
                        warn!(?remote, cause = %e, "handshake failed");
                        State::Closing
                    }
                },

                State::Serving | State::KeepAlive { .. } if !self.reader.get_ref().is_connected() => State::Closing,

                State::Serving => match self.exchange(None).await {
                    Ok(Exchange::Responded { keep_alive: true }) => State::KeepAlive { retries: 0 },
                    Ok(_) => State::Closing,
                    Err(e) => {
                        warn!(?remote, cause = %e, "failed to serve request");
                        State::Closing
                    }
                },

                State::KeepAlive { retries } => match self.exchange(self.config.get_idle_timeout()).await {
                    Ok(Exchange::Responded { keep_alive: true }) => State::KeepAlive { retries: 0 },
                    Ok(Exchange::Responded { keep_alive: false }) => State::Closing,
                    Ok(Exchange::NoRequest) if retries < self.config.get_keep_alive_retries() => {
                        sleep(self.config.get_keep_alive_backoff()).await;
                        State::KeepAlive { retries: retries + 1 }
                    }
                    Ok(Exchange::NoRequest) => {
                        debug!(?remote, retries, "no further request, give up keep-alive");
                        State::Closing
                    }
                    Ok(Exchange::Idle) => {
                        debug!(?remote, "keep-alive connection idle for too long");
                        State::Closing
                    }
                    Ok(Exchange::Shutdown) => State::Closing,
                    Err(e) => {
                        warn!(?remote, cause = %e, "failed to serve request");
                        State::Closing
                    }
                },

                State::Closing => {
                    if let Err(e) = self.reader.get_mut().close().await {
                        debug!(?remote, cause = %e, "failed to close client");
                    }
                    State::Terminated
                }

                State::Terminated => break,
            };
        }

        debug!(?remote, "connection terminated");
    }

    async fn handshake(&mut self) -> Result<(), HttpError> {
        let limit = self.config.get_tls_handshake_timeout();
        match timeout(limit, self.reader.get_mut().handshake()).await {
            Ok(result) => result.map_err(HttpError::handshake),
            Err(_) => Err(HttpError::HandshakeTimeout(limit)),
        }
    }

    /// Reads one request, runs the pipeline and writes the response.
    async fn exchange(&mut self, idle_timeout: Option<Duration>) -> Result<Exchange, HttpError> {
        let provide = self.provider.provide(&mut self.reader);
        let waiting = async {
            match idle_timeout {
                Some(limit) => timeout(limit, provide).await.ok(),
                None => Some(provide.await),
            }
        };

        let provided = select! {
            waited = waiting => match waited {
                Some(provided) => provided?,
                None => return Ok(Exchange::Idle),
            },
            () = cancelled(self.shutdown.as_ref()) => return Ok(Exchange::Shutdown),
        };

        let Some(request) = provided else {
            return Ok(Exchange::NoRequest);
        };

        let remote = self.reader.get_ref().remote_addr();
        let mut ctx = Context::new(request, remote);
        self.pipeline.execute(&mut ctx).await;

        let Some(response) = ctx.take_response() else {
            debug!(?remote, path = ctx.request().path(), "no response was produced");
            return Ok(Exchange::Responded { keep_alive: ctx.request().keep_alive() });
        };

        let keep_alive = ctx.request().keep_alive() && !response.should_close();
        self.writer.clear_buf();
        self.writer.write(ResponseHead {
            protocol: ctx.request().protocol(),
            response: &response,
            keep_alive,
            cookies: Some(ctx.cookies()),
        })?;
        self.writer.flush(self.reader.get_mut()).await?;

        trace!(?remote, status = response.status().as_u16(), keep_alive, "sent response");
        Ok(Exchange::Responded { keep_alive })
    }
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}
