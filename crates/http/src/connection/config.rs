use std::time::Duration;

use crate::codec::DEFAULT_BUFFER_SIZE;

/// Tuning knobs of a single connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    keep_alive_retries: u32,
    keep_alive_backoff: Duration,
    tls_handshake_timeout: Duration,
    allow_trailers: bool,
    read_buffer_size: usize,
    write_buffer_size: usize,
    idle_timeout: Option<Duration>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            keep_alive_retries: 10,
            keep_alive_backoff: Duration::from_millis(100),
            tls_handshake_timeout: Duration::from_secs(10),
            allow_trailers: true,
            read_buffer_size: DEFAULT_BUFFER_SIZE,
            write_buffer_size: 8 * 1024,
            idle_timeout: None,
        }
    }
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times a kept-alive connection may come up empty before it is closed.
    pub fn keep_alive_retries(mut self, retries: u32) -> Self {
        self.keep_alive_retries = retries;
        self
    }

    pub fn keep_alive_backoff(mut self, backoff: Duration) -> Self {
        self.keep_alive_backoff = backoff;
        self
    }

    pub fn tls_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.tls_handshake_timeout = timeout;
        self
    }

    pub fn allow_trailers(mut self, allow: bool) -> Self {
        self.allow_trailers = allow;
        self
    }

    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    pub fn write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    /// Closes a kept-alive connection when the next request does not start in time.
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn get_keep_alive_retries(&self) -> u32 {
        self.keep_alive_retries
    }

    pub fn get_keep_alive_backoff(&self) -> Duration {
        self.keep_alive_backoff
    }

    pub fn get_tls_handshake_timeout(&self) -> Duration {
        self.tls_handshake_timeout
    }

    pub fn get_allow_trailers(&self) -> bool {
        self.allow_trailers
    }

    pub fn get_read_buffer_size(&self) -> usize {
        self.read_buffer_size
    }

    pub fn get_write_buffer_size(&self) -> usize {
        self.write_buffer_size
    }

    pub fn get_idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }
}
