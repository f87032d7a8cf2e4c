use std::time::Duration;

/// General config for the call initiator.
///
/// A zero duration disables the corresponding timeout.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Timeout for establishing the transport link of a call
    pub connect_timeout: Duration,
    /// Socket write timeout
    pub write_timeout: Duration,
    /// Number of frames buffered per direction of a call before the sender waits
    pub call_buf_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
            call_buf_size: 32,
        }
    }
}

/// General config for the call handler side.
///
/// A zero duration disables the corresponding timeout.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// How long to wait for the opening frame of an accepted call
    pub read_timeout: Duration,
    /// Socket write timeout
    pub write_timeout: Duration,
    /// Number of frames buffered per direction of a call before the sender waits
    pub call_buf_size: usize,
    /// wait for all in-flight calls to finish with a timeout on close
    pub server_close_wait: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
            call_buf_size: 32,
            server_close_wait: Duration::from_secs(90),
        }
    }
}
