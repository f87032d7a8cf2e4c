use crate::Codec;
use calc_rpc_stream::client::ClientConn;
use calc_rpc_stream::transport::ClientTransport;
use serde::{Deserialize, Serialize};

pub type EchoConn<T> = ClientConn<T, Codec>;

/// Echoes the request, or fails with the user error "refused" when it is "fail".
pub const ECHO_SAY: &str = "Echo/Say";
/// Streams `word` back `times` times, and fails after 3 when `word` is "boom".
pub const ECHO_REPEAT: &str = "Echo/Repeat";
/// Counts the requests.
pub const ECHO_COUNT: &str = "Echo/Count";
/// Echoes every request as it arrives.
pub const ECHO_CHAT: &str = "Echo/Chat";
/// Takes a unary request and closes without a response.
pub const ECHO_SILENT: &str = "Echo/Silent";
/// Streams an ever-growing counter every `TICK` until the initiator goes away.
pub const ECHO_TICK: &str = "Echo/Tick";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RepeatReq {
    pub word: String,
    pub times: u32,
}

/// Echo calls use plain strings as application errors.
pub type EchoErr = String;

pub fn init_client<T: ClientTransport>(transport: T, config: crate::ClientConfig) -> EchoConn<T> {
    let conn = EchoConn::new(transport, config);
    conn.set_log_level(log::Level::Trace);
    conn
}
