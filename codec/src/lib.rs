#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(docsrs, allow(unused_attributes))]

//! # calc-rpc-codec
//!
//! This crate provides the codec trait and codec implementations used by
//! [`calc-rpc-stream`](../calc_rpc_stream/index.html) to turn typed messages into frame payloads.
//!

/*
 *  Note that there's no unify output interface in each serde impl,
 *  whatever we want to serialize into (std::io::Write / Vec<u8>),
 *  require the codec implement to match.
 */

use serde::{Deserialize, Serialize};

/// Turns message payloads into bytes and back. One instance is shared by every call of a
/// connection or server, so it takes `&self`.
pub trait Codec: Default + Send + Sync + Sized + 'static {
    fn encode<T: Serialize>(&self, msg: &T) -> Result<Vec<u8>, ()>;

    fn decode<'a, T: Deserialize<'a>>(&self, buf: &'a [u8]) -> Result<T, ()>;
}

#[cfg(feature = "msgpack")]
mod msgpack;
#[cfg(feature = "msgpack")]
pub use msgpack::*;
