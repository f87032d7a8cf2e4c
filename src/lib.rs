//! # calc-rpc
//!
//! A calculator service showing the four call shapes of
//! [`calc-rpc-stream`](../calc_rpc_stream/index.html):
//!
//! | Method | Shape |
//! |---|---|
//! | `Sum` | unary |
//! | `PrimeNumbers` | server-streaming |
//! | `ComputeAverage` | client-streaming |
//! | `FindMaxNumber` | bidirectional-streaming |
//!
//! Serve it with [server::CalcServer] on an [RpcServer](calc_rpc_stream::server::RpcServer), and
//! call it with [client::CalcClient] over any
//! [ClientTransport](calc_rpc_stream::transport::ClientTransport).

#[macro_use]
extern crate captains_log;

pub mod calc;
pub mod client;
pub mod error;
pub mod proto;
pub mod server;

pub use calc_rpc_codec::MsgpCodec;
pub use calc_rpc_stream::error::{RpcError, RpcIntErr};
