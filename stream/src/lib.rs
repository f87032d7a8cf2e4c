#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(docsrs, allow(unused_attributes))]

//! # calc-rpc-stream
//!
//! This crate provides the streaming call layer of `calc-rpc`: how an initiator and a handler
//! coordinate message flow, termination and error propagation for the four call shapes.
//!
//! ## Components
//!
//! - [`calc-rpc-core`](../calc_rpc_core/index.html): error types and config.
//! - [`calc-rpc-codec`](../calc_rpc_codec/index.html): payload codecs, such as `msgpack`.
//! - Transports carry frames without looking inside them:
//!   - [mem]: in-process channels, one pair per call.
//!   - [`calc-rpc-tcp`](../calc_rpc_tcp/index.html): one TCP socket per call.
//!
//! ## The Design
//!
//! Every call gets its own transport link, there's no multiplexing. A call has two directions
//! that are closed independently; each direction ends exactly once, either with the terminal
//! signal (`End`) or with an error (`Fail`).
//!
//! On each side of a call, two coroutines pump frames between the transport and a pair of
//! bounded channels. The application only sees the typed [SendHalf](pipe::SendHalf) and
//! [RecvHalf](pipe::RecvHalf), which can be driven from separate tasks.
//!
//! The lifecycle of each side is tracked by [CallState](state::CallState):
//! `Open -> {SendHalfClosed, RecvHalfClosed} -> BothClosed`, with `Failed` reachable from any
//! non-terminal state. Sending after the local half-close fails the call, and so does any frame
//! after the peer's end.
//!
//! A side keeps its link open after sending `End` until the peer's `End` arrived, so losing
//! the link while the local side still sends means the peer went away, and fails the call with
//! `Cancelled`. Closing the owning connection fails every call on it with `Cancelled` too.
//!
//! On the initiator side, [ClientConn](client::ClientConn) opens calls. On the handler side,
//! [RpcServer](server::RpcServer) accepts them and passes each one to a user-defined
//! [Dispatch](server::Dispatch), which picks the driver for the call's shape on
//! [IncomingCall](server::IncomingCall).
//!
//! ## Protocol
//!
//! The frame layout is described in [proto].

#[macro_use]
extern crate captains_log;

pub mod call;
pub mod client;
pub mod mem;
pub mod pipe;
pub mod proto;
pub mod server;
pub mod state;
pub mod transport;

pub use calc_rpc_codec::Codec;
pub use calc_rpc_core::error;
pub use calc_rpc_core::{ClientConfig, ServerConfig};
