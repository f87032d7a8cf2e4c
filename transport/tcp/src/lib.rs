#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(docsrs, allow(unused_attributes))]

//! # calc-rpc-tcp
//!
//! This crate provides a TCP transport implementation for
//! [`calc-rpc-stream`](../calc_rpc_stream/index.html).
//!
//! Every call uses its own connection. Frames are written in the length-prefixed form described
//! in [calc_rpc_stream::proto]; half-closing a direction shuts down the socket's write side.

mod client;
pub use client::*;
mod server;
pub use server::*;
mod frame;
pub use frame::{TcpFrameSink, TcpFrameSource};

#[macro_export(local_inner_macros)]
macro_rules! io_with_timeout {
    ($timeout: expr, $f: expr) => {{
        if $timeout.is_zero() {
            $f.await
        } else {
            match tokio::time::timeout($timeout, $f).await {
                Ok(Ok(r)) => Ok(r),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(std::io::ErrorKind::TimedOut.into()),
            }
        }
    }};
}
