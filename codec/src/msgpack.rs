use crate::Codec;
use serde::{Deserialize, Serialize};

/// Codec for [MessagePack](https://msgpack.org), with struct fields encoded by name
#[derive(Default, Debug, Clone, Copy)]
pub struct MsgpCodec();

impl Codec for MsgpCodec {
    #[inline]
    fn encode<T: Serialize>(&self, msg: &T) -> Result<Vec<u8>, ()> {
        rmp_serde::to_vec_named(msg).map_err(|_| ())
    }

    #[inline]
    fn decode<'a, T: Deserialize<'a>>(&self, buf: &'a [u8]) -> Result<T, ()> {
        rmp_serde::from_slice(buf).map_err(|_| ())
    }
}
