use crate::{ClientConfig, Codec};
use calc_rpc::client::CalcClient;
use calc_rpc_stream::transport::ClientTransport;

pub type MyClient<T> = CalcClient<T, Codec>;

pub fn init_client<T: ClientTransport>(transport: T, config: ClientConfig) -> MyClient<T> {
    let client = MyClient::new(transport, config);
    client.conn().set_log_level(log::Level::Trace);
    client
}
