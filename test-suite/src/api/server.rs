use crate::{Endpoint, ServerConfig};
use calc_rpc::server::{CalcConfig, CalcServer, RpcServer};

pub async fn init_server(
    config: ServerConfig, calc: CalcConfig, is_tcp: bool,
) -> (RpcServer, Endpoint) {
    let server = RpcServer::new(config);
    server.set_log_level(log::Level::Trace);
    let endpoint = crate::listen(&server, CalcServer::new(calc), is_tcp).await;
    (server, endpoint)
}

/// A server emitting one prime per `interval`.
pub async fn init_paced_server(
    interval: std::time::Duration, is_tcp: bool,
) -> (RpcServer, Endpoint) {
    init_server(ServerConfig::default(), CalcConfig { prime_interval: interval }, is_tcp).await
}
