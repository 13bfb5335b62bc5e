pub mod networks;
pub mod rpc_client;

pub use networks::{NetworkRegistry, DEFAULT_NETWORK};
pub use rpc_client::RpcClient;
