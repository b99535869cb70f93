//! Chain RPC access: the raw client and the degrading reader built on it.

mod chain_client;
pub use chain_client::{ChainClient, ChainClientConfig, RpcChainClient};

mod error;
pub use error::{RpcError, RpcResult};

mod reader;
pub use reader::{ChainReader, is_valid_address};
