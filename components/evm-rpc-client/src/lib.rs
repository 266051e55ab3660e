#[macro_use]
extern crate serde_derive;

mod rpc_client;
mod types;

pub use rpc_client::{EvmRpc, RpcError};
pub use types::{
    format_quantity, format_wei, parse_quantity, Address, TransactionReceipt, TransactionRequest,
};
