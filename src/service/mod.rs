pub mod rpc_client;
pub mod signer;
pub mod swap;
pub mod wallet_service;
