pub mod derivation;
pub mod mnemonic;
pub mod network;
pub mod wallet;
