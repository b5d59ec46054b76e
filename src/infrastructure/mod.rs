pub mod encryption;
pub mod kdf;
pub mod logging;
pub mod redact;
pub mod secret;
pub mod sharding;
