pub mod message;
pub mod peer_address;
