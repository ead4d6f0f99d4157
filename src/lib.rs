// FileCloner - peer-to-peer file availability discovery and freshest-wins
// manifest reconciliation

pub mod config;
pub mod manifest;
pub mod network;
pub mod sync;

// Initialize logging
pub fn init_logger() {
    env_logger::init();
}
