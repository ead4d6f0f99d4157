// FileCloner Network Module
//
// This module provides the peer-facing plumbing for the file sync protocol:
// - Tracking which peer connections are currently open
// - The textual wire format shared by all protocol messages
// - A line-delimited TCP transport the sync layer talks through

pub mod peer;
pub mod transport;
pub mod types;
