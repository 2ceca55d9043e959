//! WebSocket live-update channel.

pub mod handler;

pub use handler::LiveChannelHandler;
