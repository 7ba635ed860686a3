//! HTTP Handlers

mod ping;
mod worker_socket;

pub use ping::ping;
pub use worker_socket::worker_socket_handler;
