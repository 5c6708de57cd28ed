pub mod api;
pub mod board;
pub mod client;
pub mod transport;
pub mod websocket;

pub use api::ApiClient;
pub use board::{Board, VoteOutcome};
pub use client::ChatClient;
pub use transport::{Connector, Transport};
pub use websocket::WsConnector;
