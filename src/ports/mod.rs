//! Port traits: the seams between the domain and its collaborators.

pub mod candle_port;
pub mod config_port;
pub mod indicator_port;
