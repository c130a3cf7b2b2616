pub mod board;
pub mod config;
pub mod logger;
pub mod terminal_sink;
