pub mod chat_stream;
pub mod config;
pub mod credentials;
pub mod export;
pub mod history;
pub mod message;
pub mod models;
pub mod services;
pub mod session;
