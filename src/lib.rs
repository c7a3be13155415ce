pub mod agent;
pub mod chat;
pub mod config;
pub mod error;
pub mod platform;
pub mod queue;
pub mod server;
pub mod shutdown;
pub mod webhook;
pub mod workflow;

#[cfg(test)]
mod test_support;
