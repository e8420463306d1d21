//! # logvault
//!
//! Durable batched log persistence for services. Every ingested event is
//! emitted immediately through the tracing sink for local visibility, and
//! buffered for batched, retrying persistence into SQLite so that storage
//! latency or failures never block callers on the common path.
//!
//! The pipeline is built from a [`service::LogService`] over a
//! [`store::LogStore`] backend. Hosting applications construct the service
//! once, call `initialize` at startup and `shutdown` at teardown, and hand
//! the service out by clone wherever logging is needed.

pub mod cli;
pub mod database;
pub mod env;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;
