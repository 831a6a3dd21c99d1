//! PopShop is an HTTP mocking and forward-proxying server driven by
//! declarative YAML rule files.
//!
//! Incoming requests walk an ingress guard chain, match against the active
//! rule set, and either get a canned response or are forwarded to an
//! upstream URL. The rule set hot-swaps atomically when the config path
//! changes.

pub mod config;
pub mod error;
pub mod matcher;
pub mod middleware;
pub mod pipeline;
pub mod proxy;
pub mod responder;
pub mod server;
pub mod store;
