//! Signed video delivery and access control for course lectures.
//!
//! The [`delivery`] module decides whether a viewer may play a lecture and
//! hands out short-lived signed URLs, backed by swappable [`cache`],
//! [`storage`] and [`store`] capabilities. [`server`] exposes it over HTTP.

pub mod cache;
pub mod config;
pub mod delivery;
pub mod error;
pub mod metrics;
pub mod model;
pub mod server;
pub mod storage;
pub mod store;
