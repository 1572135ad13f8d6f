//! tmail HTTP API server.
//!
//! This crate wires the identity layer to the outside world: GitHub OAuth
//! login, bearer-token authentication, mailbox and email routes, and the
//! Postgres record store behind them.

pub mod app;
pub mod auth;
pub mod cleanup;
pub mod config;
pub mod db;
pub mod error;
pub mod mailbox;
