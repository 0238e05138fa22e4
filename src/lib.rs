//! Turnstile - per-route, per-client fixed-window rate limiting
//!
//! This crate implements the admission-control gate placed in front of
//! mutating API routes: an in-memory fixed-window counter keyed by route and
//! client, an axum middleware that answers 429 when the limit is reached, and
//! a small HTTP service exposing the same check to other processes.

pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
pub mod reload;
pub mod telemetry;
