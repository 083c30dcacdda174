//! Newswire - a tech news aggregation service
//!
//! This crate fetches RSS/Atom feeds from a configured list of sources,
//! filters and categorizes articles by keyword matching, and serves the
//! merged list over HTTP from a time-bounded in-memory cache.

pub mod cache;
pub mod config;
pub mod fetcher;
pub mod news;
pub mod processor;
pub mod routes;
