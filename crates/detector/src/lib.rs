//! HTTP surface of the fake account detector

pub mod api;
pub mod config;
