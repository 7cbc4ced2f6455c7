//! HTTP API client for the Murmur backend

mod client;

pub use client::ApiClient;
