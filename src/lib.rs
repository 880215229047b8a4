//! PortLink backend library.
//!
//! A developer-portfolio and community service: users publish portfolio
//! posts, follow and endorse each other, request collaborations, and get
//! LLM-generated feedback. The feed service ranks published posts with an
//! engagement-weighted, recency-decayed score behind a short-TTL cache.

pub mod ai;
pub mod auth;
pub mod cache;
pub mod config;
pub mod constants;
pub mod db;
pub mod feed;
pub mod matching;
pub mod notify;
pub mod realtime;
pub mod storage;
pub mod web;
