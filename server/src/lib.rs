#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod cache;
pub mod gray;
pub mod http;
pub mod service;
pub mod settings;
pub mod storage;
