//! Web surface: render-function factory and the HTTP server

pub mod access;
pub mod handler;
pub mod http;
