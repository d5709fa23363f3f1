//! # DashChat Hub
//!
//! Concrete pieces behind the DashChat backend: the Gemini provider, the
//! built-in tools, conversation log backends, geodata proxies and the REST
//! API server.

pub mod api;
pub mod geodata;
pub mod memory;
pub mod middleware;
pub mod providers;
pub mod tools;
