//! tunnelup: expose a local service through a public tunnel.
//!
//! A run checks that the service answers on its local port, starts it if it
//! does not, then tries the configured tunnel providers in order until one
//! prints a public URL.

pub mod config;
pub mod error;
pub mod health;
pub mod launcher;
pub mod orchestrator;
pub mod output;
pub mod report;
pub mod scrape;
pub mod tunnel;

pub use config::{Config, ServiceEndpoint};
pub use error::{Result, TunnelupError};
pub use orchestrator::{Orchestrator, Outcome};
