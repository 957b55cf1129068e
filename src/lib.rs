//! `noc-monitor`: live and historical telemetry for a facility operations
//! center.
//!
//! The binary in `main.rs` wires these modules together (EMBP): `store`
//! reads the sensor databases, `broadcast` pushes the newest readings to
//! every WebSocket session, `history` and `export` serve time windows, and
//! `routes` mounts the HTTP surface. `alerts` and `client` are the
//! consumer-side pieces a dashboard builds on.

pub mod alerts;
pub mod auth;
pub mod broadcast;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod history;
pub mod models;
pub mod routes;
pub mod schema;
pub mod store;
pub mod thresholds;

pub use config::Config;
