//! Library crate for lan-map-rs: nmap report normalization, host filtering,
//! topology layout and the scan session controller behind the dashboard.
pub mod error;
pub mod filter;
pub mod netdetect;
pub mod ping;
pub mod ports;
pub mod report;
pub mod scanner;
pub mod server;
pub mod session;
pub mod topology;
pub mod types;
