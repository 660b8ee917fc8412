//! branchdb - per-application, per-branch MySQL databases on demand.
//!
//! A logical query (`sf:branch`, `sf:orders`) is resolved through a
//! [`ConnectionLookupRegistry`](lookup::ConnectionLookupRegistry) of
//! strategies. The built-in strategy derives the application identity from
//! its git checkout, starts a MySQL server container for that identity the
//! first time it is needed, creates the requested database on it and hands
//! back a connection string.

pub mod cli;
pub mod config;
pub mod container;
pub mod database;
pub mod driver;
pub mod error;
pub mod lookup;
pub mod naming;
pub mod testing;

pub use config::Config;
pub use driver::DelegatingDriver;
pub use error::ConfigError;
pub use lookup::{ConnectionLookup, ConnectionLookupRegistry, LookupError, LookupResult};
