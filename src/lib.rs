//! Geoloc - nearest-address reverse geocoding for browser GPS readings
//!
//! This library provides shared types and modules for the server and locate binaries.

pub mod config;
pub mod label;
pub mod location;
pub mod models;
pub mod region;
pub mod report;
pub mod resolver;
pub mod source;

pub use config::Config;
pub use models::{Coordinate, Diagnostic, ResolvedAddress};
pub use resolver::{Resolution, Resolver};
