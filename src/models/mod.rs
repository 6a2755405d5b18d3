//! Core data models for the resolver.

pub mod address;
pub mod coordinate;

pub use address::{AddressFeature, Diagnostic, ResolvedAddress};
pub use coordinate::{Coordinate, CoordinateError};
