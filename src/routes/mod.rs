//! Route discovery, loading, validation and registration.
//!
//! The pipeline is split so that registration never touches the filesystem:
//!
//! ```text
//! routes_directory ──discover──▶ paths ──load_manifest──▶ RawRoute
//!     ──validate_route──▶ RouteDescriptor ──RouteRegistrar──▶ Transport
//! ```
//!
//! Any stage can be fed directly. Tests and applications that build their
//! descriptors in code skip straight to [`RouteRegistrar`].

mod discover;
mod manifest;
mod registrar;
mod validate;

pub use discover::discover;
pub use manifest::{RawRoute, load_manifest, parse_manifest};
pub use registrar::{Registration, RouteRegistrar};
pub use validate::{RouteDescriptor, SUPPORTED_METHODS, validate_route};
