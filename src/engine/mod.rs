//! License-compliance engine.
//!
//! - [`license_map`]: package → license lookup filled by the runners.
//! - [`annotate`]: attaches a license and a [`LicenseStatus`](crate::models::LicenseStatus)
//!   to every node and collects licenses that are not whitelisted.
//! - [`filter`]: prunes an annotated tree down to the paths leading to problems.
//!
//! Everything here is synchronous and pure: inputs are borrowed, new trees are returned.

pub mod annotate;
pub mod filter;
pub mod license_map;

pub use annotate::{annotate, AnnotatedTree, UnknownLicense, UnknownLicenses};
pub use filter::filter;
pub use license_map::LicenseMap;
