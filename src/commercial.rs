//! Built-in list of pre-approved commercial licenses.
//!
//! Only compiled in with the `commercial` feature. Without it the list is
//! empty and the configured whitelist is used as is.

use crate::whitelist::Whitelist;

#[cfg(feature = "commercial")]
const COMMERCIAL_LICENSES: &[&str] = &[
    "Commercial",
    "Proprietary",
    "SEE LICENSE IN LICENSE",
    "SEE LICENSE IN LICENSE.md",
    "SEE LICENSE IN LICENSE.txt",
    "UNLICENSED",
];

#[cfg(not(feature = "commercial"))]
const COMMERCIAL_LICENSES: &[&str] = &[];

pub fn licenses() -> Whitelist {
    Whitelist::new(COMMERCIAL_LICENSES.iter().copied())
}
