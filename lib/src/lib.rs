#![doc = svgbobdoc::transform!(
//! A toolkit for creating usage-driven asset subsetters.
//!
//! # Overview
//!
//! Waxwing is a library for creating build-time asset subsetters: programs
//! that scan the rendered output of a site build for the features it actually
//! uses and shrink a shared companion asset down to exactly the rules those
//! features need. The scan is paid once at build time; every page load after
//! that ships the smaller payload.
//!
//! Internally, waxwing runs a three stage pipeline:
//!
//! ```svgbob
//!  +----------+  usage   +------------+  rules   +------------+
//!  | Corpus   | tokens   | Stylesheet |  kept    | Subset     |
//!  | scan     +--------->| split +    +--------->| assemble + |
//!  | (jwalk)  |          | classify   |          | write      |
//!  +----------+          +------------+          +------------+
//! ```
//!
//! In words, a **subsetting run** consists of:
//!
//!   * A **corpus**: every rendered document found under a root directory,
//!     scanned in parallel for usage tokens. A token is a style family marker
//!     followed by a hyphenated feature class; the deduplicated result is a
//!     [`usage::UsageSet`].
//!
//!   * A **stylesheet**: the vendor asset split into maximal top level rules
//!     by a character level splitter that understands comments, strings, and
//!     nested blocks. Malformed input is an error, never a silent truncation.
//!
//!   * A **subset**: each rule classified as core (always kept), icon (kept
//!     when its name is used), or unrelated (dropped); kept rules are joined
//!     in source order and written atomically alongside byte metrics.
)]

#[macro_use]
pub mod error;
pub mod corpus;
pub mod usage;
pub mod stylesheet;
pub mod subset;

pub use corpus::Corpus;
pub use usage::{Family, ScanOptions, UsageSet, UsageToken};
pub use stylesheet::{StyleRule, Stylesheet};
pub use subset::{Classification, CoreAllowlist, Savings};
