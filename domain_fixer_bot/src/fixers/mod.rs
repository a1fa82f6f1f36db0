//! Rewriting of URLs to their embed-friendly mirrors.

/// Table of domain fixers and where it comes from.
pub mod registry;

/// Taking URLs apart and putting them back together.
pub mod url_parts;

/// Fixing all URLs in a message.
pub mod rewriter;

pub use registry::{validate_fixer, DomainFixer, DomainRegistry, FixerTable, DEFAULT_FIXERS};
pub use rewriter::{rewrite, Rewrite, RewritePolicy, WwwPolicy};
pub use url_parts::{split, ParsedUrl};
