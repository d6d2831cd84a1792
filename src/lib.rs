//! Workspace anchor crate.
//!
//! Exists so repo-wide dev tooling (the cargo-husky git hooks) has a package
//! to attach to; all functionality lives under `crates/`.
