//! Runtime diagnostics.
//!
//! Memory-object failures that the caller gets back as a `MemError` are
//! usually enough. Diagnostics cover what an error value cannot carry:
//! leaked objects, refused allocations, misuse after destruction.
//!
//! ## Diagnostic Codes
//!
//! | Code  | Meaning                          |
//! |-------|----------------------------------|
//! | MO0xx | Allocation and lifecycle issues  |
//! | MO1xx | Mapping and pinning issues       |
//! | MO9xx | Internal errors                  |
//!
//! Output goes to stderr in debug builds (or with the `diagnostics`
//! feature), to the `log` facade with the `log` feature, or to a custom
//! [`DiagnosticSink`] installed with [`set_sink`].

#[macro_use]
mod macros;

pub mod emit;
pub mod kind;

pub use emit::{emit, is_suppressed, set_sink, suppress_diagnostics, CollectingSink, DiagnosticSink};
pub use kind::{Diagnostic, DiagnosticKind};
pub use kind::{MO001, MO002, MO003, MO004, MO101, MO102, MO901};
