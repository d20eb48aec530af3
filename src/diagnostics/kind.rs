//! Diagnostic kinds and the predefined memory-object diagnostics.

/// The severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Something is definitely wrong.
    Error,
    /// Something is probably wrong.
    Warning,
}

impl DiagnosticKind {
    /// Display prefix for this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            DiagnosticKind::Error => "error",
            DiagnosticKind::Warning => "warning",
        }
    }
}

/// A diagnostic message with code, message, and optional context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity level.
    pub kind: DiagnosticKind,
    /// Diagnostic code (e.g., "MO001").
    pub code: &'static str,
    /// Primary message.
    pub message: &'static str,
    /// Optional additional context.
    pub note: Option<&'static str>,
    /// Optional fix suggestion.
    pub help: Option<&'static str>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub const fn error(code: &'static str, message: &'static str) -> Self {
        Self {
            kind: DiagnosticKind::Error,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Create a new warning diagnostic.
    pub const fn warning(code: &'static str, message: &'static str) -> Self {
        Self {
            kind: DiagnosticKind::Warning,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Add a note.
    pub const fn with_note(mut self, note: &'static str) -> Self {
        self.note = Some(note);
        self
    }

    /// Add a help message.
    pub const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

// =============================================================================
// MO0xx - Allocation and lifecycle
// =============================================================================

/// MO001: Host-pointer allocation mode requested.
pub const MO001: Diagnostic = Diagnostic::error(
    "MO001",
    "host pointer allocation modes are not supported"
).with_note("USE_HOST_PTR and ALLOC_HOST_PTR would need zero-copy backing memory")
 .with_help("allocate device memory and pass COPY_HOST_PTR with the initial contents");

/// MO002: Buffer manager refused an allocation.
pub const MO002: Diagnostic = Diagnostic::warning(
    "MO002",
    "buffer manager failed to provide backing memory"
).with_note("the request passed size validation but the backing store is exhausted")
 .with_help("release unused memory objects or raise the buffer manager capacity");

/// MO003: Memory object dropped while still referenced.
pub const MO003: Diagnostic = Diagnostic::warning(
    "MO003",
    "memory object dropped with outstanding references"
).with_note("the last handle went away before the reference count reached zero")
 .with_help("pair every retain() and every constructor call with a release()");

/// MO004: Release on a destroyed memory object.
pub const MO004: Diagnostic = Diagnostic::error(
    "MO004",
    "release called on a destroyed memory object"
).with_note("the reference count already reached zero")
 .with_help("check for an unbalanced release() on this object");

// =============================================================================
// MO1xx - Mapping and pinning
// =============================================================================

/// MO101: CPU and GTT mappings mixed on one object.
pub const MO101: Diagnostic = Diagnostic::warning(
    "MO101",
    "CPU and GTT mappings cannot be nested on the same object"
).with_note("the two channels have independent coherency")
 .with_help("unmap the active mapping before switching channels");

/// MO102: Object used from inside its own `with_mapped` callback.
pub const MO102: Diagnostic = Diagnostic::error(
    "MO102",
    "memory object accessed while its mapped view is lent out"
).with_note("the object stays locked until the with_mapped callback returns")
 .with_help("work on the slice passed to the callback, or finish it before touching the object");

// =============================================================================
// MO9xx - Internal
// =============================================================================

/// MO901: Registry lost track of a live object.
pub const MO901: Diagnostic = Diagnostic::error(
    "MO901",
    "destroyed memory object was not linked in its context registry"
).with_note("this indicates a bug in gpumem");
