/*!
 * Protocol Types
 * Requests, options, outcomes, and errors for allocation operations
 */

use std::panic::Location;
use thiserror::Error;

/// Allocation operation result
pub type AllocResult<T> = Result<T, AllocError>;

/// Allocation errors
///
/// Only resource-level failures are errors. Capability gaps (resize must
/// move, free-all unsupported) are routine [`ResizeOutcome`] /
/// [`FreeAllOutcome`] variants, and programmer errors (bad alignment,
/// double-free, corrupted header) are debug-build assertions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    #[error("out of memory: raw source refused {requested} bytes")]
    OutOfMemory { requested: usize },

    #[error("allocation request too large: {requested} bytes, limit {limit} bytes")]
    RequestTooLarge { requested: usize, limit: usize },
}

/// Outcome of an in-place resize request.
///
/// `Resized` means the block was grown or shrunk without moving: the
/// original address remains valid, and no other address may be produced.
/// `MustMove` means the caller has to allocate a new block and copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeOutcome {
    Resized,
    MustMove,
}

/// Outcome of a free-all request.
///
/// Allocators that cannot release everything at once report `Unsupported`,
/// which is distinct from success and not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeAllOutcome {
    Done,
    Unsupported,
}

/// Per-request allocation options.
///
/// Ambient context flags are merged in by the front end, so allocator
/// implementations never see these.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocOptions {
    /// Zero the user region instead of the uninitialized fill pattern.
    pub zero_init: bool,
    /// Exempt this allocation from the leak report. For memory that is
    /// intentionally alive until process exit.
    pub mark_leaked: bool,
    /// Skip allocation-event logging for this request even when the
    /// ambient log-all flag is set. For embedders whose logging sink
    /// itself allocates through this layer.
    pub suppress_log: bool,
}

impl AllocOptions {
    pub fn zeroed() -> Self {
        Self {
            zero_init: true,
            ..Self::default()
        }
    }

    pub fn with_zero_init(mut self, zero_init: bool) -> Self {
        self.zero_init = zero_init;
        self
    }

    pub fn with_mark_leaked(mut self, mark_leaked: bool) -> Self {
        self.mark_leaked = mark_leaked;
        self
    }

    pub fn with_suppress_log(mut self, suppress_log: bool) -> Self {
        self.suppress_log = suppress_log;
        self
    }
}

/// Memory allocation request
///
/// Builder-style, ephemeral. The source location of the constructing call
/// is captured automatically and stamped into the allocation header on
/// debug builds.
#[derive(Debug, Clone, Copy)]
pub struct AllocationRequest {
    pub size: usize,
    /// Requested alignment; 0 means "use the default". Must otherwise be
    /// a power of two at least pointer-sized.
    pub alignment: usize,
    pub options: AllocOptions,
    pub location: &'static Location<'static>,
}

impl AllocationRequest {
    #[track_caller]
    pub fn new(size: usize) -> Self {
        Self {
            size,
            alignment: 0,
            options: AllocOptions::default(),
            location: Location::caller(),
        }
    }

    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_options(mut self, options: AllocOptions) -> Self {
        self.options = options;
        self
    }
}
