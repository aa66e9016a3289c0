//! Interning for tags and stable function identities.
//!
//! Tags are opaque data keys that head non-evaluable expressions. They are
//! interned to enable fast equality comparison and reduced memory usage for
//! repeated strings. Function identity is a stable id allocated by the
//! predicate registry on first registration; the foundation only defines the
//! id type so that expressions can mention functions without referencing
//! their callables.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Interned tag identifier.
///
/// Tags are opaque values like `base` or `async/status`. An expression whose
/// head is a tag is pure data: it can be written and invalidated but never
/// evaluated.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct TagId(pub(crate) u32);

impl TagId {
    /// Returns the raw index of this tag.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }

    // =========================================================================
    // Reserved Tags
    // =========================================================================
    // These are always interned at startup with fixed indices. The async
    // bridge keys its bookkeeping expressions and status values with them.

    /// Reserved tag heading async call status cells: `async/status`
    pub const STATUS: TagId = TagId(0);

    /// Reserved tag heading async call result cells: `async/result`
    pub const RESULT: TagId = TagId(1);

    /// Reserved tag keying memoised async runs: `async/promise`
    pub const PROMISE: TagId = TagId(2);

    /// Reserved status value for a call that has not run: `async/not-started`
    pub const NOT_STARTED: TagId = TagId(3);

    /// Reserved status value for an in-flight call: `async/executing`
    pub const EXECUTING: TagId = TagId(4);

    /// Reserved status value for a finished call: `async/complete`
    pub const COMPLETE: TagId = TagId(5);
}

impl fmt::Debug for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TagId({})", self.0)
    }
}

/// Stable function identity.
///
/// Allocated on first registration of a predicate or effect; two expressions
/// mention the same function iff they carry the same `FnId`.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct FnId(u32);

impl FnId {
    /// Creates a function id from its raw index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index of this function id.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for FnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FnId({})", self.0)
    }
}

/// Interner for tag strings.
///
/// Maps strings to unique `TagId`s and back. It is not thread-safe; use
/// external synchronization if needed.
#[derive(Clone, Debug, Default)]
pub struct Interner {
    /// Tag string storage, indexed by `TagId`.
    tags: Vec<Arc<str>>,
    /// Map from tag string to `TagId`.
    tag_map: HashMap<Arc<str>, TagId>,
}

impl Interner {
    /// Reserved tags that are pre-interned at startup.
    const RESERVED_TAGS: &'static [&'static str] = &[
        "async/status",      // TagId(0) = STATUS
        "async/result",      // TagId(1) = RESULT
        "async/promise",     // TagId(2) = PROMISE
        "async/not-started", // TagId(3) = NOT_STARTED
        "async/executing",   // TagId(4) = EXECUTING
        "async/complete",    // TagId(5) = COMPLETE
    ];

    /// Creates a new interner with reserved tags pre-interned.
    #[must_use]
    pub fn new() -> Self {
        let mut interner = Self::default();

        for (i, &tag) in Self::RESERVED_TAGS.iter().enumerate() {
            let id = interner.intern_tag(tag);
            debug_assert_eq!(
                id.0 as usize, i,
                "Reserved tag '{}' should have index {}, got {}",
                tag, i, id.0
            );
        }

        interner
    }

    /// Interns a tag string, returning its id.
    ///
    /// Interning the same string twice returns the same id.
    pub fn intern_tag(&mut self, name: &str) -> TagId {
        if let Some(&id) = self.tag_map.get(name) {
            return id;
        }
        let s: Arc<str> = name.into();
        let id = TagId(u32::try_from(self.tags.len()).expect("tag index overflow"));
        self.tags.push(Arc::clone(&s));
        self.tag_map.insert(s, id);
        id
    }

    /// Resolves a tag id back to its string.
    #[must_use]
    pub fn tag_name(&self, id: TagId) -> Option<&str> {
        self.tags.get(id.0 as usize).map(AsRef::as_ref)
    }

    /// Returns the number of interned tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Returns true if no tags have been interned.
    ///
    /// Never true for an interner built with [`Interner::new`], which
    /// pre-interns the reserved tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}
