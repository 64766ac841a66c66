//! Tree options.

/// Options that control how a [`FoldingTree`](crate::FoldingTree) maintains itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoldingTreeOptions {
    /// If `true`, every edit re-checks all structural invariants and panics on a violation.
    ///
    /// Defaults to `true` in debug builds and `false` in release builds.
    pub verify_after_edit: bool,
    /// Number of markers to reserve room for up front.
    pub capacity: usize,
}

impl Default for FoldingTreeOptions {
    fn default() -> Self {
        Self {
            verify_after_edit: cfg!(debug_assertions),
            capacity: 0,
        }
    }
}

impl FoldingTreeOptions {
    /// Options with invariant checking turned off regardless of the build profile.
    pub fn unchecked() -> Self {
        Self {
            verify_after_edit: false,
            ..Self::default()
        }
    }

    /// Reserve room for `capacity` markers.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}
