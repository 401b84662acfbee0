use crate::range::Range;

/// Step direction for numeric slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Increase,
    Decrease,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Increase => 1.0,
            Direction::Decrease => -1.0,
        }
    }
}

/// Why an operation left the document alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoOpReason {
    /// The range has no common ancestor in the document.
    NoCommonAncestor,
    /// Collapsed range where the operation needs content.
    Collapsed,
    /// The stepped value would leave the slot bounds.
    Rejected,
    /// The host cannot measure layout.
    Unmeasurable,
    /// There is no active editable region.
    Inactive,
    /// The tree already had the requested shape.
    AlreadyApplied,
}

/// Outcome of a mutating operation that passed validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutation {
    /// The document changed; the range covers the affected content.
    Changed(Range),
    Unchanged(NoOpReason),
}

impl Mutation {
    pub fn is_changed(&self) -> bool {
        matches!(self, Mutation::Changed(_))
    }

    pub fn range(&self) -> Option<Range> {
        match self {
            Mutation::Changed(range) => Some(*range),
            Mutation::Unchanged(_) => None,
        }
    }
}
