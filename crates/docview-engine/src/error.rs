use thiserror::Error;

/// Failures that abort a build or reconciliation pass.
///
/// Merge and become refusals are not errors; they are the normal signal to
/// fall back to splicing and surface as `false` returns.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("Ran out of text content at position {pos} while building the view")]
    TextExhausted { pos: usize },

    #[error("Block decoration over {from}..{to} came from a source that may not produce block effects")]
    BlockFromRestrictedSource { from: usize, to: usize },

    #[error("Decoration over {from}..{to} replaces a line break but its source may not do that")]
    RestrictedReplacesLineBreak { from: usize, to: usize },

    #[error("Decoration event out of order: expected position {expected}, found {found}")]
    EventOutOfOrder { expected: usize, found: usize },

    #[error("Decoration event {from}..{to} lies outside the built range {range_from}..{range_to}")]
    EventOutsideRange {
        from: usize,
        to: usize,
        range_from: usize,
        range_to: usize,
    },

    #[error("Decoration events stopped at {reached} before the end of the range at {end}")]
    IncompleteCoverage { reached: usize, end: usize },
}
