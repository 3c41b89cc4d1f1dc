use thiserror::Error;

/// Configuration and invariant-violation errors for the aligner.
///
/// Filter skips and the transparent 8-bit→16-bit overflow retry are *not*
/// represented here — per the orchestrator contract those surface as a plain
/// `None` from [`crate::Aligner::align`], not as an error.
#[derive(Debug, Error)]
pub enum AlignError {
    #[error("substitution matrix has {actual} entries, expected {expected} for alphabet size {alphabet_size}")]
    MatrixSizeMismatch {
        actual: usize,
        expected: usize,
        alphabet_size: usize,
    },

    #[error("query symbol {symbol} at position {pos} is out of range for alphabet size {alphabet_size}")]
    SymbolOutOfRange {
        symbol: u8,
        pos: usize,
        alphabet_size: usize,
    },

    #[error("empty query sequence")]
    EmptyQuery,

    #[error(
        "no profile built at the precision this search requires; rebuild with ScoreSize::Both or ScoreSize::Word"
    )]
    MissingPrecision,

    #[error("forward and reverse passes disagree on score ({forward} != {reverse}); this indicates a bug in the kernel, not bad input")]
    ScoreMismatch { forward: u32, reverse: u32 },

    #[error("banded traceback produced an out-of-range direction code: {code}")]
    TracebackCorrupt { code: u8 },
}

pub type AlignResult<T> = Result<T, AlignError>;
