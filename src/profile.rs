//! Striped, biased query profile (§4.1).
//!
//! For precision `P` with `W = 128/P` lanes, query position `p` lives at
//! segment `p % seg_len`, lane `p / seg_len` where `seg_len = ceil(L/W)`.
//! Positions past the query's end are padded with the bias (8-bit) or zero
//! (16-bit) so the kernel can run the full `seg_len` stripe unconditionally.

use crate::lane::{LaneI16, LaneOps, LaneU8};
use crate::matrix::SubstitutionMatrix;

fn seg_len(query_len: usize, lanes: usize) -> usize {
    query_len.div_ceil(lanes)
}

/// Builds the 8-bit biased profile rows: `alphabet_size * seg_len` lanes,
/// row-major by symbol.
pub(crate) fn build_byte_rows(
    query: &[u8],
    matrix: &SubstitutionMatrix,
    bias: u8,
) -> (usize, Vec<LaneU8>) {
    let len = query.len();
    let lanes = LaneU8::LANES;
    let sl = seg_len(len.max(1), lanes);
    let alphabet = matrix.alphabet_size();
    let mut rows = vec![LaneU8::splat(bias); alphabet * sl];
    for symbol in 0..alphabet {
        for seg in 0..sl {
            let mut lane_vals = [bias; 16];
            for (lane, slot) in lane_vals.iter_mut().enumerate() {
                let p = seg + lane * sl;
                *slot = if p >= len {
                    bias
                } else {
                    let raw = matrix.score(symbol as u8, query[p]) as i32 + bias as i32;
                    raw as u8
                };
            }
            rows[symbol * sl + seg] = LaneU8::from_array(lane_vals);
        }
    }
    (sl, rows)
}

/// Builds the 16-bit (unbiased) profile rows: `alphabet_size * seg_len` lanes.
pub(crate) fn build_word_rows(query: &[u8], matrix: &SubstitutionMatrix) -> (usize, Vec<LaneI16>) {
    let len = query.len();
    let lanes = LaneI16::LANES;
    let sl = seg_len(len.max(1), lanes);
    let alphabet = matrix.alphabet_size();
    let mut rows = vec![LaneI16::splat(0); alphabet * sl];
    for symbol in 0..alphabet {
        for seg in 0..sl {
            let mut lane_vals = [0i16; 8];
            for (lane, slot) in lane_vals.iter_mut().enumerate() {
                let p = seg + lane * sl;
                *slot = if p >= len {
                    0
                } else {
                    matrix.score(symbol as u8, query[p]) as i16
                };
            }
            rows[symbol * sl + seg] = LaneI16::from_array(lane_vals);
        }
    }
    (sl, rows)
}

/// Which precision profile(s) to build and keep available to the kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoreSize {
    /// 8-bit only: smallest footprint, saturates around score 255.
    Byte,
    /// 16-bit only: skips the byte kernel entirely.
    Word,
    /// Build both; the orchestrator tries byte first and promotes on overflow.
    Both,
}

/// The query-side precomputation the kernels consume: striped profile rows
/// at one or both precisions, plus the reversed query used by the
/// end→start finder (§4.3).
pub struct Profile {
    query: Vec<u8>,
    query_rev: Vec<u8>,
    bias: u8,
    alphabet_size: usize,
    seg_len_byte: usize,
    seg_len_word: usize,
    byte_rows: Option<Vec<LaneU8>>,
    word_rows: Option<Vec<LaneI16>>,
}

impl Profile {
    pub fn build(query: &[u8], matrix: &SubstitutionMatrix, score_size: ScoreSize) -> Self {
        let bias = matrix.bias();
        let mut query_rev = query.to_vec();
        query_rev.reverse();

        let (seg_len_byte, byte_rows) = match score_size {
            ScoreSize::Byte | ScoreSize::Both => {
                let (sl, rows) = build_byte_rows(query, matrix, bias);
                (sl, Some(rows))
            }
            ScoreSize::Word => (0, None),
        };
        let (seg_len_word, word_rows) = match score_size {
            ScoreSize::Word | ScoreSize::Both => {
                let (sl, rows) = build_word_rows(query, matrix);
                (sl, Some(rows))
            }
            ScoreSize::Byte => (0, None),
        };

        Profile {
            query: query.to_vec(),
            query_rev,
            bias,
            alphabet_size: matrix.alphabet_size(),
            seg_len_byte,
            seg_len_word,
            byte_rows,
            word_rows,
        }
    }

    pub fn query(&self) -> &[u8] {
        &self.query
    }

    pub fn query_rev(&self) -> &[u8] {
        &self.query_rev
    }

    pub fn bias(&self) -> u8 {
        self.bias
    }

    pub fn seg_len_byte(&self) -> usize {
        self.seg_len_byte
    }

    pub fn seg_len_word(&self) -> usize {
        self.seg_len_word
    }

    pub fn byte_row(&self, symbol: u8) -> Option<&[LaneU8]> {
        self.byte_rows.as_ref().map(|rows| {
            let start = symbol as usize * self.seg_len_byte;
            &rows[start..start + self.seg_len_byte]
        })
    }

    pub fn word_row(&self, symbol: u8) -> Option<&[LaneI16]> {
        self.word_rows.as_ref().map(|rows| {
            let start = symbol as usize * self.seg_len_word;
            &rows[start..start + self.seg_len_word]
        })
    }

    pub fn has_byte(&self) -> bool {
        self.byte_rows.is_some()
    }

    pub fn has_word(&self) -> bool {
        self.word_rows.is_some()
    }

    pub fn alphabet_size(&self) -> usize {
        self.alphabet_size
    }

    /// The full row-major table (all symbols), for kernels that want to
    /// index it directly instead of slicing one symbol at a time.
    pub(crate) fn byte_rows_flat(&self) -> Option<&[LaneU8]> {
        self.byte_rows.as_deref()
    }

    pub(crate) fn word_rows_flat(&self) -> Option<&[LaneI16]> {
        self.word_rows.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_profile_in_range_after_bias() {
        let matrix = SubstitutionMatrix::simple(4, 2, -2);
        let profile = Profile::build(b"\x00\x01\x02\x03", &matrix, ScoreSize::Byte);
        assert_eq!(profile.bias(), 2);
        let row = profile.byte_row(0).unwrap();
        // match at position 0 => score 2 + bias 2 = 4
        assert_eq!(row[0].to_array()[0], 4);
    }

    #[test]
    fn padding_lanes_use_bias() {
        let matrix = SubstitutionMatrix::simple(4, 2, -2);
        // 3 codes, 16 lanes => seg_len = 1, lanes 3..16 are padding
        let profile = Profile::build(&[0, 1, 2], &matrix, ScoreSize::Byte);
        let row = profile.byte_row(0).unwrap();
        assert_eq!(row[0].to_array()[3], profile.bias());
    }

    #[test]
    fn reversed_query_is_mirror() {
        let matrix = SubstitutionMatrix::simple(4, 2, -2);
        let profile = Profile::build(&[0, 1, 2, 3], &matrix, ScoreSize::Both);
        assert_eq!(profile.query_rev(), &[3, 2, 1, 0]);
    }
}
