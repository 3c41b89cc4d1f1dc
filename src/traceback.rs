//! Banded, scalar traceback (§4.4): once the striped kernels have located the
//! end (and, optionally, the start) of the best local alignment, this runs a
//! classical affine-gap DP confined to a diagonal band to recover the cigar.
//! Not vectorized — this is a small, already-localized substring by the time
//! it gets here.

use crate::cigar::{Cigar, CigarOp};
use crate::error::{AlignError, AlignResult};
use crate::matrix::SubstitutionMatrix;

/// Which branch produced the winning H-plane value for a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HFrom {
    Diag,
    FromE,
    FromF,
}

/// Which branch produced the winning value in a gap plane (E or F).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GapFrom {
    Extend,
    Open,
}

/// A dense-within-band store: row `i` holds columns `[max(0, i - band), min(r_len - 1, i + band)]`.
struct BandPlane<T> {
    band: usize,
    width: usize,
    r_len: usize,
    cells: Vec<Option<T>>,
}

impl<T: Copy> BandPlane<T> {
    fn new(q_len: usize, r_len: usize, band: usize) -> Self {
        let width = 2 * band + 1;
        BandPlane {
            band,
            width,
            r_len,
            cells: vec![None; q_len * width],
        }
    }

    fn row_low(&self, i: usize) -> usize {
        i.saturating_sub(self.band)
    }

    fn in_band(&self, i: usize, j: usize) -> bool {
        let low = self.row_low(i);
        let high = (i + self.band).min(self.r_len.saturating_sub(1));
        j >= low && j <= high
    }

    fn index(&self, i: usize, j: usize) -> usize {
        let low = self.row_low(i);
        i * self.width + (j - low)
    }

    fn get(&self, i: usize, j: usize) -> Option<T> {
        if !self.in_band(i, j) {
            return None;
        }
        self.cells[self.index(i, j)]
    }

    fn set(&mut self, i: usize, j: usize, value: T) {
        let idx = self.index(i, j);
        self.cells[idx] = Some(value);
    }
}

struct BandedDp {
    h: BandPlane<i32>,
    dir_h: BandPlane<HFrom>,
    dir_e: BandPlane<GapFrom>,
    dir_f: BandPlane<GapFrom>,
}

fn run_banded(
    query: &[u8],
    reference: &[u8],
    matrix: &SubstitutionMatrix,
    gap_open: i32,
    gap_extend: i32,
    band: usize,
) -> BandedDp {
    let q_len = query.len();
    let r_len = reference.len();
    let mut h = BandPlane::new(q_len, r_len, band);
    let mut e = BandPlane::<i32>::new(q_len, r_len, band);
    let mut dir_h = BandPlane::new(q_len, r_len, band);
    let mut dir_e = BandPlane::new(q_len, r_len, band);
    let mut dir_f = BandPlane::new(q_len, r_len, band);

    for i in 0..q_len {
        let low = i.saturating_sub(band);
        let high = (i + band).min(r_len.saturating_sub(1));
        let mut f_running = i32::MIN / 2;
        for j in low..=high {
            // Edge policy: row/column -1 is treated as an all-zero baseline.
            let diag_prev = if i == 0 || j == 0 {
                0
            } else {
                h.get(i - 1, j - 1).unwrap_or(0)
            };
            let diag = diag_prev + matrix.score(query[i], reference[j]) as i32;

            let h_up = if i == 0 { 0 } else { h.get(i - 1, j).unwrap_or(i32::MIN / 2) };
            let e_up = if i == 0 { i32::MIN / 2 } else { e.get(i - 1, j).unwrap_or(i32::MIN / 2) };
            let e_extend = e_up - gap_extend;
            let e_open = h_up - gap_open;
            let (e_val, e_from) = if e_extend >= e_open {
                (e_extend, GapFrom::Extend)
            } else {
                (e_open, GapFrom::Open)
            };

            let h_left = if j == 0 { 0 } else { h.get(i, j - 1).unwrap_or(0) };
            let f_extend = f_running - gap_extend;
            let f_open = h_left - gap_open;
            let (f_val, f_from) = if f_extend >= f_open {
                (f_extend, GapFrom::Extend)
            } else {
                (f_open, GapFrom::Open)
            };
            f_running = f_val;

            let (h_val, h_from) = if diag >= e_val && diag >= f_val {
                (diag, HFrom::Diag)
            } else if e_val >= f_val {
                (e_val, HFrom::FromE)
            } else {
                (f_val, HFrom::FromF)
            };

            h.set(i, j, h_val);
            e.set(i, j, e_val);
            dir_h.set(i, j, h_from);
            dir_e.set(i, j, e_from);
            dir_f.set(i, j, f_from);
        }
    }

    BandedDp {
        h,
        dir_h,
        dir_e,
        dir_f,
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    H,
    E,
    F,
}

/// Runs the banded traceback between `query` and `reference` (already
/// trimmed to the identified local alignment span), retrying with a doubled
/// band whenever the band was too narrow to reach `target_score`.
pub fn traceback(
    query: &[u8],
    reference: &[u8],
    matrix: &SubstitutionMatrix,
    gap_open: u8,
    gap_extend: u8,
    target_score: u32,
) -> AlignResult<Cigar> {
    if query.is_empty() || reference.is_empty() {
        let mut cigar = Cigar::new();
        cigar.push(CigarOp::Match, query.len().max(reference.len()).max(1) as u32);
        return Ok(cigar);
    }

    let mut band = (query.len() as i64 - reference.len() as i64).unsigned_abs() as usize + 1;
    let max_band = query.len().max(reference.len());

    loop {
        let dp = run_banded(query, reference, matrix, gap_open as i32, gap_extend as i32, band);
        let last_i = query.len() - 1;
        let last_j = reference.len() - 1;
        if let Some(best) = dp.h.get(last_i, last_j) {
            if best >= target_score as i32 {
                return Ok(walk_back(&dp, query.len(), reference.len()));
            }
        }
        if band >= max_band {
            return Err(AlignError::TracebackCorrupt { code: 0 });
        }
        band = (band * 2).min(max_band);
    }
}

fn walk_back(dp: &BandedDp, q_len: usize, r_len: usize) -> Cigar {
    let mut ops: Vec<CigarOp> = Vec::new();
    let mut i = q_len as i64 - 1;
    let mut j = r_len as i64 - 1;
    let mut state = State::H;

    while i >= 0 && j >= 0 {
        if i == 0 && j == 0 {
            // The original forces a trailing (1, 'M') at the i=0 boundary
            // (smith_waterman_sse2.C:839) instead of trusting whatever the
            // direction plane resolved for the first cell.
            ops.push(CigarOp::Match);
            break;
        }
        match state {
            State::H => match dp.dir_h.get(i as usize, j as usize) {
                Some(HFrom::Diag) | None => {
                    ops.push(CigarOp::Match);
                    i -= 1;
                    j -= 1;
                }
                Some(HFrom::FromE) => state = State::E,
                Some(HFrom::FromF) => state = State::F,
            },
            State::E => {
                ops.push(CigarOp::Ins);
                let from = dp.dir_e.get(i as usize, j as usize);
                i -= 1;
                if from != Some(GapFrom::Extend) {
                    state = State::H;
                }
            }
            State::F => {
                ops.push(CigarOp::Del);
                let from = dp.dir_f.get(i as usize, j as usize);
                j -= 1;
                if from != Some(GapFrom::Extend) {
                    state = State::H;
                }
            }
        }
    }
    // Edge policy: any remainder once one sequence is exhausted is a gap
    // against the all-zero baseline, not a match.
    while i >= 0 {
        ops.push(CigarOp::Ins);
        i -= 1;
    }
    while j >= 0 {
        ops.push(CigarOp::Del);
        j -= 1;
    }

    ops.reverse();
    let mut cigar = Cigar::new();
    for op in ops {
        cigar.push(op, 1);
    }
    cigar
}
