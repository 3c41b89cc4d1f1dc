//! Striped DP kernels (§4.2): one generic sweep over a `LaneOps` lane type,
//! instantiated once for the 8-bit biased path and once for the 16-bit path.
//! The only thing that differs between precisions is the "subtrahend" added
//! after the diagonal step (the matrix bias for 8-bit, zero for 16-bit) and
//! the overflow test, which the 16-bit path never trips.

use crate::lane::{LaneI16, LaneOps, LaneU8};
use crate::profile::Profile;

/// Outcome of one striped sweep: best end coordinates plus everything the
/// orchestrator and the end→start finder need.
#[derive(Debug, Clone)]
pub struct KernelOutput {
    pub score: u32,
    pub ref_end: usize,
    pub query_end: usize,
    /// True only for the 8-bit kernel when the running max could have
    /// saturated; the caller must discard this result and retry in 16-bit.
    pub overflow: bool,
    pub second_best: Option<SecondBest>,
    /// Per-column folded maxima, exposed for callers that want to recompute
    /// a second-best with a different mask length without re-running the sweep.
    pub column_max: Vec<u32>,
}

#[derive(Debug, Clone, Copy)]
pub struct SecondBest {
    pub score: u32,
    pub ref_end: usize,
}

/// Parameters shared by both precisions, expressed in scalar form appropriate
/// to the lane type `L` (the caller builds these for the precision in use).
struct SweepParams<L: LaneOps> {
    gap_open: L,
    gap_extend: L,
    /// Added after the profile add to undo the bias (8-bit) or a no-op zero (16-bit).
    subtrahend: L,
}

fn mask_second_best(column_max: &[u32], ref_end: usize, mask_len: usize) -> Option<SecondBest> {
    if mask_len < 15 {
        return None;
    }
    let edge_lo = ref_end.saturating_sub(mask_len);
    let edge_hi = (ref_end + mask_len).min(column_max.len());

    let mut best: Option<SecondBest> = None;
    let mut consider = |i: usize| {
        let v = column_max[i];
        if best.map(|b| v > b.score).unwrap_or(true) {
            best = Some(SecondBest {
                score: v,
                ref_end: i,
            });
        }
    };
    for i in 0..edge_lo {
        consider(i);
    }
    for i in edge_hi..column_max.len() {
        consider(i);
    }
    best
}

/// Runs the Lazy-F correction (§4.2 step 4) until no lane of `vf` can still
/// raise any `h_store` entry, or `L::LANES` passes have run.
fn lazy_f_correct<L: LaneOps>(
    h_store: &mut [L],
    mut vf: L,
    params: &SweepParams<L>,
    running_max: &mut L,
) {
    vf = vf.shift_in(L::Scalar::default());
    for _ in 0..L::LANES {
        let mut changed = false;
        for h in h_store.iter_mut() {
            let raised = h.max(vf);
            *running_max = running_max.max(raised);
            if !scalars_equal(raised, *h) {
                changed = true;
            }
            *h = raised;
            vf = vf.floor_sub(params.gap_extend);
        }
        vf = vf.shift_in(L::Scalar::default());
        if !changed {
            break;
        }
    }
}

fn scalars_equal<L: LaneOps>(a: L, b: L) -> bool {
    a.to_array().as_ref() == b.to_array().as_ref()
}

/// One full forward sweep of the striped recurrence over `reference`,
/// indexed into `profile_rows` (row-major by symbol, `seg_len` lanes wide
/// per row). `terminate`, when set, stops the sweep the instant a column's
/// folded max equals it (used by the end→start finder's early exit).
#[allow(clippy::too_many_arguments)]
fn sweep<L: LaneOps>(
    profile_rows: &[L],
    seg_len: usize,
    reference: &[u8],
    params: &SweepParams<L>,
    terminate: Option<L::Scalar>,
    overflow_test: impl Fn(L::Scalar) -> bool,
) -> KernelOutput
where
    L::Scalar: ToScoreU32,
{
    let mut h_store = vec![L::zero(); seg_len];
    let mut h_load = vec![L::zero(); seg_len];
    let mut e = vec![L::zero(); seg_len];
    let mut column_max = Vec::with_capacity(reference.len());

    let mut best_score = L::Scalar::default();
    let mut best_ref_end = 0usize;
    let mut h_max: Vec<L> = h_store.clone();
    let mut have_best = false;
    let mut overflow = false;

    'outer: for (i, &symbol) in reference.iter().enumerate() {
        let row = &profile_rows[symbol as usize * seg_len..symbol as usize * seg_len + seg_len];

        let mut running_max = L::zero();
        let mut vh = h_store[seg_len - 1].shift_in(L::Scalar::default());
        std::mem::swap(&mut h_load, &mut h_store);

        let mut vf = L::zero();
        for j in 0..seg_len {
            let mut h = vh.sat_add(row[j]);
            h = h.floor_sub(params.subtrahend);
            h = h.max(e[j]);
            h = h.max(vf);
            running_max = running_max.max(h);
            h_store[j] = h;

            e[j] = e[j].floor_sub(params.gap_extend).max(h.floor_sub(params.gap_open));
            vf = vf.floor_sub(params.gap_extend).max(h.floor_sub(params.gap_open));
            vh = h_load[j];
        }

        lazy_f_correct(&mut h_store, vf, params, &mut running_max);

        let col_max = running_max.horizontal_max();
        column_max.push(col_max);

        if !have_best || col_max > best_score {
            have_best = true;
            best_score = col_max;
            best_ref_end = i;
            h_max.clone_from(&h_store);
        }

        if overflow_test(col_max) {
            overflow = true;
            break 'outer;
        }
        if let Some(t) = terminate {
            if col_max == t {
                break 'outer;
            }
        }
    }

    let query_end = if have_best {
        locate_query_end(&h_max, seg_len, best_score)
    } else {
        0
    };

    let column_max_u32: Vec<u32> = column_max
        .into_iter()
        .map(|v| scalar_to_u32(v))
        .collect();

    KernelOutput {
        score: scalar_to_u32(best_score),
        ref_end: best_ref_end,
        query_end,
        overflow,
        second_best: None,
        column_max: column_max_u32,
    }
}

/// Both lane scalar types (`u8`, `i16`) are non-negative by construction —
/// H is a local-alignment score, floored at 0 throughout the sweep — so both
/// widen losslessly into `u32` via this trait instead of a precision-specific cast.
trait ToScoreU32 {
    fn to_score_u32(self) -> u32;
}

impl ToScoreU32 for u8 {
    fn to_score_u32(self) -> u32 {
        self as u32
    }
}

impl ToScoreU32 for i16 {
    fn to_score_u32(self) -> u32 {
        self.max(0) as u32
    }
}

fn scalar_to_u32<S: ToScoreU32>(v: S) -> u32 {
    v.to_score_u32()
}

fn locate_query_end<L: LaneOps>(h_max: &[L], seg_len: usize, best: L::Scalar) -> usize {
    let mut best_p = usize::MAX;
    for (seg, lane_vec) in h_max.iter().enumerate() {
        let arr = lane_vec.to_array();
        for (lane, &val) in arr.as_ref().iter().enumerate() {
            if scalar_eq(val, best) {
                let p = seg + lane * seg_len;
                if p < best_p {
                    best_p = p;
                }
            }
        }
    }
    if best_p == usize::MAX {
        0
    } else {
        best_p
    }
}

fn scalar_eq<S: PartialEq>(a: S, b: S) -> bool {
    a == b
}

/// Runs the 8-bit biased kernel for `symbol` against the query profile.
pub fn align_byte(
    profile: &Profile,
    reference: &[u8],
    gap_open: u8,
    gap_extend: u8,
    mask_len: usize,
    terminate: Option<u32>,
) -> Option<KernelOutput> {
    let seg_len = profile.seg_len_byte();
    let all_rows = profile.byte_rows_flat()?;
    let bias = profile.bias();
    let params = SweepParams {
        gap_open: LaneU8::splat(gap_open),
        gap_extend: LaneU8::splat(gap_extend),
        subtrahend: LaneU8::splat(bias),
    };
    let terminate_scalar = terminate.map(|t| t.min(255) as u8);
    let mut out = sweep(
        all_rows,
        seg_len,
        reference,
        &params,
        terminate_scalar,
        |v| (v as u32 + bias as u32) >= 255,
    );
    out.second_best = mask_second_best(&out.column_max, out.ref_end, mask_len);
    Some(out)
}

/// Runs the 16-bit kernel for `symbol` against the query profile.
pub fn align_word(
    profile: &Profile,
    reference: &[u8],
    gap_open: u8,
    gap_extend: u8,
    mask_len: usize,
    terminate: Option<u32>,
) -> Option<KernelOutput> {
    let seg_len = profile.seg_len_word();
    let all_rows = profile.word_rows_flat()?;
    let params = SweepParams {
        gap_open: LaneI16::splat(gap_open as i16),
        gap_extend: LaneI16::splat(gap_extend as i16),
        subtrahend: LaneI16::splat(0),
    };
    let terminate_scalar = terminate.map(|t| t.min(i16::MAX as u32) as i16);
    let mut out = sweep(all_rows, seg_len, reference, &params, terminate_scalar, |_| false);
    out.second_best = mask_second_best(&out.column_max, out.ref_end, mask_len);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::SubstitutionMatrix;
    use crate::profile::ScoreSize;

    fn identity_matrix() -> SubstitutionMatrix {
        SubstitutionMatrix::simple(4, 2, -2)
    }

    #[test]
    fn identity_alignment_scores_and_ends() {
        let matrix = identity_matrix();
        let query = [0u8, 1, 2, 3];
        let reference = [0u8, 1, 2, 3];
        let profile = Profile::build(&query, &matrix, ScoreSize::Byte);
        let out = align_byte(&profile, &reference, 3, 1, 15, None).unwrap();
        assert_eq!(out.score, 8);
        assert_eq!(out.ref_end, 3);
        assert_eq!(out.query_end, 3);
        assert!(!out.overflow);
    }

    #[test]
    fn local_match_inside_longer_reference() {
        let matrix = identity_matrix();
        let query = [0u8, 1, 2, 3];
        let reference = [3u8, 3, 0, 1, 2, 3, 3, 3];
        let profile = Profile::build(&query, &matrix, ScoreSize::Byte);
        let out = align_byte(&profile, &reference, 3, 1, 15, None).unwrap();
        assert_eq!(out.score, 8);
        assert_eq!(out.ref_end, 5);
    }

    #[test]
    fn one_mismatch_scores_six() {
        let matrix = identity_matrix();
        let query = [0u8, 1, 2, 3];
        let reference = [0u8, 1, 0, 3];
        let profile = Profile::build(&query, &matrix, ScoreSize::Byte);
        let out = align_byte(&profile, &reference, 3, 1, 15, None).unwrap();
        assert_eq!(out.score, 6);
    }

    #[test]
    fn byte_kernel_overflows_and_caller_can_retry_word() {
        let matrix = SubstitutionMatrix::simple(4, 10, -10);
        let query = vec![0u8; 50];
        let reference = vec![0u8; 50];
        let profile = Profile::build(&query, &matrix, ScoreSize::Both);
        let byte_out = align_byte(&profile, &reference, 3, 1, 15, None).unwrap();
        assert!(byte_out.overflow);

        let word_out = align_word(&profile, &reference, 3, 1, 15, None).unwrap();
        assert!(!word_out.overflow);
        assert_eq!(word_out.score, 500);
    }

    #[test]
    fn second_best_respects_mask_len_floor() {
        let matrix = identity_matrix();
        let query = [0u8, 1, 2, 3];
        // two copies of the query separated by plenty of mismatching noise.
        let mut reference = vec![0u8, 1, 2, 3];
        reference.extend(std::iter::repeat(3u8).take(40));
        reference.extend_from_slice(&[0, 1, 2, 3]);
        let profile = Profile::build(&query, &matrix, ScoreSize::Byte);
        let out = align_byte(&profile, &reference, 3, 1, 15, None).unwrap();
        let second = out.second_best.expect("second best should be found");
        assert_eq!(second.score, out.score);
        assert!((second.ref_end as i64 - out.ref_end as i64).unsigned_abs() as usize > 15);
    }

    #[test]
    fn mask_len_below_floor_suppresses_second_best() {
        let matrix = identity_matrix();
        let query = [0u8, 1, 2, 3];
        let mut reference = vec![0u8, 1, 2, 3];
        reference.extend(std::iter::repeat(3u8).take(40));
        reference.extend_from_slice(&[0, 1, 2, 3]);
        let profile = Profile::build(&query, &matrix, ScoreSize::Byte);
        let out = align_byte(&profile, &reference, 3, 1, 14, None).unwrap();
        assert!(out.second_best.is_none());
    }
}
