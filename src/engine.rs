//! The orchestrator (§4.5): owns the query profile, picks precision, drives
//! the end→start finder and banded traceback behind their flag gates, and
//! assembles the caller-facing [`AlignmentResult`].

use crate::cigar::Cigar;
use crate::error::{AlignError, AlignResult};
use crate::kernel::{self, KernelOutput};
use crate::matrix::SubstitutionMatrix;
use crate::profile::{Profile, ScoreSize};
use crate::result::{AlignFlags, AlignmentResult};
use crate::traceback;

/// One query, precomputed once and reused across many `align` calls against
/// different references — the expensive part (the striped profile) is built
/// exactly once in [`Aligner::new`].
pub struct Aligner {
    profile: Profile,
    matrix: SubstitutionMatrix,
}

/// Which kernel precision actually produced a `KernelOutput`. Tracked so the
/// end→start finder can reverse-run the same precision the forward pass
/// settled on instead of re-probing the profile's capabilities — mirroring
/// the original's `word` flag (smith_waterman_sse2.C:124-135), which follows
/// the forward pass's promotion decision rather than re-deriving it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Precision {
    Byte,
    Word,
}

impl Aligner {
    pub fn new(query: &[u8], matrix: &SubstitutionMatrix, score_size: ScoreSize) -> AlignResult<Self> {
        if query.is_empty() {
            return Err(AlignError::EmptyQuery);
        }
        for (pos, &symbol) in query.iter().enumerate() {
            if symbol as usize >= matrix.alphabet_size() {
                return Err(AlignError::SymbolOutOfRange {
                    symbol,
                    pos,
                    alphabet_size: matrix.alphabet_size(),
                });
            }
        }
        let profile = Profile::build(query, matrix, score_size);
        Ok(Aligner {
            profile,
            matrix: matrix.clone(),
        })
    }

    /// Runs the 8-bit kernel first (if built), promoting transparently to
    /// 16-bit on overflow. Returns `None` if no profile at the required
    /// precision exists (the configuration-error case from §7).
    fn run_kernel(
        &self,
        reference: &[u8],
        gap_open: u8,
        gap_extend: u8,
        mask_len: usize,
        terminate: Option<u32>,
    ) -> Option<(KernelOutput, Precision)> {
        if self.profile.has_byte() {
            let byte_out = kernel::align_byte(&self.profile, reference, gap_open, gap_extend, mask_len, terminate)?;
            if byte_out.overflow {
                log::trace!("8-bit kernel saturated, retrying in 16-bit");
                if self.profile.has_word() {
                    let word_out =
                        kernel::align_word(&self.profile, reference, gap_open, gap_extend, mask_len, terminate)?;
                    return Some((word_out, Precision::Word));
                }
                log::warn!("8-bit kernel saturated and no 16-bit profile was built; returning no alignment");
                return None;
            }
            Some((byte_out, Precision::Byte))
        } else if self.profile.has_word() {
            let word_out = kernel::align_word(&self.profile, reference, gap_open, gap_extend, mask_len, terminate)?;
            Some((word_out, Precision::Word))
        } else {
            None
        }
    }

    fn find_start(
        &self,
        reference: &[u8],
        gap_open: u8,
        gap_extend: u8,
        score: u32,
        ref_end: usize,
        query_end: usize,
        precision: Precision,
    ) -> AlignResult<(usize, usize)> {
        let query_len = self.profile.query().len();
        let rev_query_slice = &self.profile.query_rev()[query_len - 1 - query_end..];
        // Reverse pass must run at the exact precision the forward pass
        // settled on: a `Both` profile offers an 8-bit row, but if the
        // forward pass overflowed into 16-bit, retrying the reverse prefix
        // in 8-bit would saturate on the same query and never match `score`.
        let sub_score_size = match precision {
            Precision::Byte => ScoreSize::Byte,
            Precision::Word => ScoreSize::Word,
        };
        let sub_profile = Profile::build(rev_query_slice, &self.matrix, sub_score_size);

        let reversed_ref_prefix: Vec<u8> = reference[..=ref_end].iter().rev().copied().collect();

        let out = match precision {
            Precision::Byte => kernel::align_byte(&sub_profile, &reversed_ref_prefix, gap_open, gap_extend, 0, Some(score)),
            Precision::Word => kernel::align_word(&sub_profile, &reversed_ref_prefix, gap_open, gap_extend, 0, Some(score)),
        };
        let out = out.ok_or(AlignError::MissingPrecision)?;

        if out.score != score {
            return Err(AlignError::ScoreMismatch {
                forward: score,
                reverse: out.score,
            });
        }

        let ref_start = ref_end - out.ref_end;
        let query_start = query_end - out.query_end;
        Ok((ref_start, query_start))
    }

    /// Aligns `reference` against the stored query profile. See §4.5 for the
    /// flag semantics; `None` covers every "errors surfaced to caller" case
    /// from §7 (missing precision, reverse-pass score mismatch, traceback failure).
    #[allow(clippy::too_many_arguments)]
    pub fn align(
        &self,
        reference: &[u8],
        gap_open: u8,
        gap_extend: u8,
        flags: AlignFlags,
        filters: u32,
        filterd: u32,
        mask_len: usize,
    ) -> Option<AlignmentResult> {
        let (kernel_out, precision) = self.run_kernel(reference, gap_open, gap_extend, mask_len, None)?;

        let score_filtered = flags.contains(AlignFlags::FILTER_BY_SCORE) && kernel_out.score < filters;

        // Cigar is opt-in, not a byproduct of "the score filter didn't trip":
        // mirrors the original's `(7 & flag) != 0` gate (smith_waterman_sse2.C:147),
        // where bits 0/1/2 are return_start/filter_by_score/filter_by_length,
        // with always_cigar (bit 3) as the one unconditional override.
        let cigar_requested = flags.intersects(
            AlignFlags::RETURN_START | AlignFlags::FILTER_BY_SCORE | AlignFlags::FILTER_BY_LENGTH,
        ) || flags.contains(AlignFlags::ALWAYS_CIGAR);
        // Mirrors the original's `flag == 0` skip (smith_waterman_sse2.C:119):
        // with no flags at all, the reverse pass never runs.
        let want_start = flags != AlignFlags::NONE;

        let start = if want_start && !score_filtered {
            match self.find_start(
                reference,
                gap_open,
                gap_extend,
                kernel_out.score,
                kernel_out.ref_end,
                kernel_out.query_end,
                precision,
            ) {
                Ok(pair) => Some(pair),
                Err(err) => {
                    log::warn!("end\u{2192}start finder failed: {err}");
                    None
                }
            }
        } else {
            None
        };

        let length_filtered = match (flags.contains(AlignFlags::FILTER_BY_LENGTH), start) {
            (true, Some((ref_start, query_start))) => {
                let ref_span = (kernel_out.ref_end - ref_start + 1) as u32;
                let query_span = (kernel_out.query_end - query_start + 1) as u32;
                ref_span > filterd || query_span > filterd
            }
            _ => false,
        };

        let cigar: Option<Cigar> = if cigar_requested
            && !score_filtered
            && (!length_filtered || flags.contains(AlignFlags::ALWAYS_CIGAR))
        {
            start.and_then(|(ref_start, query_start)| {
                let q_sub = &self.profile.query()[query_start..=kernel_out.query_end];
                let r_sub = &reference[ref_start..=kernel_out.ref_end];
                match traceback::traceback(q_sub, r_sub, &self.matrix, gap_open, gap_extend, kernel_out.score) {
                    Ok(c) => Some(c),
                    Err(err) => {
                        log::warn!("banded traceback failed: {err}");
                        None
                    }
                }
            })
        } else {
            None
        };

        let (ref_start_out, query_start_out) = if flags.contains(AlignFlags::RETURN_START) {
            (start.map(|(r, _)| r), start.map(|(_, q)| q))
        } else {
            (None, None)
        };

        Some(AlignmentResult {
            score1: kernel_out.score,
            score2: kernel_out.second_best.map(|s| s.score).unwrap_or(0),
            ref_start: ref_start_out,
            ref_end: kernel_out.ref_end,
            query_start: query_start_out,
            query_end: kernel_out.query_end,
            ref_end2: kernel_out.second_best.map(|s| s.ref_end),
            cigar,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_matrix() -> SubstitutionMatrix {
        SubstitutionMatrix::simple(4, 2, -2)
    }

    #[test]
    fn identity_end_to_end() {
        let matrix = identity_matrix();
        let aligner = Aligner::new(&[0, 1, 2, 3], &matrix, ScoreSize::Both).unwrap();
        let result = aligner
            .align(
                &[0, 1, 2, 3],
                3,
                1,
                AlignFlags::RETURN_START | AlignFlags::ALWAYS_CIGAR,
                0,
                0,
                15,
            )
            .unwrap();
        assert_eq!(result.score1, 8);
        assert_eq!(result.ref_start, Some(0));
        assert_eq!(result.ref_end, 3);
        assert_eq!(result.query_start, Some(0));
        assert_eq!(result.query_end, 3);
        let cigar = result.cigar.unwrap();
        assert_eq!(cigar.ops().len(), 1);
        assert_eq!(cigar.ops()[0].len, 4);
    }

    #[test]
    fn local_match_inside_longer_reference_has_correct_start() {
        let matrix = identity_matrix();
        let aligner = Aligner::new(&[0, 1, 2, 3], &matrix, ScoreSize::Both).unwrap();
        let result = aligner
            .align(
                &[3, 3, 0, 1, 2, 3, 3, 3],
                3,
                1,
                AlignFlags::RETURN_START,
                0,
                0,
                15,
            )
            .unwrap();
        assert_eq!(result.score1, 8);
        assert_eq!(result.ref_start, Some(2));
        assert_eq!(result.ref_end, 5);
        assert_eq!(result.query_start, Some(0));
        assert_eq!(result.query_end, 3);
    }

    #[test]
    fn score_filter_skips_start_and_cigar() {
        let matrix = identity_matrix();
        let aligner = Aligner::new(&[0, 1, 2, 3], &matrix, ScoreSize::Both).unwrap();
        let result = aligner
            .align(
                &[0, 1, 2, 3],
                3,
                1,
                AlignFlags::FILTER_BY_SCORE | AlignFlags::RETURN_START,
                1000,
                0,
                15,
            )
            .unwrap();
        assert_eq!(result.score1, 8);
        assert!(result.ref_start.is_none());
        assert!(result.cigar.is_none());
    }

    #[test]
    fn overflow_path_promotes_to_word_kernel() {
        let matrix = SubstitutionMatrix::simple(4, 10, -10);
        let query = vec![0u8; 50];
        let aligner = Aligner::new(&query, &matrix, ScoreSize::Both).unwrap();
        let result = aligner
            .align(&vec![0u8; 50], 3, 1, AlignFlags::NONE, 0, 0, 15)
            .unwrap();
        assert_eq!(result.score1, 500);
    }

    #[test]
    fn overflow_path_still_finds_start_and_cigar_in_word_precision() {
        // A query whose optimal score saturates the 8-bit kernel forces the
        // forward pass into the 16-bit kernel; the reverse pass run by
        // `find_start` must follow it there rather than retry in 8-bit and
        // saturate on the same query, which would report a score mismatch
        // and silently drop the start coordinates and cigar.
        let matrix = SubstitutionMatrix::simple(4, 10, -10);
        let query = vec![0u8; 50];
        let aligner = Aligner::new(&query, &matrix, ScoreSize::Both).unwrap();
        let result = aligner
            .align(
                &vec![0u8; 50],
                3,
                1,
                AlignFlags::RETURN_START | AlignFlags::ALWAYS_CIGAR,
                0,
                0,
                15,
            )
            .unwrap();
        assert_eq!(result.score1, 500);
        assert_eq!(result.ref_start, Some(0));
        assert_eq!(result.query_start, Some(0));
        let cigar = result.cigar.expect("overflow path must still produce a cigar");
        assert_eq!(cigar.query_span(), 50);
        assert_eq!(cigar.ref_span(), 50);
    }

    #[test]
    fn no_flags_skips_start_and_cigar_entirely() {
        let matrix = identity_matrix();
        let aligner = Aligner::new(&[0, 1, 2, 3], &matrix, ScoreSize::Both).unwrap();
        let result = aligner
            .align(&[0, 1, 2, 3], 3, 1, AlignFlags::NONE, 0, 0, 15)
            .unwrap();
        assert_eq!(result.score1, 8);
        assert!(result.ref_start.is_none());
        assert!(result.query_start.is_none());
        assert!(result.cigar.is_none());
    }

    #[test]
    fn always_cigar_alone_still_produces_a_cigar() {
        let matrix = identity_matrix();
        let aligner = Aligner::new(&[0, 1, 2, 3], &matrix, ScoreSize::Both).unwrap();
        let result = aligner
            .align(&[0, 1, 2, 3], 3, 1, AlignFlags::ALWAYS_CIGAR, 0, 0, 15)
            .unwrap();
        assert_eq!(result.score1, 8);
        // always_cigar alone doesn't ask for coordinates back...
        assert!(result.ref_start.is_none());
        // ...but it must still force the cigar attempt, not be a no-op.
        assert!(result.cigar.is_some());
    }

    #[test]
    fn empty_query_is_rejected() {
        let matrix = identity_matrix();
        let err = Aligner::new(&[], &matrix, ScoreSize::Byte).unwrap_err();
        assert!(matches!(err, AlignError::EmptyQuery));
    }
}
