//! The lane engine: a small capability trait that both striped kernels (§4.2)
//! program against, so the recurrence is written once per precision without
//! being tied to one instruction set. `wide` supplies the actual 128-bit
//! vector types; everything this trait can't express portably (shifting a
//! whole vector by one lane, folding to a scalar) falls back to a
//! to-array/from-array round trip, same as the teacher crate's own
//! `shift_left` helper in `simd_utils.rs`.

use wide::{i16x8, u8x16};

/// Capability set a striped DP kernel needs from its lane type: saturating
/// add/subtract-with-floor, elementwise max, a one-lane shift-in, and a
/// horizontal fold to a scalar.
pub trait LaneOps: Copy {
    /// Number of lanes (16 for the 8-bit path, 8 for the 16-bit path).
    const LANES: usize;
    type Scalar: Copy + Ord + Default;
    type Array: AsRef<[Self::Scalar]> + AsMut<[Self::Scalar]>;

    fn splat(value: Self::Scalar) -> Self;
    fn zero() -> Self {
        Self::splat(Self::Scalar::default())
    }

    fn to_array(self) -> Self::Array;
    fn from_array(arr: Self::Array) -> Self;

    /// Elementwise max.
    fn max(self, other: Self) -> Self;

    /// Elementwise saturating add.
    fn sat_add(self, other: Self) -> Self;

    /// Elementwise `max(0, self - other)` — saturating subtraction of a
    /// non-negative quantity, floored at zero the way `subs_epu8`/`subs_epu16`
    /// do in the original SSE2 kernel even for the signed 16-bit lanes.
    fn floor_sub(self, other: Self) -> Self;

    /// Shifts every lane up by one position (lane ℓ takes what was lane ℓ−1);
    /// the new lane 0 becomes `insert`. Mirrors `_mm_slli_si128` by one element.
    fn shift_in(self, insert: Self::Scalar) -> Self {
        let mut arr = self.to_array();
        let slice = arr.as_mut();
        for i in (1..Self::LANES).rev() {
            slice[i] = slice[i - 1];
        }
        slice[0] = insert;
        Self::from_array(arr)
    }

    /// Folds all lanes to their maximum scalar value.
    fn horizontal_max(self) -> Self::Scalar {
        let arr = self.to_array();
        arr.as_ref().iter().copied().max().unwrap_or_default()
    }
}

/// 8-bit lane: 16 lanes of `u8`, the biased striped kernel's working type.
#[derive(Clone, Copy, Debug)]
pub struct LaneU8(pub u8x16);

impl LaneOps for LaneU8 {
    const LANES: usize = 16;
    type Scalar = u8;
    type Array = [u8; 16];

    fn splat(value: u8) -> Self {
        LaneU8(u8x16::splat(value))
    }

    fn to_array(self) -> [u8; 16] {
        self.0.to_array()
    }

    fn from_array(arr: [u8; 16]) -> Self {
        LaneU8(u8x16::from(arr))
    }

    fn max(self, other: Self) -> Self {
        LaneU8(self.0.max(other.0))
    }

    fn sat_add(self, other: Self) -> Self {
        LaneU8(self.0.saturating_add(other.0))
    }

    fn floor_sub(self, other: Self) -> Self {
        // u8 saturating_sub already floors at zero.
        LaneU8(self.0.saturating_sub(other.0))
    }
}

/// 16-bit lane: 8 lanes of `i16`, the overflow-fallback striped kernel's working type.
#[derive(Clone, Copy, Debug)]
pub struct LaneI16(pub i16x8);

impl LaneOps for LaneI16 {
    const LANES: usize = 8;
    type Scalar = i16;
    type Array = [i16; 8];

    fn splat(value: i16) -> Self {
        LaneI16(i16x8::splat(value))
    }

    fn to_array(self) -> [i16; 8] {
        self.0.to_array()
    }

    fn from_array(arr: [i16; 8]) -> Self {
        LaneI16(i16x8::from(arr))
    }

    fn max(self, other: Self) -> Self {
        LaneI16(self.0.max(other.0))
    }

    fn sat_add(self, other: Self) -> Self {
        LaneI16(self.0.saturating_add(other.0))
    }

    fn floor_sub(self, other: Self) -> Self {
        let diff = LaneI16(self.0.saturating_sub(other.0));
        diff.max(Self::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_in_moves_lanes_up() {
        let v = LaneI16::from_array([1, 2, 3, 4, 5, 6, 7, 8]);
        let shifted = v.shift_in(0);
        assert_eq!(shifted.to_array(), [0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn horizontal_max_finds_peak() {
        let v = LaneU8::from_array([1, 9, 3, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(v.horizontal_max(), 9);
    }

    #[test]
    fn floor_sub_never_goes_negative_for_signed_lane() {
        let v = LaneI16::splat(2);
        let g = LaneI16::splat(5);
        assert_eq!(v.floor_sub(g).to_array(), [0; 8]);
    }

    #[test]
    fn floor_sub_is_saturating_sub_for_unsigned_lane() {
        let v = LaneU8::splat(2);
        let g = LaneU8::splat(5);
        assert_eq!(v.floor_sub(g).to_array(), [0; 16]);
    }
}
