//! Float plausibility heuristic.
//!
//! A 4-byte column cell is just bits; inference has to guess whether a cell
//! holds an integer or an IEEE-754 single. The rule used here: a bit
//! pattern is plausibly a float when it decodes to a finite value whose
//! magnitude lies in `[1e-6, 1e10)`. That window rejects NaN and the
//! infinities, subnormal-magnitude patterns (which is what small integers
//! decode to) and absurd exponents (large integers), while keeping the
//! coordinate/scale/duration values these files actually store.
//!
//! The exact window is a calibration choice, so it lives in this one place
//! and nothing else in inference knows about bit patterns.

/// Smallest magnitude accepted as a deliberate float.
const MIN_MAGNITUDE: f32 = 1e-6;

/// Magnitude from which a pattern is treated as integer noise.
const MAX_MAGNITUDE: f32 = 1e10;

/// Decide whether a raw 4-byte pattern is more likely a float than noise.
pub fn plausible_float(bits: i32) -> bool {
    let value = f32::from_bits(bits as u32);
    if !value.is_finite() {
        return false;
    }
    let magnitude = value.abs();
    (MIN_MAGNITUDE..MAX_MAGNITUDE).contains(&magnitude)
}
