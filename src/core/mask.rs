use crate::types::{ValidityMask, VelocityGrid};

/// Mark cells whose velocity is present (not NaN)
pub fn validity_mask(velocity: &VelocityGrid) -> ValidityMask {
    velocity.mapv(|v| !v.is_nan())
}

/// Iterate (row, col) of valid cells in row-major order
pub fn valid_pixels(mask: &ValidityMask) -> impl Iterator<Item = (usize, usize)> + '_ {
    mask.indexed_iter()
        .filter(|(_, valid)| **valid)
        .map(|(idx, _)| idx)
}

pub fn count_valid(mask: &ValidityMask) -> usize {
    mask.iter().filter(|&&v| v).count()
}
