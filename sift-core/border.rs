#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Border extension policy used by every filter pass of a pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BorderMode {
    /// Replicate the edge sample: `aaa|abcd|ddd`
    Clamp,
    /// Mirror without repeating the edge sample: `dcb|abcd|cba`
    #[default]
    Reflect101,
}

impl BorderMode {
    /// Map a possibly out-of-range index onto `0..len`.
    ///
    /// `len` must be non-zero.
    #[inline]
    pub fn map_index(self, i: isize, len: usize) -> usize {
        debug_assert!(len > 0);
        if i >= 0 && (i as usize) < len {
            return i as usize;
        }
        match self {
            BorderMode::Clamp => {
                if i < 0 {
                    0
                } else {
                    len - 1
                }
            }
            BorderMode::Reflect101 => {
                if len == 1 {
                    return 0;
                }
                let period = (2 * len - 2) as isize;
                let r = i.rem_euclid(period) as usize;
                if r < len {
                    r
                } else {
                    2 * len - 2 - r
                }
            }
        }
    }
}
