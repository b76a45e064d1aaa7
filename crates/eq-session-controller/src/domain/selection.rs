//! Package-code selection key
//!
//! A 15-character package code is reduced to a lookup key by a 4-bit mask.
//! Bit `i` selects slice `i`, and selected slices are concatenated in bit
//! order:
//!
//! ```text
//! bit0 → [0..8]   bit1 → [11]   bit2 → [12..14]   bit3 → [14]
//! ```

use std::fmt;
use std::str::FromStr;

use super::errors::PackageCodeError;

/// Characters in a full package code.
pub const PACKAGE_CODE_LEN: usize = 15;

/// Characters in the package prefix that keys a rule group.
pub const PACKAGE_PREFIX_LEN: usize = 8;

const SLICES: [(usize, usize); 4] = [(0, 8), (11, 12), (12, 14), (14, 15)];

/// Which package-code slices take part in rule matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SelectionMask(u8);

impl SelectionMask {
    /// Mask from its low four bits.
    #[must_use]
    pub fn from_bits(bits: u8) -> Self {
        Self(bits & 0x0F)
    }

    /// Raw bits.
    #[must_use]
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Whether slice `index` is selected.
    #[must_use]
    pub fn selects(&self, index: usize) -> bool {
        index < 4 && self.0 & (1 << index) != 0
    }
}

/// Parse the persisted form: four `0`/`1` characters, index `i` ↔ bit `i`.
impl FromStr for SelectionMask {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 4 {
            return Err(());
        }
        let mut bits = 0u8;
        for (i, c) in s.chars().enumerate() {
            match c {
                '1' => bits |= 1 << i,
                '0' => {}
                _ => return Err(()),
            }
        }
        Ok(Self(bits))
    }
}

impl fmt::Display for SelectionMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..4 {
            f.write_str(if self.selects(i) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// Build the selection key for `package_code` under `mask`.
pub fn derive_selection_key(
    package_code: &str,
    mask: SelectionMask,
) -> Result<String, PackageCodeError> {
    let chars: Vec<char> = package_code.chars().collect();
    if chars.len() != PACKAGE_CODE_LEN {
        return Err(PackageCodeError {
            code: package_code.to_string(),
            len: chars.len(),
        });
    }

    let key = SLICES
        .iter()
        .enumerate()
        .filter(|(i, _)| mask.selects(*i))
        .flat_map(|(_, &(start, end))| chars[start..end].iter())
        .collect();
    Ok(key)
}

/// The 8-character prefix of a full package code.
pub fn package_prefix(package_code: &str) -> Result<String, PackageCodeError> {
    let chars: Vec<char> = package_code.chars().collect();
    if chars.len() != PACKAGE_CODE_LEN {
        return Err(PackageCodeError {
            code: package_code.to_string(),
            len: chars.len(),
        });
    }
    Ok(chars[..PACKAGE_PREFIX_LEN].iter().collect())
}
