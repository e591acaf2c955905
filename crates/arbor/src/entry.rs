//! # Entry
//!
//! The per-column calling convention shared with compiled prediction routines.

use std::fmt;

/// Flag value marking an [`Entry`] slot as missing.
pub const MISSING: i8 = -1;

/// Flag value marking an [`Entry`] slot as holding a feature value.
pub const PRESENT: i8 = 0;

/// A single feature slot handed to a compiled prediction routine.
///
/// A routine receives a contiguous run of `num_col` entries per row. The
/// binary layout is `{ f32 fvalue; i8 missing; }` with C alignment, so a row
/// buffer can be passed across the FFI boundary as a plain pointer.
///
/// A slot is only meaningful while `missing` is [`PRESENT`]. Buffers are
/// reused across rows, so every slot written for one row has to be reset
/// with [`Entry::clear`] before the buffer is handed to an unrelated row.
#[repr(C)]
#[derive(Clone, Copy, PartialEq)]
pub struct Entry {
    /// The feature value, valid when `missing == PRESENT`
    pub fvalue: f32,

    /// [`MISSING`] or [`PRESENT`]
    pub missing: i8,
}

impl Entry {
    /// A slot in the unset state.
    pub const fn missing() -> Self {
        Self { fvalue: 0.0, missing: MISSING }
    }

    /// Store `value` and mark the slot present.
    #[inline]
    pub fn set(&mut self, value: f32) {
        self.fvalue = value;
        self.missing = PRESENT;
    }

    /// Return the slot to the unset state.
    #[inline]
    pub fn clear(&mut self) {
        *self = Self::missing();
    }

    #[inline]
    pub fn is_missing(&self) -> bool {
        self.missing != PRESENT
    }

    /// The feature value, or `None` for a missing slot.
    #[inline]
    pub fn value(&self) -> Option<f32> {
        if self.is_missing() { None } else { Some(self.fvalue) }
    }
}

impl Default for Entry {
    fn default() -> Self {
        Self::missing()
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value() {
            Some(value) => write!(f, "Entry({value})"),
            None => write!(f, "Entry(missing)"),
        }
    }
}
