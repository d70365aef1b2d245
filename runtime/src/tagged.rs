//! Value: a single machine word cell, used for stack entries and object slots
//!
//! ```text
//! fixnum:    [ 63 bit signed integer        | 0  ]
//! reference: [ arena index of the object    | 01 ]
//! raw:       [ anything else                | 11 ]
//! ```
//!
//! A reference never holds a machine pointer, only an index into the
//! [`Heap`](crate::Heap) that issued it. Raw cells (function slots, foreign
//! data) are copied bit for bit and never followed.
use std::fmt;

use crate::{FixnumRangeError, ObjectId};

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ValueTag {
    Fixnum = 0b0,
    Reference = 0b01,
    Raw = 0b11,
}

pub const FIXNUM_TAG_MASK: u64 = 0b1;
pub const OBJECT_TAG_MASK: u64 = 0b11;

pub const FIXNUM_MAX: i64 = i64::MAX >> 1;
pub const FIXNUM_MIN: i64 = i64::MIN >> 1;

/// A generic cell
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Value(u64);

impl Value {
    #[inline]
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Encode a small integer.
    ///
    /// # Panics
    /// If `value` is outside `FIXNUM_MIN..=FIXNUM_MAX`. Use
    /// [`Value::try_fixnum`] or an integer object for full 64 bit values.
    #[inline]
    pub fn fixnum(value: i64) -> Self {
        match Self::try_fixnum(value) {
            Some(v) => v,
            None => panic!("fixnum {value} does not fit into 63 bits"),
        }
    }

    #[inline]
    pub fn try_fixnum(value: i64) -> Option<Self> {
        (FIXNUM_MIN..=FIXNUM_MAX)
            .contains(&value)
            .then(|| Self(value.cast_unsigned() << 1))
    }

    #[inline]
    pub fn object(id: ObjectId) -> Self {
        let index = u64::from(id.raw());
        Self((index << 2) | ValueTag::Reference as u64)
    }

    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn tag(self) -> ValueTag {
        if self.is_fixnum() {
            ValueTag::Fixnum
        } else if self.is_object() {
            ValueTag::Reference
        } else {
            ValueTag::Raw
        }
    }

    #[inline]
    pub fn is_fixnum(self) -> bool {
        self.0 & FIXNUM_TAG_MASK == ValueTag::Fixnum as u64
    }

    #[inline]
    pub fn is_object(self) -> bool {
        self.0 & OBJECT_TAG_MASK == ValueTag::Reference as u64
    }

    #[inline]
    pub fn as_fixnum(self) -> Option<i64> {
        // arithmetic shift restores the sign
        self.is_fixnum().then(|| self.0.cast_signed() >> 1)
    }

    #[inline]
    pub fn as_object(self) -> Option<ObjectId> {
        if !self.is_object() {
            return None;
        }
        u32::try_from(self.0 >> 2).ok().map(ObjectId::from_raw)
    }
}

impl TryFrom<i64> for Value {
    type Error = FixnumRangeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::try_fixnum(value).ok_or(FixnumRangeError(value))
    }
}

impl From<ObjectId> for Value {
    fn from(value: ObjectId) -> Self {
        Self::object(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag() {
            ValueTag::Fixnum => write!(f, "{}", self.0.cast_signed() >> 1),
            ValueTag::Reference => match self.as_object() {
                Some(id) => write!(f, "#<object {}>", id.index()),
                None => write!(f, "#<object ?>"),
            },
            ValueTag::Raw => write!(f, "{:#x}", self.0),
        }
    }
}
