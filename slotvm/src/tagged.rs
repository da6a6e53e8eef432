//! Value: an immediate fixnum or a reference into the heap arena.
//!
//! The low bit is the tag. Fixnums keep their payload in the upper 63 bits,
//! references keep the arena index in bits 1..33 and the slot generation
//! above it.
use std::fmt;

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ValueTag {
    Fixnum = 0b0,
    Reference = 0b1,
}

pub const TAG_MASK: u64 = 0b1;

/// Largest integer representable as an immediate.
pub const FIXNUM_MAX: i64 = i64::MAX >> 1;
/// Smallest integer representable as an immediate.
pub const FIXNUM_MIN: i64 = i64::MIN >> 1;

/// Slot of an object inside the heap arena. The generation tells a reused
/// slot apart from the object that lived there before.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    index: u32,
    generation: u32,
}

impl ObjectId {
    /// Largest generation that still fits into a `Value`.
    pub const MAX_GENERATION: u32 = (1 << 31) - 1;

    pub(crate) fn new(index: u32, generation: u32) -> Self {
        debug_assert!(generation <= Self::MAX_GENERATION);
        Self { index, generation }
    }

    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.generation {
            0 => write!(f, "#{}", self.index),
            generation => write!(f, "#{}.{generation}", self.index),
        }
    }
}

/// A generic Value
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Value(u64);

impl Value {
    /// Tags `value` without a range check, the top bit is lost.
    pub fn from_fixnum(value: i64) -> Self {
        debug_assert!((FIXNUM_MIN..=FIXNUM_MAX).contains(&value));
        Self((value as u64) << 1)
    }

    pub fn try_from_fixnum(value: i64) -> Option<Self> {
        if (FIXNUM_MIN..=FIXNUM_MAX).contains(&value) {
            Some(Self((value as u64) << 1))
        } else {
            None
        }
    }

    pub fn from_object(id: ObjectId) -> Self {
        let word = ((id.generation as u64) << 32) | id.index as u64;
        Self((word << 1) | ValueTag::Reference as u64)
    }

    #[inline]
    pub fn tag(self) -> ValueTag {
        if self.0 & TAG_MASK == ValueTag::Fixnum as u64 {
            ValueTag::Fixnum
        } else {
            ValueTag::Reference
        }
    }

    #[inline]
    pub fn is_fixnum(self) -> bool {
        self.tag() == ValueTag::Fixnum
    }

    #[inline]
    pub fn is_object(self) -> bool {
        self.tag() == ValueTag::Reference
    }

    pub fn as_fixnum(self) -> Option<i64> {
        // arithmetic shift restores the sign
        self.is_fixnum().then(|| (self.0 as i64) >> 1)
    }

    pub fn as_object(self) -> Option<ObjectId> {
        self.is_object().then(|| {
            let word = self.0 >> 1;
            ObjectId::new(word as u32, (word >> 32) as u32)
        })
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Self::from_object(id)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.as_fixnum(), self.as_object()) {
            (Some(n), _) => write!(f, "Fixnum({n})"),
            (_, Some(id)) => write!(f, "Ref({id})"),
            _ => unreachable!("a value is either a fixnum or a reference"),
        }
    }
}
