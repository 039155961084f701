use std::fmt::{self, Debug, Formatter};
use std::ops::BitOr;

/// Constraints on whether [`HashTable::update`](crate::HashTable::update) may create or replace.
///
/// The flags form a bitmask. [`UpdateFlags::ANY`] places no constraint on the update. Setting
/// both bits makes every update fail, since a key can neither exist and not exist.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct UpdateFlags(u64);

impl UpdateFlags {
    /// Create the key or replace its current value.
    pub const ANY: Self = UpdateFlags(0);
    /// Only create; fail with [`Error::AlreadyExists`](crate::Error::AlreadyExists) if the key is present.
    pub const NO_EXIST: Self = UpdateFlags(1);
    /// Only replace; fail with [`Error::NotFound`](crate::Error::NotFound) if the key is absent.
    pub const EXIST: Self = UpdateFlags(2);

    const ALL: u64 = Self::NO_EXIST.0 | Self::EXIST.0;

    /// Returns the raw bits.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Parses raw bits, returning `None` if any unknown bit is set.
    pub const fn from_bits(bits: u64) -> Option<Self> {
        if bits & !Self::ALL != 0 {
            None
        } else {
            Some(UpdateFlags(bits))
        }
    }

    /// Returns `true` if every bit in `other` is also set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for UpdateFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        UpdateFlags(self.0 | rhs.0)
    }
}

impl Debug for UpdateFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match (self.contains(Self::NO_EXIST), self.contains(Self::EXIST)) {
            (false, false) => f.write_str("ANY"),
            (true, false) => f.write_str("NO_EXIST"),
            (false, true) => f.write_str("EXIST"),
            (true, true) => f.write_str("NO_EXIST | EXIST"),
        }
    }
}

/// Options fixed when a [`HashTable`](crate::HashTable) is created.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CreateFlags(u32);

impl CreateFlags {
    /// Preallocate every element record up front.
    pub const NONE: Self = CreateFlags(0);
    /// Allocate element records lazily, still bounded by the same record limit.
    pub const NO_PREALLOC: Self = CreateFlags(1);

    const ALL: u32 = Self::NO_PREALLOC.0;

    /// Returns the raw bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Parses raw bits, returning `None` if any unknown bit is set.
    pub const fn from_bits(bits: u32) -> Option<Self> {
        if bits & !Self::ALL != 0 {
            None
        } else {
            Some(CreateFlags(bits))
        }
    }

    /// Returns `true` if every bit in `other` is also set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for CreateFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        CreateFlags(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_bits() {
        assert_eq!(UpdateFlags::from_bits(0), Some(UpdateFlags::ANY));
        assert_eq!(UpdateFlags::from_bits(1), Some(UpdateFlags::NO_EXIST));
        assert_eq!(UpdateFlags::from_bits(2), Some(UpdateFlags::EXIST));
        assert_eq!(
            UpdateFlags::from_bits(3),
            Some(UpdateFlags::NO_EXIST | UpdateFlags::EXIST)
        );
        assert_eq!(UpdateFlags::from_bits(4), None);
        assert_eq!(UpdateFlags::from_bits(u64::MAX), None);
    }

    #[test]
    fn any_contains_nothing() {
        assert!(!UpdateFlags::ANY.contains(UpdateFlags::NO_EXIST));
        assert!(!UpdateFlags::ANY.contains(UpdateFlags::EXIST));
        assert!(UpdateFlags::EXIST.contains(UpdateFlags::ANY));
        assert_eq!(format!("{:?}", UpdateFlags::ANY), "ANY");
        assert_eq!(
            format!("{:?}", UpdateFlags::EXIST | UpdateFlags::NO_EXIST),
            "NO_EXIST | EXIST"
        );
    }

    #[test]
    fn create_bits() {
        assert_eq!(CreateFlags::from_bits(0), Some(CreateFlags::NONE));
        assert_eq!(CreateFlags::from_bits(1), Some(CreateFlags::NO_PREALLOC));
        assert_eq!(CreateFlags::from_bits(2), None);
        assert!(CreateFlags::NO_PREALLOC.contains(CreateFlags::NO_PREALLOC));
        assert!(!CreateFlags::NONE.contains(CreateFlags::NO_PREALLOC));
    }
}
