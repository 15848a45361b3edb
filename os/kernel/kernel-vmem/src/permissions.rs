//! # Access Permissions
//!
//! The AP/APX permission compositions shared by section PDEs and page PTEs.
//! The AP field alone grades *user* access while the kernel always has
//! read-write; the APX bit turns each composition into its read-only
//! counterpart.

/// The two-bit AP access-permission field.
///
/// The encodings this core uses (with APX clear):
///
/// | AP | Kernel | User |
/// |----|--------|------|
/// | `0b00` | none | none |
/// | `0b01` | RW | none |
/// | `0b10` | RW | R |
/// | `0b11` | RW | RW |
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AccessPermissions {
    /// No access at any privilege level.
    NoAccess = 0b00,
    /// Kernel read-write, no user access.
    KernelOnly = 0b01,
    /// Kernel read-write, user read.
    UserRead = 0b10,
    /// Kernel read-write, user read-write.
    UserReadWrite = 0b11,
}

impl AccessPermissions {
    /// Decode a raw two-bit AP field.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b01 => Self::KernelOnly,
            0b10 => Self::UserRead,
            0b11 => Self::UserReadWrite,
            _ => Self::NoAccess,
        }
    }

    /// The raw two-bit AP field.
    #[inline]
    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }
}

/// A full permission composition: the AP grade plus the APX read-only bit.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PagePermissions {
    /// User-access grade.
    pub access: AccessPermissions,
    /// APX: turn the composition read-only (for the kernel too).
    pub read_only: bool,
}

impl PagePermissions {
    /// No access at any privilege level.
    pub const NONE: Self = Self::new(AccessPermissions::NoAccess);

    /// Kernel read-write, invisible to user mode.
    pub const KERNEL: Self = Self::new(AccessPermissions::KernelOnly);

    /// Kernel read-write, user read.
    pub const USER_READ: Self = Self::new(AccessPermissions::UserRead);

    /// Kernel read-write, user read-write.
    pub const USER_READ_WRITE: Self = Self::new(AccessPermissions::UserReadWrite);

    #[inline]
    #[must_use]
    pub const fn new(access: AccessPermissions) -> Self {
        Self {
            access,
            read_only: false,
        }
    }

    /// The same composition with the APX bit as given.
    #[inline]
    #[must_use]
    pub const fn with_read_only(self, read_only: bool) -> Self {
        Self {
            access: self.access,
            read_only,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ap_bits_round_trip() {
        for ap in [
            AccessPermissions::NoAccess,
            AccessPermissions::KernelOnly,
            AccessPermissions::UserRead,
            AccessPermissions::UserReadWrite,
        ] {
            assert_eq!(AccessPermissions::from_bits(ap.into_bits()), ap);
        }
    }
}
