use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Which way a field's value may flow.
///
/// `READ` fields are loaded from the database into records, `WRITE` fields are
/// sent from records to the database. The empty set means unrestricted.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Direction(u8);

impl Direction {
    pub const UNRESTRICTED: Direction = Direction(0);
    pub const READ: Direction = Direction(0b01);
    pub const WRITE: Direction = Direction(0b10);
    pub const BOTH: Direction = Direction(0b11);

    #[must_use]
    pub fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn contains(self, other: Direction) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub fn is_unrestricted(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub fn allows_read(self) -> bool {
        self.is_unrestricted() || self.contains(Direction::READ)
    }

    #[must_use]
    pub fn allows_write(self) -> bool {
        self.is_unrestricted() || self.contains(Direction::WRITE)
    }
}

impl BitOr for Direction {
    type Output = Direction;

    fn bitor(self, rhs: Direction) -> Direction {
        Direction(self.0 | rhs.0)
    }
}

impl BitOrAssign for Direction {
    fn bitor_assign(&mut self, rhs: Direction) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.0 {
            0 => "Unrestricted",
            0b01 => "Read",
            0b10 => "Write",
            _ => "ReadWrite",
        };
        f.write_str(name)
    }
}

/// Whether a member is part of the record type's public surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    NonPublic,
}
