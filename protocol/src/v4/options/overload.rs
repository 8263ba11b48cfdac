//! DHCP option overload module.

/// The `overload` option tells which fixed BOOTP fields carry extra options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overload {
    Undefined = 0,
    File,
    Sname,
    Both,
}

impl From<u8> for Overload {
    fn from(value: u8) -> Self {
        use self::Overload::*;
        match value {
            1 => File,
            2 => Sname,
            3 => Both,

            _ => Undefined,
        }
    }
}
