//! Engine memory as seen by the cheat engine

/// Address space a patch targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressSpace {
    /// Work RAM / main system bus
    Main,
    /// Cartridge ROM as seen by the CPU (read intercepts such as Game Genie)
    Rom,
}

/// Access width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    U8,
    U16,
    U32,
}

impl Width {
    pub fn bytes(&self) -> usize {
        match self {
            Width::U8 => 1,
            Width::U16 => 2,
            Width::U32 => 4,
        }
    }

    pub fn mask(&self) -> u32 {
        match self {
            Width::U8 => 0xFF,
            Width::U16 => 0xFFFF,
            Width::U32 => 0xFFFF_FFFF,
        }
    }

    /// Narrowest width holding a value written with `digits` hex digits
    pub fn for_hex_digits(digits: usize) -> Option<Width> {
        match digits {
            1..=2 => Some(Width::U8),
            3..=4 => Some(Width::U16),
            5..=8 => Some(Width::U32),
            _ => None,
        }
    }
}

/// Patchable view of an engine's memory, implemented by engine adapters.
///
/// Multi-byte accesses use the engine's native byte order.
pub trait MemoryView {
    /// Read `width` bytes at `address`; `None` if unmapped
    fn read(&self, space: AddressSpace, address: u32, width: Width) -> Option<u32>;

    /// Write `width` bytes at `address`; `false` if unmapped or read-only
    fn write(&mut self, space: AddressSpace, address: u32, width: Width, value: u32) -> bool;
}
