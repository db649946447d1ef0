//! Slot directory entries.

/// Size of one slot directory entry
pub const SLOT_SIZE: usize = 4;

/// A slot directory entry: where a record lives inside the page.
///
/// An offset of zero marks an empty slot, since record content never
/// starts inside the page header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub offset: u16,
    pub length: u16,
}

impl Slot {
    pub const EMPTY: Slot = Slot { offset: 0, length: 0 };

    pub fn is_empty(&self) -> bool {
        self.offset == 0
    }

    /// Byte range of the record within the page
    pub fn range(&self) -> std::ops::Range<usize> {
        let start = self.offset as usize;
        start..start + self.length as usize
    }

    pub fn read(bytes: &[u8]) -> Self {
        Self {
            offset: u16::from_be_bytes([bytes[0], bytes[1]]),
            length: u16::from_be_bytes([bytes[2], bytes[3]]),
        }
    }

    pub fn write(&self, bytes: &mut [u8]) {
        bytes[0..2].copy_from_slice(&self.offset.to_be_bytes());
        bytes[2..4].copy_from_slice(&self.length.to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_slot() {
        assert!(Slot::EMPTY.is_empty());
        assert!(!Slot { offset: 4000, length: 0 }.is_empty());
    }

    #[test]
    fn test_slot_encoding() {
        let slot = Slot { offset: 0x0F10, length: 0x0020 };
        let mut bytes = [0u8; SLOT_SIZE];
        slot.write(&mut bytes);
        assert_eq!(bytes, [0x0F, 0x10, 0x00, 0x20]);
        assert_eq!(Slot::read(&bytes).range(), 0x0F10..0x0F30);
    }
}
