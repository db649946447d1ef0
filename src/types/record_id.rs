//! Record identifier type.

use crate::types::PageId;
use serde::Serialize;
use std::fmt;

/// Slot number within a data page
pub type SlotId = u16;

/// Address of one record slot: the page it lives on and its slot number.
///
/// A record keeps its identifier until it is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: SlotId,
}

impl RecordId {
    pub const fn new(page_id: PageId, slot: SlotId) -> Self {
        Self { page_id, slot }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.page_id, self.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_order_and_display() {
        let a = RecordId::new(PageId::new(1), 5);
        let b = RecordId::new(PageId::new(2), 0);
        assert!(a < b);
        assert_eq!(a.to_string(), "(1, 5)");
    }
}
