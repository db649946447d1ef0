//! Filtered sequential scans over a heap file.

use crate::buffer::BufferPool;
use crate::error::{Result, StorageError};
use crate::heap::{Datatype, HeapFile, Operator, ScanFilter};
use crate::storage::FileManager;
use crate::types::{PageId, RecordId, SlotId};
use std::sync::Arc;

/// Scan position saved by `mark_scan`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScanMark {
    page_id: Option<PageId>,
    record: Option<RecordId>,
}

/// Outcome of scanning the rest of one page
enum PageScan {
    Found(SlotId),
    Exhausted(Option<PageId>),
}

/// Sequential scan returning the records that satisfy an optional filter
#[derive(Debug)]
pub struct HeapFileScan {
    file: HeapFile,
    filter: Option<ScanFilter>,
    mark: Option<ScanMark>,
}

impl HeapFileScan {
    /// Open `name` for scanning, positioned before its first record
    pub fn open(files: Arc<dyn FileManager>, pool: BufferPool, name: &str) -> Result<Self> {
        Ok(Self {
            file: HeapFile::open(files, pool, name)?,
            filter: None,
            mark: None,
        })
    }

    /// Set the filter from raw parameters; `None` scans every record
    pub fn start_scan(
        &mut self,
        offset: usize,
        length: usize,
        datatype: Datatype,
        filter: Option<&[u8]>,
        op: Operator,
    ) -> Result<()> {
        self.filter = match filter {
            Some(value) => Some(ScanFilter::new(offset, length, datatype, value, op)?),
            None => None,
        };
        Ok(())
    }

    /// Replace the filter with an already validated one
    pub fn set_filter(&mut self, filter: Option<ScanFilter>) {
        self.filter = filter;
    }

    pub fn filter(&self) -> Option<&ScanFilter> {
        self.filter.as_ref()
    }

    pub fn file(&self) -> &HeapFile {
        &self.file
    }

    pub fn record_count(&self) -> Result<u32> {
        self.file.record_count()
    }

    /// Unpin the current page and rewind to the start of the file
    pub fn end_scan(&mut self) -> Result<()> {
        let result = self.file.release_current();
        self.file.current_page_id = Some(self.file.first_page);
        self.file.current_record = None;
        result
    }

    /// Remember the current position
    pub fn mark_scan(&mut self) {
        self.mark = Some(ScanMark {
            page_id: self.file.current_page_id,
            record: self.file.current_record,
        });
    }

    /// Return to the position saved by the last `mark_scan`
    pub fn reset_scan(&mut self) -> Result<()> {
        let mark = self
            .mark
            .ok_or_else(|| StorageError::invalid_operation("reset_scan without mark_scan"))?;

        match mark.page_id {
            Some(page_id) => self.file.switch_to(page_id)?,
            None => self.file.current_page_id = None,
        }
        self.file.current_record = mark.record;
        Ok(())
    }

    /// Advance to the next matching record; `None` at end of file
    pub fn scan_next(&mut self) -> Result<Option<RecordId>> {
        let mut next_page = self.file.current_page_id;

        while let Some(page_id) = next_page {
            self.file.switch_to(page_id)?;

            let after = self
                .file
                .current_record
                .filter(|rid| rid.page_id == page_id)
                .map(|rid| rid.slot);
            let filter = self.filter.as_ref();

            let outcome = self.file.with_current_page(|page| {
                let mut slot = match after {
                    Some(after) => page.next_record(after),
                    None => page.first_record(),
                };
                while let Some(candidate) = slot {
                    let record = page.get_record(candidate)?;
                    if filter.map_or(true, |f| f.matches(record)) {
                        return Ok(PageScan::Found(candidate));
                    }
                    slot = page.next_record(candidate);
                }
                Ok(PageScan::Exhausted(page.next_page()))
            })?;

            match outcome {
                PageScan::Found(slot) => {
                    let rid = RecordId::new(page_id, slot);
                    self.file.current_record = Some(rid);
                    return Ok(Some(rid));
                }
                PageScan::Exhausted(next) => {
                    self.file.current_record = None;
                    next_page = next;
                }
            }
        }

        // Stay at end of file; the last page remains pinned until end_scan.
        self.file.current_page_id = None;
        Ok(None)
    }

    fn require_current(&self) -> Result<RecordId> {
        match self.file.current_record {
            Some(rid) if self.file.pinned_page_id() == Some(rid.page_id) => Ok(rid),
            _ => Err(StorageError::NoCurrentRecord),
        }
    }

    /// Copy of the current record
    pub fn get_record(&self) -> Result<Vec<u8>> {
        let rid = self.require_current()?;
        self.file
            .with_current_page(|page| Ok(page.get_record(rid.slot)?.to_vec()))
    }

    /// Copy of the record at `rid`; it becomes the current record
    pub fn get_record_at(&mut self, rid: RecordId) -> Result<Vec<u8>> {
        self.file.get_record(rid)
    }

    /// Update the current record in place, marking its page dirty
    pub fn modify_record(&mut self, f: impl FnOnce(&mut [u8])) -> Result<()> {
        let rid = self.require_current()?;
        self.file.with_current_page_mut(|page| {
            f(page.record_mut(rid.slot)?);
            Ok(())
        })
    }

    /// Delete the current record. The next `scan_next` resumes after it.
    pub fn delete_record(&mut self) -> Result<()> {
        let rid = self.require_current()?;
        self.file
            .with_current_page_mut(|page| page.delete_record(rid.slot))?;
        self.file.update_header(|header| {
            header.record_count = header.record_count.saturating_sub(1);
        })
    }

    /// Flag the current page as modified
    pub fn mark_dirty(&mut self) {
        if let Some(page) = self.file.current_page.as_mut() {
            page.mark_dirty();
        }
    }

    /// Whether `record` passes the scan's filter
    pub fn match_record(&self, record: &[u8]) -> bool {
        self.filter.as_ref().map_or(true, |f| f.matches(record))
    }

    /// End the scan and close the file
    pub fn close(mut self) -> Result<()> {
        let end = self.end_scan();
        let close = self.file.close();
        end.and(close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::{create_heap_file, InsertFileScan};
    use crate::storage::MemoryFileManager;

    fn setup(records: &[Vec<u8>]) -> (Arc<dyn FileManager>, BufferPool) {
        let files: Arc<dyn FileManager> = Arc::new(MemoryFileManager::new());
        let pool = BufferPool::new(8);
        create_heap_file(files.as_ref(), &pool, "t").unwrap();

        let mut insert = InsertFileScan::open(Arc::clone(&files), pool.clone(), "t").unwrap();
        for record in records {
            insert.insert_record(record).unwrap();
        }
        insert.close().unwrap();
        (files, pool)
    }

    fn int_records(values: impl IntoIterator<Item = i32>) -> Vec<Vec<u8>> {
        values.into_iter().map(|v| v.to_le_bytes().to_vec()).collect()
    }

    fn collect(scan: &mut HeapFileScan) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        while scan.scan_next().unwrap().is_some() {
            out.push(scan.get_record().unwrap());
        }
        out
    }

    #[test]
    fn test_full_scan_in_insertion_order() {
        let records = int_records(0..10);
        let (files, pool) = setup(&records);

        let mut scan = HeapFileScan::open(files, pool, "t").unwrap();
        scan.start_scan(0, 0, Datatype::Integer, None, Operator::Eq)
            .unwrap();
        assert_eq!(collect(&mut scan), records);
        assert_eq!(scan.scan_next().unwrap(), None);
        assert_eq!(scan.scan_next().unwrap(), None);
        scan.close().unwrap();
    }

    #[test]
    fn test_filtered_scan() {
        let (files, pool) = setup(&int_records(0..10));

        let mut scan = HeapFileScan::open(files, pool, "t").unwrap();
        scan.start_scan(0, 4, Datatype::Integer, Some(&5i32.to_le_bytes()), Operator::Gte)
            .unwrap();
        assert_eq!(collect(&mut scan), int_records(5..10));
    }

    #[test]
    fn test_bad_filter_is_rejected() {
        let (files, pool) = setup(&[]);
        let mut scan = HeapFileScan::open(files, pool, "t").unwrap();
        assert!(matches!(
            scan.start_scan(0, 3, Datatype::Integer, Some(&[0, 0, 0]), Operator::Eq),
            Err(StorageError::BadScanParameter(_))
        ));
    }

    #[test]
    fn test_empty_file() {
        let (files, pool) = setup(&[]);
        let mut scan = HeapFileScan::open(files, pool, "t").unwrap();
        assert_eq!(scan.scan_next().unwrap(), None);
        assert!(matches!(scan.get_record(), Err(StorageError::NoCurrentRecord)));
    }

    #[test]
    fn test_scan_crosses_pages() {
        let records: Vec<Vec<u8>> = (0..40u8).map(|i| vec![i; 500]).collect();
        let (files, pool) = setup(&records);

        let mut scan = HeapFileScan::open(files, pool, "t").unwrap();
        assert!(scan.file().header().unwrap().page_count > 1);
        assert_eq!(collect(&mut scan), records);
    }

    #[test]
    fn test_delete_during_scan() {
        let (files, pool) = setup(&int_records(0..10));

        let mut scan = HeapFileScan::open(Arc::clone(&files), pool.clone(), "t").unwrap();
        let mut seen = Vec::new();
        while scan.scan_next().unwrap().is_some() {
            let record = scan.get_record().unwrap();
            let value = i32::from_le_bytes([record[0], record[1], record[2], record[3]]);
            seen.push(value);
            if value % 2 == 0 {
                scan.delete_record().unwrap();
            }
        }
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
        assert_eq!(scan.record_count().unwrap(), 5);
        scan.close().unwrap();

        let mut scan = HeapFileScan::open(files, pool, "t").unwrap();
        assert_eq!(scan.record_count().unwrap(), 5);
        assert_eq!(collect(&mut scan), int_records([1, 3, 5, 7, 9]));
    }

    #[test]
    fn test_delete_without_current_record() {
        let (files, pool) = setup(&int_records(0..2));
        let mut scan = HeapFileScan::open(files, pool, "t").unwrap();
        assert!(matches!(
            scan.delete_record(),
            Err(StorageError::NoCurrentRecord)
        ));
    }

    #[test]
    fn test_mark_and_reset_across_pages() {
        let records: Vec<Vec<u8>> = (0..40u8).map(|i| vec![i; 500]).collect();
        let (files, pool) = setup(&records);

        let mut scan = HeapFileScan::open(files, pool, "t").unwrap();
        for _ in 0..3 {
            scan.scan_next().unwrap();
        }
        scan.mark_scan();
        let rest = collect(&mut scan);
        assert_eq!(rest, records[3..].to_vec());

        scan.reset_scan().unwrap();
        assert_eq!(collect(&mut scan), rest);
    }

    #[test]
    fn test_mark_at_end_of_file() {
        let (files, pool) = setup(&int_records(0..3));
        let mut scan = HeapFileScan::open(files, pool, "t").unwrap();
        collect(&mut scan);
        scan.mark_scan();
        scan.reset_scan().unwrap();
        assert_eq!(scan.scan_next().unwrap(), None);
    }

    #[test]
    fn test_reset_without_mark() {
        let (files, pool) = setup(&[]);
        let mut scan = HeapFileScan::open(files, pool, "t").unwrap();
        assert!(scan.reset_scan().is_err());
    }

    #[test]
    fn test_end_scan_rewinds() {
        let (files, pool) = setup(&int_records(0..4));
        let mut scan = HeapFileScan::open(files, pool.clone(), "t").unwrap();
        assert_eq!(collect(&mut scan).len(), 4);

        scan.end_scan().unwrap();
        assert_eq!(pool.pinned_count(), 1);
        assert_eq!(collect(&mut scan).len(), 4);
    }

    #[test]
    fn test_modify_record_persists() {
        let (files, pool) = setup(&int_records(0..3));

        let mut scan = HeapFileScan::open(Arc::clone(&files), pool.clone(), "t").unwrap();
        scan.scan_next().unwrap();
        scan.modify_record(|record| record.copy_from_slice(&42i32.to_le_bytes()))
            .unwrap();
        scan.close().unwrap();

        let mut scan = HeapFileScan::open(files, pool, "t").unwrap();
        assert_eq!(collect(&mut scan), int_records([42, 1, 2]));
    }

    #[test]
    fn test_match_record() {
        let (files, pool) = setup(&[]);
        let mut scan = HeapFileScan::open(files, pool, "t").unwrap();
        assert!(scan.match_record(b"anything"));

        scan.set_filter(Some(ScanFilter::string(0, 3, b"abc", Operator::Eq).unwrap()));
        assert!(scan.match_record(b"abc"));
        assert!(!scan.match_record(b"abd"));
        assert!(!scan.match_record(b"ab"));
    }

    #[test]
    fn test_close_releases_pins() {
        let (files, pool) = setup(&int_records(0..3));
        let mut scan = HeapFileScan::open(files, pool.clone(), "t").unwrap();
        scan.scan_next().unwrap();
        assert_eq!(pool.pinned_count(), 2);
        drop(scan);
        assert_eq!(pool.pinned_count(), 0);
    }

    #[test]
    fn test_integer_equality_filter() {
        let (files, pool) = setup(&int_records([1, 2, 3]));

        let mut scan = HeapFileScan::open(files, pool, "t").unwrap();
        scan.start_scan(0, 4, Datatype::Integer, Some(&2i32.to_le_bytes()), Operator::Eq)
            .unwrap();
        let first = scan.scan_next().unwrap().unwrap();
        assert_eq!(scan.get_record().unwrap(), 2i32.to_le_bytes());
        assert_eq!(first.slot, 1);
        assert_eq!(scan.scan_next().unwrap(), None);
    }

    #[test]
    fn test_float_filter_scan() {
        let records: Vec<Vec<u8>> = [0.5f32, 1.5, 2.5, -3.0]
            .iter()
            .map(|v| {
                let mut record = b"id".to_vec();
                record.extend_from_slice(&v.to_le_bytes());
                record
            })
            .collect();
        let (files, pool) = setup(&records);

        let mut scan = HeapFileScan::open(files, pool, "t").unwrap();
        scan.start_scan(2, 4, Datatype::Float, Some(&1.5f32.to_le_bytes()), Operator::Lte)
            .unwrap();
        assert_eq!(
            collect(&mut scan),
            vec![records[0].clone(), records[1].clone(), records[3].clone()]
        );
    }

    #[test]
    fn test_string_filter_scan() {
        let raw: [&[u8]; 4] = [b"apple\0\0\0", b"banana\0\0", b"cherry\0x", b"app"];
        let records: Vec<Vec<u8>> = raw.iter().map(|r| r.to_vec()).collect();
        let (files, pool) = setup(&records);

        let mut scan = HeapFileScan::open(files, pool, "t").unwrap();
        scan.start_scan(0, 8, Datatype::String, Some(b"banana"), Operator::Gte)
            .unwrap();
        assert_eq!(collect(&mut scan), vec![records[1].clone(), records[2].clone()]);

        scan.end_scan().unwrap();
        scan.start_scan(0, 8, Datatype::String, Some(b"apple"), Operator::Eq)
            .unwrap();
        assert_eq!(collect(&mut scan), vec![records[0].clone()]);
    }

    #[test]
    fn test_mark_then_reset_keeps_position() {
        let records: Vec<Vec<u8>> = (0..40u8).map(|i| vec![i; 500]).collect();
        let (files, pool) = setup(&records);

        let mut expected = HeapFileScan::open(Arc::clone(&files), pool.clone(), "t").unwrap();
        let mut scan = HeapFileScan::open(files, pool, "t").unwrap();
        loop {
            scan.mark_scan();
            scan.reset_scan().unwrap();
            let next = scan.scan_next().unwrap();
            assert_eq!(next, expected.scan_next().unwrap());
            if next.is_none() {
                break;
            }
        }
    }

    #[test]
    fn test_reset_after_end_scan_repins_marked_page() {
        let (files, pool) = setup(&int_records(0..3));
        let mut scan = HeapFileScan::open(files, pool, "t").unwrap();
        let rid = scan.scan_next().unwrap().unwrap();
        scan.mark_scan();

        scan.end_scan().unwrap();
        scan.reset_scan().unwrap();
        assert_eq!(scan.file().current_record_id(), Some(rid));
        assert_eq!(scan.get_record().unwrap(), 0i32.to_le_bytes());
        assert_eq!(scan.scan_next().unwrap().map(|r| r.slot), Some(1));
    }

    #[test]
    fn test_delete_and_insert_through_separate_handles() {
        let (files, pool) = setup(&int_records(0..3));

        let mut scan = HeapFileScan::open(Arc::clone(&files), pool.clone(), "t").unwrap();
        let mut insert = InsertFileScan::open(Arc::clone(&files), pool.clone(), "t").unwrap();
        scan.scan_next().unwrap();
        scan.delete_record().unwrap();
        insert.insert_record(&7i32.to_le_bytes()).unwrap();
        assert_eq!(scan.record_count().unwrap(), 3);
        assert_eq!(insert.record_count().unwrap(), 3);
        scan.close().unwrap();
        insert.close().unwrap();

        let mut scan = HeapFileScan::open(files, pool, "t").unwrap();
        let scanned = collect(&mut scan);
        assert_eq!(scanned.len(), 3);
        assert_eq!(scan.record_count().unwrap(), 3);
    }
}
