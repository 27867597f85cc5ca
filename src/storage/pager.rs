//! Pager: reads and writes 4096-byte pages of the database file and keeps a
//! simple in-memory cache. Pages are loaded lazily on first access and written
//! back only on flush; there is no eviction and no locking.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, info};

use super::btree::Node;
use crate::errors::Error;

/// Page size 4 kilobytes because it's the same size as a page used in the
/// virtual memory systems of most computer architectures.
pub const PAGE_SIZE: usize = 4096;

pub const TABLE_MAX_PAGES: usize = 100;

pub struct Pager {
    file: File,
    file_length: u64,
    num_pages: u32,
    pages: heapless::Vec<Option<Box<Node>>, TABLE_MAX_PAGES>,
}

impl Pager {
    /// Opens (or creates) the database file. The file length must be a whole
    /// number of pages; anything else means the file was not written by this
    /// program or was cut short.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let file_length = file.metadata()?.len();
        if file_length % PAGE_SIZE as u64 != 0 {
            return Err(err!(
                Corrupt,
                "File length {} is not a whole number of pages.",
                file_length
            ));
        }
        let num_pages = (file_length / PAGE_SIZE as u64) as u32;

        info!(path = %path.display(), num_pages, "Opened database file.");

        Ok(Pager {
            file,
            file_length,
            num_pages,
            pages: heapless::Vec::new(),
        })
    }

    /// Pages known to the pager: on-disk pages plus any allocated in memory.
    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    /// In a database with N pages, page numbers 0 through N-1 are allocated,
    /// so page number N is always free. There is no deletion, hence no free
    /// list to consult.
    pub fn get_unused_page_num(&self) -> u32 {
        self.num_pages
    }

    /// Returns the requested page, reading it from the file on first access.
    /// Asking for page number `num_pages` allocates a fresh zeroed page.
    pub fn page(&mut self, page_num: u32) -> Result<&mut Node, Error> {
        if page_num as usize >= TABLE_MAX_PAGES {
            if page_num == self.num_pages {
                return Err(Error::TableFull);
            }
            return Err(err!(
                OutOfRange,
                "Page number {} exceeds maximum pages {}.",
                page_num,
                TABLE_MAX_PAGES
            ));
        }

        while self.pages.len() <= page_num as usize {
            // Capacity is TABLE_MAX_PAGES and page_num was bounds-checked.
            let _ = self.pages.push(None);
        }

        let pages_on_disk = (self.file_length / PAGE_SIZE as u64) as u32;
        let slot = &mut self.pages[page_num as usize];
        if slot.is_none() {
            let mut node = Box::new(Node::new());
            if page_num < pages_on_disk {
                let offset = page_num as u64 * PAGE_SIZE as u64;
                self.file.seek(SeekFrom::Start(offset))?;
                self.file.read_exact(&mut node.data)?;
                debug!(page_num, "Loaded page from file.");
            } else {
                debug!(page_num, "Created new empty page.");
            }
            *slot = Some(node);
        }

        if page_num >= self.num_pages {
            self.num_pages = page_num + 1;
        }

        // Safe to unwrap: the slot was filled above if it was None.
        Ok(self.pages[page_num as usize].as_mut().unwrap())
    }

    /// Writes page `page_num` back to the file, all [`PAGE_SIZE`] bytes of it.
    /// Node headers and cells sit at arbitrary offsets within the page, so
    /// partial writes are never safe. Uncached pages have nothing to flush.
    pub fn flush(&mut self, page_num: u32) -> Result<(), Error> {
        if page_num as usize >= TABLE_MAX_PAGES {
            return Err(err!(
                OutOfRange,
                "Page number {} exceeds maximum pages {}.",
                page_num,
                TABLE_MAX_PAGES
            ));
        }

        let node = match self.pages.get(page_num as usize) {
            Some(Some(node)) => node,
            _ => return Ok(()),
        };

        let offset = page_num as u64 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&node.data)?;

        if offset + PAGE_SIZE as u64 > self.file_length {
            self.file_length = offset + PAGE_SIZE as u64;
        }
        Ok(())
    }

    /// Flushes every cached page. Called once when the table shuts down; a
    /// failure here is fatal to the caller because the file may now hold a
    /// half-written tree.
    pub fn flush_all(&mut self) -> Result<(), Error> {
        for page_num in 0..self.num_pages {
            self.flush(page_num)?;
        }
        self.file.sync_all()?;
        info!(num_pages = self.num_pages, "Flushed all pages.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn db_path(dir: &TempDir) -> std::path::PathBuf {
        dir.path().join("test.db")
    }

    #[test]
    fn open_creates_empty_file() {
        let dir = TempDir::new().unwrap();
        let pager = Pager::open(&db_path(&dir)).unwrap();
        assert_eq!(pager.num_pages(), 0);
        assert_eq!(pager.get_unused_page_num(), 0);
    }

    #[test]
    fn new_page_allocation_bumps_num_pages() {
        let dir = TempDir::new().unwrap();
        let mut pager = Pager::open(&db_path(&dir)).unwrap();
        pager.page(0).unwrap();
        assert_eq!(pager.num_pages(), 1);
        pager.page(1).unwrap();
        assert_eq!(pager.num_pages(), 2);
    }

    #[test]
    fn flushed_pages_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = db_path(&dir);
        {
            let mut pager = Pager::open(&path).unwrap();
            let node = pager.page(0).unwrap();
            node.data[0] = 0;
            node.data[100] = 0xAB;
            pager.flush_all().unwrap();
        }

        let mut pager = Pager::open(&path).unwrap();
        assert_eq!(pager.num_pages(), 1);
        let node = pager.page(0).unwrap();
        assert_eq!(node.data[100], 0xAB);
    }

    #[test]
    fn partial_page_file_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = db_path(&dir);
        fs::write(&path, vec![0u8; PAGE_SIZE + 17]).unwrap();
        assert!(matches!(Pager::open(&path), Err(Error::Corrupt(_))));
    }

    #[test]
    fn allocation_past_the_cap_is_table_full() {
        let dir = TempDir::new().unwrap();
        let mut pager = Pager::open(&db_path(&dir)).unwrap();
        for i in 0..TABLE_MAX_PAGES as u32 {
            pager.page(i).unwrap();
        }
        assert!(matches!(
            pager.page(TABLE_MAX_PAGES as u32),
            Err(Error::TableFull)
        ));
    }
}
