use thiserror::Error;

use super::types::PageId;

/// Storage engine error types
#[derive(Error, Debug)]
pub enum ArborError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Buffer pool is full, no evictable frames available")]
    NoFreeFrame,

    #[error("Page {0} is still pinned")]
    PagePinned(PageId),

    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),

    #[error("Disk scheduler error: {0}")]
    Scheduler(String),

    #[error("Corrupted page: {0}")]
    Corrupted(String),

    #[error("Iterator dereferenced at end")]
    IteratorAtEnd,

    #[error("Index name too long: {0}")]
    IndexNameTooLong(String),
}

pub type Result<T> = std::result::Result<T, ArborError>;
