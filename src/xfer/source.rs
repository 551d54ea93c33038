/// Byte sources for transfer entries

use crate::appledouble::AppleDouble;
use crate::container::{Container, FilePart};
use crate::error::Result;
use crate::xfer::{SourceRef, TransferEntry};
use std::io::{Cursor, Read};

/// Opens the byte stream for one transfer entry.
///
/// Returning `None` means the source is unavailable; the worker treats that
/// as an I/O failure. The stream is fully read and dropped before the next
/// one is requested.
pub trait StreamGenerator {
    /// Open the stream for an entry
    fn open_stream(&mut self, entry: &TransferEntry) -> Option<Box<dyn Read + '_>>;
}

impl<F> StreamGenerator for F
where
    F: FnMut(&TransferEntry) -> Option<Box<dyn Read>>,
{
    fn open_stream(&mut self, entry: &TransferEntry) -> Option<Box<dyn Read + '_>> {
        self(entry)
    }
}

/// Reads transfer entries from the container they were built from
pub struct ContainerStreamSource<'a> {
    source: &'a dyn Container,
}

impl<'a> ContainerStreamSource<'a> {
    /// Read from `source`
    pub fn new(source: &'a dyn Container) -> Self {
        Self { source }
    }

    fn open(&self, entry: &TransferEntry) -> Result<Option<Box<dyn Read + 'a>>> {
        match entry.source {
            SourceRef::Entry(id) => Ok(Some(self.source.open_read(id, entry.part)?)),
            SourceRef::AppleDouble(id) => {
                let mut raw = Vec::new();
                self.source
                    .open_read(id, FilePart::DataFork)?
                    .read_to_end(&mut raw)?;
                let header = AppleDouble::decode(&raw)?;
                Ok(Some(Box::new(Cursor::new(header.rsrc_fork))))
            }
            SourceRef::DataForkOf(id) => Ok(Some(self.source.open_read(id, FilePart::DataFork)?)),
            SourceRef::None => Ok(None),
        }
    }
}

impl StreamGenerator for ContainerStreamSource<'_> {
    fn open_stream(&mut self, entry: &TransferEntry) -> Option<Box<dyn Read + '_>> {
        match self.open(entry) {
            Ok(stream) => stream,
            Err(err) => {
                tracing::warn!(
                    "cannot open {} fork of '{}': {}",
                    entry.part,
                    entry.attribs.full_path_name,
                    err
                );
                None
            }
        }
    }
}
