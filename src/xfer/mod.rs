/// Cross-container file transfer
///
/// A transfer runs in two steps. [`build`] turns a list of source entries into
/// a [`TransferEntrySet`], one [`TransferEntry`] per fork, and
/// [`TransferWorker::transfer`] writes a sequence of those entries into a
/// destination container, pulling bytes from a [`StreamGenerator`] and asking
/// a [`TransferHandler`] how to resolve name collisions.

/// Transfer entry set builder
pub mod builder;
/// Progress and conflict callbacks
pub mod callback;
/// Byte sources for transfer entries
pub mod source;
/// Transfer worker
pub mod worker;

pub use builder::build;
pub use callback::{CallbackFacts, CallbackResult, FixedResolution, TransferHandler};
pub use source::{ContainerStreamSource, StreamGenerator};
pub use worker::{TransferOutcome, TransferWorker};

use crate::container::{EntryId, FileAttribs, FilePart};

/// How type metadata and resource forks are kept on a foreign destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreserveMode {
    /// Drop them
    #[default]
    None,
    /// Encode them in a NAPS filename suffix; resource forks become separate files
    Naps,
    /// Hand them to the destination as-is (extended attributes on hosts that
    /// support them)
    Host,
}

/// Options shared by the builder and the worker of one transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferOptions {
    /// Metadata preservation for foreign destinations
    pub preserve: PreserveMode,
    /// Read data forks without format-aware conversion
    pub raw_mode: bool,
    /// Flatten the hierarchy
    pub strip_paths: bool,
    /// Use `__MACOSX` AppleDouble records in ZIP archives
    pub mac_zip: bool,
}

impl TransferOptions {
    /// Set the preservation mode
    pub fn preserve(mut self, preserve: PreserveMode) -> Self {
        self.preserve = preserve;
        self
    }

    /// Enable or disable raw mode
    pub fn raw_mode(mut self, raw_mode: bool) -> Self {
        self.raw_mode = raw_mode;
        self
    }

    /// Enable or disable path stripping
    pub fn strip_paths(mut self, strip_paths: bool) -> Self {
        self.strip_paths = strip_paths;
        self
    }

    /// Enable or disable MacZip handling
    pub fn mac_zip(mut self, mac_zip: bool) -> Self {
        self.mac_zip = mac_zip;
        self
    }
}

/// Where the bytes of a transfer entry come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRef {
    /// A fork of a source entry
    Entry(EntryId),
    /// The resource fork held in an AppleDouble shadow record
    AppleDouble(EntryId),
    /// The data fork of another entry, used as a resource fork (NAPS `r` files)
    DataForkOf(EntryId),
    /// Nothing to read (synthesized directories)
    None,
}

/// One fork of one file in a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEntry {
    /// Attributes of the source file
    pub attribs: FileAttribs,
    /// Part read from the source
    pub part: FilePart,
    /// Part written at the destination
    pub store_part: FilePart,
    /// Pathname at the destination, before name adjustment
    pub extract_path: String,
    /// Separator used in `extract_path`
    pub extract_sep: char,
    /// Expected number of bytes, or -1 if unknown
    pub output_length: i64,
    /// Key shared by the forks of one logical file
    pub file_id: usize,
    /// Origin of the bytes
    pub source: SourceRef,
}

impl TransferEntry {
    /// True if `next` is the resource fork belonging to this entry
    pub fn pairs_with(&self, next: &TransferEntry) -> bool {
        self.store_part != FilePart::RsrcFork
            && next.store_part == FilePart::RsrcFork
            && self.file_id == next.file_id
            && self.attribs.full_path_name == next.attribs.full_path_name
    }
}

/// Transfer entries for one build, in two views
#[derive(Debug, Clone, Default)]
pub struct TransferEntrySet {
    pub(crate) direct: Vec<TransferEntry>,
    pub(crate) foreign: Vec<TransferEntry>,
}

impl TransferEntrySet {
    /// Entries for a destination that stores types and forks natively
    pub fn direct_entries(&self) -> &[TransferEntry] {
        &self.direct
    }

    /// Entries for a destination without type or fork support, with paths
    /// encoded according to the preservation mode
    pub fn foreign_entries(&self) -> &[TransferEntry] {
        &self.foreign
    }

    /// True if nothing was selected
    pub fn is_empty(&self) -> bool {
        self.direct.is_empty()
    }
}
