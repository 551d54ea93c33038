/*!
# diskarc

A Rust library for moving files between legacy disk images and file archives.

## Features

- One [`Container`] trait over filesystems (ProDOS, HFS, DOS 3.3, Pascal, CP/M),
  archives (NuFX, ZIP) and host directories
- Transfers that pair data and resource forks, create directories on demand,
  adjust names for the destination and resolve name collisions through a
  handler
- NAPS filename suffixes (`NAME#0612cd`) to keep file types on foreign
  destinations, decoded again when importing from a host directory
- Resource forks and file types in host extended attributes, where the
  platform has them
- MacZip `__MACOSX` AppleDouble records for resource forks in ZIP archives
- Failed copies leave no partial file behind

## Quick Start

```rust,no_run
use diskarc::xfer::{
    build, CallbackResult, ContainerStreamSource, FixedResolution, TransferOptions,
    TransferWorker,
};
use diskarc::{walk_entries, EntryId, FsProfile, MemFileSystem};

// Source volume with a few files, and an empty destination
let source = diskarc::sample::sample_volume(FsProfile::ProDos)?;
let mut dest = MemFileSystem::new(FsProfile::Hfs, "Backup");

// Describe what to copy
let options = TransferOptions::default();
let entries = walk_entries(&source, EntryId::ROOT)?;
let set = build(&source, &entries, None, &options);

// Copy it, skipping files that already exist
let mut handler = FixedResolution(CallbackResult::Skip);
let mut streams = ContainerStreamSource::new(&source);
let outcome = TransferWorker::new(options, &mut handler, &mut streams)
    .transfer(&mut dest, None, set.direct_entries())?;
assert!(!outcome.is_cancelled());
# Ok::<(), diskarc::DiskArcError>(())
```

## Modules

- `container`: Container trait, entry attributes and the in-memory/host containers
- `xfer`: Transfer entry builder, worker and callback protocol
- `naps`: NAPS filename suffix codec
- `appledouble`: AppleDouble records for MacZip
- `sample`: Sample file set
- `error`: Error types and Result alias
*/

#![warn(missing_docs)]

/// AppleDouble records for MacZip
pub mod appledouble;
/// Container trait, entry attributes and concrete containers
pub mod container;
/// Error types and Result alias
pub mod error;
/// NAPS filename suffix codec
pub mod naps;
/// Sample file set
pub mod sample;
/// Cross-container file transfer
pub mod xfer;

// Re-export common types
pub use container::{
    create_subdirectories, find_by_path, walk_entries, ArchiveKind, Characteristics, Container,
    ContainerKind, CreateMode, EntryId, FileAttribs, FileEntry, FilePart, FsProfile, HostDir,
    MemArchive, MemFileSystem,
};
pub use error::{DiskArcError, Result};
pub use xfer::{
    build, CallbackFacts, CallbackResult, ContainerStreamSource, FixedResolution, PreserveMode,
    StreamGenerator, TransferEntry, TransferEntrySet, TransferHandler, TransferOptions,
    TransferOutcome, TransferWorker,
};
