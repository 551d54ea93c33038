/// Container abstraction shared by filesystems and archives

/// In-memory archives
pub mod archive;
/// Format-neutral file attributes
pub mod attribs;
/// Host directory container
pub mod hostdir;
/// In-memory filesystem volumes
pub mod memfs;
/// Filesystem format profiles
pub mod profile;

pub use archive::{ArchiveKind, MemArchive};
pub use attribs::FileAttribs;
pub use hostdir::HostDir;
pub use memfs::MemFileSystem;
pub use profile::FsProfile;

use crate::error::{DiskArcError, Result};
use std::io::{Read, Write};

/// Opaque handle to an entry inside a container.
///
/// Handles are only meaningful for the container that issued them. Every
/// container reserves [`EntryId::ROOT`] for its top-level directory (for
/// archives, the implicit list of records).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub usize);

impl EntryId {
    /// Volume directory of a filesystem, or the record list of an archive
    pub const ROOT: EntryId = EntryId(0);
}

/// One byte stream of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilePart {
    /// Data fork
    DataFork,
    /// Resource fork
    RsrcFork,
    /// Data fork without format-aware conversion (e.g. DOS text cooking)
    RawData,
    /// Whole entry is a disk image
    DiskImage,
    /// No specific part (directories)
    Unknown,
}

impl FilePart {
    /// True for the parts that occupy a file's data fork slot
    pub fn is_data_like(&self) -> bool {
        matches!(
            self,
            FilePart::DataFork | FilePart::RawData | FilePart::DiskImage
        )
    }
}

impl std::fmt::Display for FilePart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilePart::DataFork => write!(f, "data"),
            FilePart::RsrcFork => write!(f, "rsrc"),
            FilePart::RawData => write!(f, "raw"),
            FilePart::DiskImage => write!(f, "disk image"),
            FilePart::Unknown => write!(f, "-"),
        }
    }
}

/// Shape of a newly created entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// Plain file with a data fork
    File,
    /// File with data and resource forks
    Extended,
    /// Directory
    Directory,
}

/// Broad family of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// Disk image filesystem
    FileSystem,
    /// File archive; records carry their whole partial path
    Archive,
    /// Directory on the host system
    Host,
}

/// Capability flags of a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Characteristics {
    /// Format name
    pub name: &'static str,
    /// Container family
    pub kind: ContainerKind,
    /// Files may have a resource fork
    pub has_resource_forks: bool,
    /// Directories can be nested
    pub is_hierarchical: bool,
    /// ProDOS file/aux types are stored
    pub has_prodos_types: bool,
    /// HFS file type/creator are stored
    pub has_hfs_types: bool,
    /// Data can be accessed raw, bypassing conversion
    pub has_raw_mode: bool,
    /// Names compare case-sensitively
    pub case_sensitive: bool,
    /// Pathname separator
    pub dir_sep: char,
    /// ZIP-style archive, eligible for `__MACOSX` AppleDouble records
    pub zip_like: bool,
}

/// Snapshot of an entry's metadata
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Handle for this entry
    pub id: EntryId,
    /// Entry attributes (full path relative to the container root)
    pub attribs: FileAttribs,
    /// Entry has a data fork
    pub has_data_fork: bool,
    /// Entry has a resource fork
    pub has_rsrc_fork: bool,
    /// Entry holds a disk image
    pub is_disk_image: bool,
    /// Structure looks suspicious
    pub is_dubious: bool,
    /// Structure is known to be damaged
    pub is_damaged: bool,
}

impl FileEntry {
    /// Entry name without its directory
    pub fn name(&self) -> &str {
        self.attribs.file_name_only()
    }

    /// Full pathname within the container
    pub fn full_path(&self) -> &str {
        &self.attribs.full_path_name
    }

    /// Directory flag
    pub fn is_directory(&self) -> bool {
        self.attribs.is_directory
    }
}

/// A disk image filesystem, a file archive or a host directory.
///
/// Fork streams borrow the container, so at most one stream is open at a time
/// and it is released when dropped.
pub trait Container {
    /// Capability flags
    fn characteristics(&self) -> &Characteristics;

    /// True if the container must not be modified
    fn is_read_only(&self) -> bool;

    /// True if damage was detected while scanning the container
    fn is_dubious(&self) -> bool;

    /// Snapshot of an entry's metadata
    fn entry(&self, id: EntryId) -> Result<FileEntry>;

    /// Entries directly inside a directory, in storage order
    fn children(&self, dir: EntryId) -> Result<Vec<EntryId>>;

    /// Find an entry by name inside a directory, honoring the container's case rules
    fn find_child(&self, dir: EntryId, name: &str) -> Option<EntryId>;

    /// Create an entry. The file type is applied immediately because some
    /// formats change how data is written based on it.
    fn create_entry(
        &mut self,
        dir: EntryId,
        name: &str,
        mode: CreateMode,
        file_type: u8,
    ) -> Result<EntryId>;

    /// Open one part of an entry for reading
    fn open_read(&self, id: EntryId, part: FilePart) -> Result<Box<dyn Read + '_>>;

    /// Open one part of an entry for writing, discarding its previous contents
    fn open_write(&mut self, id: EntryId, part: FilePart) -> Result<Box<dyn Write + '_>>;

    /// Remove an entry
    fn delete_entry(&mut self, id: EntryId) -> Result<()>;

    /// Copy name, types, dates and access flags onto an entry and commit them
    fn commit_attribs(&mut self, id: EntryId, attribs: &FileAttribs) -> Result<()>;

    /// Convert a name into one that is legal for this container
    fn adjust_name(&self, name: &str) -> String;
}

/// Create the directories named by `path` below `base`, reusing any that exist.
///
/// Returns the innermost directory. An empty path yields `base`.
pub fn create_subdirectories(
    container: &mut dyn Container,
    base: EntryId,
    path: &str,
    sep: char,
) -> Result<EntryId> {
    let mut dir = base;
    for component in attribs::split_path(path, sep) {
        let name = container.adjust_name(component);
        dir = match container.find_child(dir, &name) {
            Some(existing) => {
                let entry = container.entry(existing)?;
                if !entry.is_directory() {
                    return Err(DiskArcError::NotADirectory(entry.full_path().to_string()));
                }
                existing
            }
            None => {
                tracing::debug!("creating directory '{}'", name);
                container.create_entry(dir, &name, CreateMode::Directory, 0)?
            }
        };
    }
    Ok(dir)
}

/// List every entry below `dir` in pre-order (a directory precedes its contents)
pub fn walk_entries(container: &dyn Container, dir: EntryId) -> Result<Vec<EntryId>> {
    let mut list = Vec::new();
    walk_into(container, dir, &mut list)?;
    Ok(list)
}

fn walk_into(container: &dyn Container, dir: EntryId, list: &mut Vec<EntryId>) -> Result<()> {
    for child in container.children(dir)? {
        list.push(child);
        if container.entry(child)?.is_directory() {
            walk_into(container, child, list)?;
        }
    }
    Ok(())
}

/// Find an entry by its full pathname, starting at the root
pub fn find_by_path(container: &dyn Container, path: &str, sep: char) -> Result<EntryId> {
    let mut cur = EntryId::ROOT;
    if container.characteristics().kind == ContainerKind::Archive {
        let archive_sep = container.characteristics().dir_sep.to_string();
        let name = attribs::split_path(path, sep).join(&archive_sep);
        return container
            .find_child(cur, &name)
            .ok_or_else(|| DiskArcError::FileNotFound(path.to_string()));
    }
    for component in attribs::split_path(path, sep) {
        cur = container
            .find_child(cur, component)
            .ok_or_else(|| DiskArcError::FileNotFound(path.to_string()))?;
    }
    Ok(cur)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_subdirectories_idempotent() {
        let mut fs = MemFileSystem::new(FsProfile::ProDos, "TEST");
        let first = create_subdirectories(&mut fs, EntryId::ROOT, "subdir1/subdir2", '/').unwrap();
        let second = create_subdirectories(&mut fs, EntryId::ROOT, "subdir1/subdir2", '/').unwrap();
        assert_eq!(first, second);

        let top = fs.children(EntryId::ROOT).unwrap();
        assert_eq!(top.len(), 1);
        let inner = fs.children(top[0]).unwrap();
        assert_eq!(inner.len(), 1);
        assert_eq!(inner[0], first);
    }

    #[test]
    fn test_create_subdirectories_blocked_by_file() {
        let mut fs = MemFileSystem::new(FsProfile::ProDos, "TEST");
        fs.create_entry(EntryId::ROOT, "SUBDIR1", CreateMode::File, 0)
            .unwrap();
        let result = create_subdirectories(&mut fs, EntryId::ROOT, "SUBDIR1/X", '/');
        assert!(matches!(result, Err(DiskArcError::NotADirectory(_))));
    }

    #[test]
    fn test_walk_entries_preorder() {
        let mut fs = MemFileSystem::new(FsProfile::ProDos, "TEST");
        let a = fs.create_entry(EntryId::ROOT, "A", CreateMode::File, 0).unwrap();
        let dir = create_subdirectories(&mut fs, EntryId::ROOT, "D", '/').unwrap();
        let b = fs.create_entry(dir, "B", CreateMode::File, 0).unwrap();
        let c = fs.create_entry(EntryId::ROOT, "C", CreateMode::File, 0).unwrap();

        assert_eq!(walk_entries(&fs, EntryId::ROOT).unwrap(), vec![a, dir, b, c]);
        assert_eq!(find_by_path(&fs, "d/b", '/').unwrap(), b);
    }

    #[test]
    fn test_file_part_data_like() {
        assert!(FilePart::RawData.is_data_like());
        assert!(FilePart::DiskImage.is_data_like());
        assert!(!FilePart::RsrcFork.is_data_like());
        assert!(!FilePart::Unknown.is_data_like());
    }
}
