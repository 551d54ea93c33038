/// In-memory filesystem volume
///
/// Holds a directory tree with data and resource forks in memory, applying the
/// naming rules and capabilities of an [`FsProfile`]. Block allocation is not
/// modelled; an optional byte capacity stands in for free space.

use crate::container::attribs::{FileAttribs, TYPE_TXT};
use crate::container::{
    Characteristics, Container, CreateMode, EntryId, FileEntry, FilePart, FsProfile,
};
use crate::error::{DiskArcError, Result};
use std::io::{self, Cursor, Read, Write};

#[derive(Debug, Clone)]
struct Node {
    parent: Option<EntryId>,
    name: String,
    attribs: FileAttribs,
    data: Option<Vec<u8>>,
    rsrc: Option<Vec<u8>>,
    children: Vec<EntryId>,
    damaged: bool,
}

/// Filesystem volume held in memory
#[derive(Debug, Clone)]
pub struct MemFileSystem {
    profile: FsProfile,
    chars: Characteristics,
    nodes: Vec<Option<Node>>,
    capacity: Option<u64>,
    used: u64,
    read_only: bool,
    dubious: bool,
}

impl MemFileSystem {
    /// Create an empty volume
    pub fn new(profile: FsProfile, volume_name: &str) -> Self {
        let chars = profile.characteristics();
        let root = Node {
            parent: None,
            name: volume_name.to_string(),
            attribs: FileAttribs::directory("", chars.dir_sep),
            data: None,
            rsrc: None,
            children: Vec::new(),
            damaged: false,
        };
        Self {
            profile,
            chars,
            nodes: vec![Some(root)],
            capacity: None,
            used: 0,
            read_only: false,
            dubious: false,
        }
    }

    /// Limit the number of fork bytes the volume can hold
    pub fn with_capacity(mut self, bytes: u64) -> Self {
        self.capacity = Some(bytes);
        self
    }

    /// Format profile of this volume
    pub fn profile(&self) -> FsProfile {
        self.profile
    }

    /// Volume name
    pub fn volume_name(&self) -> &str {
        self.nodes[0].as_ref().map(|n| n.name.as_str()).unwrap_or("")
    }

    /// Fork bytes currently stored
    pub fn used_bytes(&self) -> u64 {
        self.used
    }

    /// Allow or forbid modification
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Flag the volume as damaged; it becomes read-only
    pub fn mark_dubious(&mut self) {
        self.dubious = true;
        self.read_only = true;
    }

    /// Flag a single entry as damaged
    pub fn mark_damaged(&mut self, id: EntryId) -> Result<()> {
        self.node_mut(id)?.damaged = true;
        Ok(())
    }

    fn node(&self, id: EntryId) -> Result<&Node> {
        self.nodes
            .get(id.0)
            .and_then(|n| n.as_ref())
            .ok_or(DiskArcError::InvalidEntry(id.0))
    }

    fn node_mut(&mut self, id: EntryId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .and_then(|n| n.as_mut())
            .ok_or(DiskArcError::InvalidEntry(id.0))
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(DiskArcError::ReadOnly {
                damaged: self.dubious,
            });
        }
        Ok(())
    }

    fn full_path(&self, id: EntryId) -> Result<String> {
        let mut names = Vec::new();
        let mut cur = self.node(id)?;
        while let Some(parent) = cur.parent {
            names.push(cur.name.as_str());
            cur = self.node(parent)?;
        }
        names.reverse();
        Ok(names.join(&self.chars.dir_sep.to_string()))
    }

    /// DOS 3.3 stores text in high ASCII unless accessed raw
    fn is_cooked(&self, node: &Node, part: FilePart) -> bool {
        self.profile == FsProfile::Dos33
            && part == FilePart::DataFork
            && node.attribs.file_type == TYPE_TXT
    }
}

impl Container for MemFileSystem {
    fn characteristics(&self) -> &Characteristics {
        &self.chars
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn is_dubious(&self) -> bool {
        self.dubious
    }

    fn entry(&self, id: EntryId) -> Result<FileEntry> {
        let node = self.node(id)?;
        let mut attribs = node.attribs.clone();
        attribs.full_path_name = self.full_path(id)?;
        attribs.set_fork_lengths(
            node.data.as_ref().map(|d| d.len() as u64),
            node.rsrc.as_ref().map(|r| r.len() as u64),
        );
        Ok(FileEntry {
            id,
            attribs,
            has_data_fork: node.data.is_some(),
            has_rsrc_fork: node.rsrc.is_some(),
            is_disk_image: false,
            is_dubious: false,
            is_damaged: node.damaged,
        })
    }

    fn children(&self, dir: EntryId) -> Result<Vec<EntryId>> {
        let node = self.node(dir)?;
        if !node.attribs.is_directory {
            return Err(DiskArcError::NotADirectory(node.name.clone()));
        }
        Ok(node.children.clone())
    }

    fn find_child(&self, dir: EntryId, name: &str) -> Option<EntryId> {
        let node = self.node(dir).ok()?;
        node.children.iter().copied().find(|child| {
            self.node(*child)
                .map(|c| self.profile.names_equal(&c.name, name))
                .unwrap_or(false)
        })
    }

    fn create_entry(
        &mut self,
        dir: EntryId,
        name: &str,
        mode: CreateMode,
        file_type: u8,
    ) -> Result<EntryId> {
        self.check_writable()?;
        let parent = self.node(dir)?;
        if !parent.attribs.is_directory {
            return Err(DiskArcError::NotADirectory(parent.name.clone()));
        }
        if !self.chars.is_hierarchical && (dir != EntryId::ROOT || mode == CreateMode::Directory) {
            return Err(DiskArcError::unsupported(format!(
                "{} volumes have no subdirectories",
                self.chars.name
            )));
        }
        if mode == CreateMode::Extended && !self.chars.has_resource_forks {
            return Err(DiskArcError::unsupported(format!(
                "{} files have no resource fork",
                self.chars.name
            )));
        }
        if name.is_empty() || self.profile.adjust_name(name) != name {
            return Err(DiskArcError::InvalidFilename(name.to_string()));
        }
        if self.find_child(dir, name).is_some() {
            return Err(DiskArcError::container(format!("'{}' already exists", name)));
        }

        let sep = self.chars.dir_sep;
        let attribs = match mode {
            CreateMode::Directory => FileAttribs::directory(name, sep),
            _ => FileAttribs::file(name, sep).with_prodos_types(file_type, 0),
        };
        let node = Node {
            parent: Some(dir),
            name: name.to_string(),
            attribs,
            data: (mode != CreateMode::Directory).then(Vec::new),
            rsrc: (mode == CreateMode::Extended).then(Vec::new),
            children: Vec::new(),
            damaged: false,
        };

        let id = EntryId(self.nodes.len());
        self.nodes.push(Some(node));
        self.node_mut(dir)?.children.push(id);
        Ok(id)
    }

    fn open_read(&self, id: EntryId, part: FilePart) -> Result<Box<dyn Read + '_>> {
        let node = self.node(id)?;
        if node.attribs.is_directory {
            return Err(DiskArcError::unsupported("directories have no forks"));
        }
        let fork = match part {
            FilePart::DataFork | FilePart::RawData | FilePart::DiskImage => node.data.as_ref(),
            FilePart::RsrcFork => node.rsrc.as_ref(),
            FilePart::Unknown => None,
        };
        let fork = fork.ok_or_else(|| {
            DiskArcError::FileNotFound(format!("{} ({} fork)", node.name, part))
        })?;

        if self.is_cooked(node, part) {
            let plain: Vec<u8> = fork.iter().map(|b| b & 0x7f).collect();
            return Ok(Box::new(Cursor::new(plain)));
        }
        Ok(Box::new(fork.as_slice()))
    }

    fn open_write(&mut self, id: EntryId, part: FilePart) -> Result<Box<dyn Write + '_>> {
        self.check_writable()?;
        let cook = {
            let node = self.node(id)?;
            if node.attribs.is_directory {
                return Err(DiskArcError::unsupported("directories have no forks"));
            }
            self.is_cooked(node, part)
        };

        let MemFileSystem {
            nodes,
            used,
            capacity,
            ..
        } = self;
        let node = nodes
            .get_mut(id.0)
            .and_then(|n| n.as_mut())
            .ok_or(DiskArcError::InvalidEntry(id.0))?;
        let buf = match part {
            FilePart::DataFork | FilePart::RawData | FilePart::DiskImage => {
                node.data.get_or_insert_with(Vec::new)
            }
            FilePart::RsrcFork => node.rsrc.as_mut().ok_or_else(|| {
                DiskArcError::unsupported(format!("'{}' has no resource fork", node.name))
            })?,
            FilePart::Unknown => return Err(DiskArcError::unsupported("unknown file part")),
        };

        *used -= buf.len() as u64;
        buf.clear();
        Ok(Box::new(ForkWriter {
            buf,
            used,
            capacity: *capacity,
            cook,
        }))
    }

    fn delete_entry(&mut self, id: EntryId) -> Result<()> {
        self.check_writable()?;
        if id == EntryId::ROOT {
            return Err(DiskArcError::container("cannot delete the volume directory"));
        }
        let node = self.node(id)?;
        if !node.children.is_empty() {
            return Err(DiskArcError::container(format!(
                "directory '{}' is not empty",
                node.name
            )));
        }
        let freed = node.data.as_ref().map_or(0, |d| d.len() as u64)
            + node.rsrc.as_ref().map_or(0, |r| r.len() as u64);
        let parent = node.parent;

        if let Some(parent) = parent {
            self.node_mut(parent)?.children.retain(|c| *c != id);
        }
        self.used -= freed;
        self.nodes[id.0] = None;
        Ok(())
    }

    fn commit_attribs(&mut self, id: EntryId, attribs: &FileAttribs) -> Result<()> {
        self.check_writable()?;
        let name = attribs.file_name_only().to_string();
        let node = self.node(id)?;
        if node.name != name {
            if self.profile.adjust_name(&name) != name {
                return Err(DiskArcError::InvalidFilename(name));
            }
            if let Some(parent) = node.parent {
                if self.find_child(parent, &name).is_some_and(|other| other != id) {
                    return Err(DiskArcError::container(format!("'{}' already exists", name)));
                }
            }
        }

        let (file_type, aux_type, hfs_type, hfs_creator) =
            attribs.types_for(self.chars.has_prodos_types, self.chars.has_hfs_types);
        let node = self.node_mut(id)?;
        node.name = name.clone();
        node.attribs.full_path_name = name;
        node.attribs.file_type = file_type;
        node.attribs.aux_type = aux_type;
        node.attribs.hfs_file_type = hfs_type;
        node.attribs.hfs_creator = hfs_creator;
        node.attribs.create_when = attribs.create_when;
        node.attribs.mod_when = attribs.mod_when;
        node.attribs.access = attribs.access;
        Ok(())
    }

    fn adjust_name(&self, name: &str) -> String {
        self.profile.adjust_name(name)
    }
}

/// Writer for one fork, charging bytes against the volume capacity
struct ForkWriter<'a> {
    buf: &'a mut Vec<u8>,
    used: &'a mut u64,
    capacity: Option<u64>,
    cook: bool,
}

impl Write for ForkWriter<'_> {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        if let Some(capacity) = self.capacity {
            if *self.used + bytes.len() as u64 > capacity {
                return Err(io::Error::other(DiskArcError::DiskFull));
            }
        }
        if self.cook {
            self.buf.extend(bytes.iter().map(|b| b | 0x80));
        } else {
            self.buf.extend_from_slice(bytes);
        }
        *self.used += bytes.len() as u64;
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(fs: &MemFileSystem, id: EntryId, part: FilePart) -> Vec<u8> {
        let mut out = Vec::new();
        fs.open_read(id, part).unwrap().read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_create_and_write() {
        let mut fs = MemFileSystem::new(FsProfile::ProDos, "TEST");
        let id = fs
            .create_entry(EntryId::ROOT, "DataRsrc", CreateMode::Extended, 0x06)
            .unwrap();
        fs.open_write(id, FilePart::DataFork).unwrap().write_all(&[0x33; 100]).unwrap();
        fs.open_write(id, FilePart::RsrcFork).unwrap().write_all(&[0x44; 50]).unwrap();

        let entry = fs.entry(id).unwrap();
        assert_eq!(entry.full_path(), "DataRsrc");
        assert_eq!(entry.attribs.file_type, 0x06);
        assert_eq!(entry.attribs.data_length(), Some(100));
        assert_eq!(entry.attribs.rsrc_length(), Some(50));
        assert_eq!(fs.used_bytes(), 150);
        assert_eq!(read_all(&fs, id, FilePart::RsrcFork), vec![0x44; 50]);
    }

    #[test]
    fn test_rewrite_truncates() {
        let mut fs = MemFileSystem::new(FsProfile::ProDos, "TEST");
        let id = fs.create_entry(EntryId::ROOT, "F", CreateMode::File, 0).unwrap();
        fs.open_write(id, FilePart::DataFork).unwrap().write_all(b"long contents").unwrap();
        fs.open_write(id, FilePart::DataFork).unwrap().write_all(b"short").unwrap();
        assert_eq!(read_all(&fs, id, FilePart::DataFork), b"short");
        assert_eq!(fs.used_bytes(), 5);
    }

    #[test]
    fn test_capacity() {
        let mut fs = MemFileSystem::new(FsProfile::ProDos, "TEST").with_capacity(10);
        let id = fs.create_entry(EntryId::ROOT, "F", CreateMode::File, 0).unwrap();
        let result = fs.open_write(id, FilePart::DataFork).unwrap().write_all(&[0; 11]);
        assert!(result.is_err());
        fs.delete_entry(id).unwrap();
        assert_eq!(fs.used_bytes(), 0);
        assert!(fs.find_child(EntryId::ROOT, "F").is_none());
    }

    #[test]
    fn test_dos_cooked_text() {
        let mut fs = MemFileSystem::new(FsProfile::Dos33, "DOS");
        let id = fs.create_entry(EntryId::ROOT, "HELLO", CreateMode::File, TYPE_TXT).unwrap();
        fs.open_write(id, FilePart::DataFork).unwrap().write_all(b"HI\r").unwrap();

        assert_eq!(read_all(&fs, id, FilePart::RawData), vec![0xC8, 0xC9, 0x8D]);
        assert_eq!(read_all(&fs, id, FilePart::DataFork), b"HI\r");
    }

    #[test]
    fn test_flat_volume_rejects_directories() {
        let mut fs = MemFileSystem::new(FsProfile::Cpm, "CPM");
        let result = fs.create_entry(EntryId::ROOT, "SUB", CreateMode::Directory, 0);
        assert!(matches!(result, Err(DiskArcError::Unsupported(_))));
        let result = fs.create_entry(EntryId::ROOT, "lower.txt", CreateMode::File, 0);
        assert!(matches!(result, Err(DiskArcError::InvalidFilename(_))));
    }

    #[test]
    fn test_read_only() {
        let mut fs = MemFileSystem::new(FsProfile::ProDos, "TEST");
        fs.mark_dubious();
        let result = fs.create_entry(EntryId::ROOT, "F", CreateMode::File, 0);
        assert!(matches!(result, Err(DiskArcError::ReadOnly { damaged: true })));
    }

    #[test]
    fn test_commit_attribs_hfs() {
        let mut fs = MemFileSystem::new(FsProfile::Hfs, "Mac");
        let id = fs.create_entry(EntryId::ROOT, "File", CreateMode::File, 0x06).unwrap();
        let attrs = FileAttribs::file("File", ':').with_prodos_types(0x06, 0x12cd);
        fs.commit_attribs(id, &attrs).unwrap();

        let entry = fs.entry(id).unwrap();
        assert_eq!(entry.attribs.file_type, 0);
        assert_eq!(entry.attribs.hfs_creator, crate::container::attribs::HFS_CREATOR_PDOS);
    }

    #[test]
    fn test_delete_non_empty_directory() {
        let mut fs = MemFileSystem::new(FsProfile::ProDos, "TEST");
        let dir = fs.create_entry(EntryId::ROOT, "D", CreateMode::Directory, 0).unwrap();
        fs.create_entry(dir, "F", CreateMode::File, 0).unwrap();
        assert!(fs.delete_entry(dir).is_err());
    }
}
