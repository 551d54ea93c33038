/// In-memory file archive
///
/// Records carry their whole partial pathname under a single name, so the
/// archive has no directory records. Compression and the on-disk record
/// layout are left to the codecs; this type only models the record list.

use crate::container::attribs::{split_path, FileAttribs};
use crate::container::{
    Characteristics, Container, ContainerKind, CreateMode, EntryId, FileEntry, FilePart,
};
use crate::error::{DiskArcError, Result};
use std::io::{Read, Write};

/// Archive flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// ShrinkIt NuFX: ProDOS types, resource forks, ':' separator
    NuFx,
    /// ZIP: no types, no resource forks, '/' separator
    Zip,
}

impl ArchiveKind {
    /// Capability flags for this flavour
    pub fn characteristics(&self) -> Characteristics {
        match self {
            ArchiveKind::NuFx => Characteristics {
                name: "NuFX",
                kind: ContainerKind::Archive,
                has_resource_forks: true,
                is_hierarchical: true,
                has_prodos_types: true,
                has_hfs_types: false,
                has_raw_mode: false,
                case_sensitive: false,
                dir_sep: ':',
                zip_like: false,
            },
            ArchiveKind::Zip => Characteristics {
                name: "ZIP",
                kind: ContainerKind::Archive,
                has_resource_forks: false,
                is_hierarchical: true,
                has_prodos_types: false,
                has_hfs_types: false,
                has_raw_mode: false,
                case_sensitive: true,
                dir_sep: '/',
                zip_like: true,
            },
        }
    }
}

#[derive(Debug, Clone)]
struct Record {
    attribs: FileAttribs,
    data: Option<Vec<u8>>,
    rsrc: Option<Vec<u8>>,
    disk_image: bool,
    damaged: bool,
}

/// Archive held in memory
#[derive(Debug, Clone)]
pub struct MemArchive {
    kind: ArchiveKind,
    chars: Characteristics,
    /// Slot 0 is the implicit root and always empty
    records: Vec<Option<Record>>,
    read_only: bool,
}

impl MemArchive {
    /// Create an empty archive
    pub fn new(kind: ArchiveKind) -> Self {
        Self {
            kind,
            chars: kind.characteristics(),
            records: vec![None],
            read_only: false,
        }
    }

    /// Archive flavour
    pub fn kind(&self) -> ArchiveKind {
        self.kind
    }

    /// Number of live records
    pub fn record_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_some()).count()
    }

    /// Allow or forbid modification
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Flag a record as damaged
    pub fn mark_damaged(&mut self, id: EntryId) -> Result<()> {
        self.record_mut(id)?.damaged = true;
        Ok(())
    }

    /// Add a complete record in one step. The record name is taken from
    /// `attribs.full_path_name`, converted to the archive separator.
    pub fn add_record(
        &mut self,
        attribs: FileAttribs,
        data: Option<Vec<u8>>,
        rsrc: Option<Vec<u8>>,
    ) -> Result<EntryId> {
        if rsrc.is_some() && !self.chars.has_resource_forks {
            return Err(DiskArcError::unsupported("ZIP records have no resource fork"));
        }
        self.push_record(attribs, data, rsrc, false)
    }

    /// Add a record holding a disk image. A resource fork may ride along but
    /// is not part of the image.
    pub fn add_disk_image(
        &mut self,
        attribs: FileAttribs,
        image: Vec<u8>,
        rsrc: Option<Vec<u8>>,
    ) -> Result<EntryId> {
        if rsrc.is_some() && !self.chars.has_resource_forks {
            return Err(DiskArcError::unsupported("ZIP records have no resource fork"));
        }
        self.push_record(attribs, Some(image), rsrc, true)
    }

    fn push_record(
        &mut self,
        mut attribs: FileAttribs,
        data: Option<Vec<u8>>,
        rsrc: Option<Vec<u8>>,
        disk_image: bool,
    ) -> Result<EntryId> {
        self.check_writable()?;
        let name = self.storage_name(&attribs);
        if name.is_empty() {
            return Err(DiskArcError::InvalidFilename(attribs.full_path_name));
        }
        if self.find_child(EntryId::ROOT, &name).is_some() {
            return Err(DiskArcError::container(format!("'{}' already exists", name)));
        }
        attribs.full_path_name = name;
        attribs.path_sep = self.chars.dir_sep;
        attribs.is_directory = false;
        self.records.push(Some(Record {
            attribs,
            data,
            rsrc,
            disk_image,
            damaged: false,
        }));
        Ok(EntryId(self.records.len() - 1))
    }

    fn storage_name(&self, attribs: &FileAttribs) -> String {
        split_path(&attribs.full_path_name, attribs.path_sep).join(&self.chars.dir_sep.to_string())
    }

    fn record(&self, id: EntryId) -> Result<&Record> {
        self.records
            .get(id.0)
            .and_then(|r| r.as_ref())
            .ok_or(DiskArcError::InvalidEntry(id.0))
    }

    fn record_mut(&mut self, id: EntryId) -> Result<&mut Record> {
        self.records
            .get_mut(id.0)
            .and_then(|r| r.as_mut())
            .ok_or(DiskArcError::InvalidEntry(id.0))
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(DiskArcError::ReadOnly { damaged: false });
        }
        Ok(())
    }

    fn names_equal(&self, a: &str, b: &str) -> bool {
        if self.chars.case_sensitive {
            a == b
        } else {
            a.eq_ignore_ascii_case(b)
        }
    }
}

impl Container for MemArchive {
    fn characteristics(&self) -> &Characteristics {
        &self.chars
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn is_dubious(&self) -> bool {
        false
    }

    fn entry(&self, id: EntryId) -> Result<FileEntry> {
        if id == EntryId::ROOT {
            return Ok(FileEntry {
                id,
                attribs: FileAttribs::directory("", self.chars.dir_sep),
                has_data_fork: false,
                has_rsrc_fork: false,
                is_disk_image: false,
                is_dubious: false,
                is_damaged: false,
            });
        }
        let record = self.record(id)?;
        let mut attribs = record.attribs.clone();
        attribs.set_fork_lengths(
            record.data.as_ref().map(|d| d.len() as u64),
            record.rsrc.as_ref().map(|r| r.len() as u64),
        );
        Ok(FileEntry {
            id,
            attribs,
            has_data_fork: record.data.is_some(),
            has_rsrc_fork: record.rsrc.is_some(),
            is_disk_image: record.disk_image,
            is_dubious: false,
            is_damaged: record.damaged,
        })
    }

    fn children(&self, dir: EntryId) -> Result<Vec<EntryId>> {
        if dir != EntryId::ROOT {
            return Err(DiskArcError::NotADirectory(format!("record #{}", dir.0)));
        }
        Ok(self
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_some())
            .map(|(idx, _)| EntryId(idx))
            .collect())
    }

    fn find_child(&self, dir: EntryId, name: &str) -> Option<EntryId> {
        if dir != EntryId::ROOT {
            return None;
        }
        self.records.iter().enumerate().find_map(|(idx, r)| {
            r.as_ref()
                .filter(|r| self.names_equal(&r.attribs.full_path_name, name))
                .map(|_| EntryId(idx))
        })
    }

    fn create_entry(
        &mut self,
        dir: EntryId,
        name: &str,
        mode: CreateMode,
        file_type: u8,
    ) -> Result<EntryId> {
        if dir != EntryId::ROOT {
            return Err(DiskArcError::NotADirectory(format!("record #{}", dir.0)));
        }
        let rsrc = match mode {
            CreateMode::Directory => {
                return Err(DiskArcError::unsupported("archives keep no directory records"))
            }
            CreateMode::Extended if !self.chars.has_resource_forks => {
                return Err(DiskArcError::unsupported("ZIP records have no resource fork"))
            }
            CreateMode::Extended => Some(Vec::new()),
            CreateMode::File => None,
        };
        let attribs = FileAttribs::file(name, self.chars.dir_sep).with_prodos_types(file_type, 0);
        self.push_record(attribs, Some(Vec::new()), rsrc, false)
    }

    fn open_read(&self, id: EntryId, part: FilePart) -> Result<Box<dyn Read + '_>> {
        let record = self.record(id)?;
        let fork = match part {
            FilePart::DataFork | FilePart::RawData | FilePart::DiskImage => record.data.as_ref(),
            FilePart::RsrcFork => record.rsrc.as_ref(),
            FilePart::Unknown => None,
        };
        let fork = fork.ok_or_else(|| {
            DiskArcError::FileNotFound(format!("{} ({} fork)", record.attribs.full_path_name, part))
        })?;
        Ok(Box::new(fork.as_slice()))
    }

    fn open_write(&mut self, id: EntryId, part: FilePart) -> Result<Box<dyn Write + '_>> {
        self.check_writable()?;
        let can_rsrc = self.chars.has_resource_forks;
        let record = self.record_mut(id)?;
        let fork = match part {
            FilePart::DataFork | FilePart::RawData | FilePart::DiskImage => {
                record.data.get_or_insert_with(Vec::new)
            }
            FilePart::RsrcFork if can_rsrc => record.rsrc.get_or_insert_with(Vec::new),
            FilePart::RsrcFork => {
                return Err(DiskArcError::unsupported("ZIP records have no resource fork"))
            }
            FilePart::Unknown => return Err(DiskArcError::unsupported("unknown file part")),
        };
        fork.clear();
        Ok(Box::new(fork))
    }

    fn delete_entry(&mut self, id: EntryId) -> Result<()> {
        self.check_writable()?;
        self.record(id)?;
        self.records[id.0] = None;
        Ok(())
    }

    fn commit_attribs(&mut self, id: EntryId, attribs: &FileAttribs) -> Result<()> {
        self.check_writable()?;
        let name = self.storage_name(attribs);
        if let Some(other) = self.find_child(EntryId::ROOT, &name) {
            if other != id {
                return Err(DiskArcError::container(format!("'{}' already exists", name)));
            }
        }
        let (file_type, aux_type, hfs_type, hfs_creator) =
            attribs.types_for(self.chars.has_prodos_types, self.chars.has_hfs_types);
        let record = self.record_mut(id)?;
        record.attribs.full_path_name = name;
        record.attribs.file_type = file_type;
        record.attribs.aux_type = aux_type;
        record.attribs.hfs_file_type = hfs_type;
        record.attribs.hfs_creator = hfs_creator;
        record.attribs.create_when = attribs.create_when;
        record.attribs.mod_when = attribs.mod_when;
        record.attribs.access = attribs.access;
        Ok(())
    }

    fn adjust_name(&self, name: &str) -> String {
        let sep = self.chars.dir_sep;
        let out: String = name
            .chars()
            .map(|c| if c == sep || c == '\0' { '_' } else { c })
            .collect();
        if out.is_empty() {
            "_".to_string()
        } else {
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_find() {
        let mut arc = MemArchive::new(ArchiveKind::NuFx);
        let attrs = FileAttribs::file("subdir1/DataOnly", '/').with_prodos_types(0x06, 0x12cd);
        let id = arc.add_record(attrs, Some(vec![0x11; 10]), None).unwrap();

        assert_eq!(arc.find_child(EntryId::ROOT, "SUBDIR1:DATAONLY"), Some(id));
        let entry = arc.entry(id).unwrap();
        assert_eq!(entry.full_path(), "subdir1:DataOnly");
        assert_eq!(entry.attribs.aux_type, 0x12cd);
        assert_eq!(entry.attribs.data_length(), Some(10));
        assert!(!entry.has_rsrc_fork);
    }

    #[test]
    fn test_zip_rejects_rsrc() {
        let mut arc = MemArchive::new(ArchiveKind::Zip);
        let result = arc.add_record(FileAttribs::file("a", '/'), None, Some(vec![1]));
        assert!(matches!(result, Err(DiskArcError::Unsupported(_))));
        let id = arc.create_entry(EntryId::ROOT, "a", CreateMode::File, 0).unwrap();
        assert!(arc.open_write(id, FilePart::RsrcFork).is_err());
    }

    #[test]
    fn test_disk_image_record() {
        let mut arc = MemArchive::new(ArchiveKind::NuFx);
        let attrs = FileAttribs::file("Games.po", ':').with_prodos_types(0xe0, 0x0005);
        let id = arc.add_disk_image(attrs, vec![0; 4096], Some(vec![7; 64])).unwrap();
        let entry = arc.entry(id).unwrap();
        assert!(entry.is_disk_image);
        assert!(entry.has_rsrc_fork);
        assert_eq!(entry.attribs.data_length(), Some(4096));

        let mut zip = MemArchive::new(ArchiveKind::Zip);
        let attrs = FileAttribs::file("Games.po", '/');
        assert!(zip.add_disk_image(attrs.clone(), vec![0; 16], Some(vec![1])).is_err());
        assert!(zip.add_disk_image(attrs, vec![0; 16], None).is_ok());
    }

    #[test]
    fn test_delete_and_children() {
        let mut arc = MemArchive::new(ArchiveKind::Zip);
        let a = arc.create_entry(EntryId::ROOT, "a", CreateMode::File, 0).unwrap();
        let b = arc.create_entry(EntryId::ROOT, "dir/b", CreateMode::File, 0).unwrap();
        arc.delete_entry(a).unwrap();
        assert_eq!(arc.children(EntryId::ROOT).unwrap(), vec![b]);
        assert_eq!(arc.record_count(), 1);
        assert!(arc.find_child(EntryId::ROOT, "DIR/B").is_none());
    }

    #[test]
    fn test_adjust_name() {
        let arc = MemArchive::new(ArchiveKind::NuFx);
        assert_eq!(arc.adjust_name("a:b"), "a_b");
        assert_eq!(arc.adjust_name("a/b"), "a/b");
    }
}
