/// Host directory container
///
/// Exposes a directory on the host system through the [`Container`] trait so
/// that it can be a transfer source or the destination of a foreign extract. Host files have a data
/// fork only and no type metadata, unless extended attributes are enabled: the
/// resource fork, Finder info and ProDOS file info are then kept in the
/// attributes macOS uses for them (with a `user.` prefix elsewhere).

use crate::appledouble::{self, ProDosInfo};
use crate::container::attribs::FileAttribs;
use crate::container::{
    Characteristics, Container, ContainerKind, CreateMode, EntryId, FileEntry, FilePart,
};
use crate::error::{DiskArcError, Result};
use chrono::{DateTime, NaiveDateTime};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[cfg(target_os = "macos")]
const RSRC_ATTR: &str = "com.apple.ResourceFork";
#[cfg(target_os = "macos")]
const FINDER_ATTR: &str = "com.apple.FinderInfo";
#[cfg(target_os = "macos")]
const PRODOS_ATTR: &str = "com.a2.ProDOSInfo";

#[cfg(not(target_os = "macos"))]
const RSRC_ATTR: &str = "user.com.apple.ResourceFork";
#[cfg(not(target_os = "macos"))]
const FINDER_ATTR: &str = "user.com.apple.FinderInfo";
#[cfg(not(target_os = "macos"))]
const PRODOS_ATTR: &str = "user.com.a2.ProDOSInfo";

#[cfg(unix)]
mod ext {
    use std::io;
    use std::path::Path;

    pub const SUPPORTED: bool = xattr::SUPPORTED_PLATFORM;

    pub fn get(path: &Path, name: &str) -> io::Result<Option<Vec<u8>>> {
        xattr::get(path, name)
    }

    pub fn set(path: &Path, name: &str, value: &[u8]) -> io::Result<()> {
        xattr::set(path, name, value)
    }
}

#[cfg(not(unix))]
mod ext {
    use std::io;
    use std::path::Path;

    pub const SUPPORTED: bool = false;

    pub fn get(_path: &Path, _name: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(None)
    }

    pub fn set(_path: &Path, _name: &str, _value: &[u8]) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }
}

const HOST_CHARACTERISTICS: Characteristics = Characteristics {
    name: "host",
    kind: ContainerKind::Host,
    has_resource_forks: false,
    is_hierarchical: true,
    has_prodos_types: false,
    has_hfs_types: false,
    has_raw_mode: false,
    case_sensitive: cfg!(target_os = "linux"),
    dir_sep: MAIN_SEPARATOR,
    zip_like: false,
};

/// Collects a resource fork and stores it as an attribute on flush
struct RsrcWriter {
    path: PathBuf,
    buf: Vec<u8>,
    dirty: bool,
}

impl Write for RsrcWriter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        self.dirty = true;
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.dirty {
            ext::set(&self.path, RSRC_ATTR, &self.buf)?;
            self.dirty = false;
        }
        Ok(())
    }
}

impl Drop for RsrcWriter {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            tracing::warn!(
                "resource fork of '{}' not stored: {}",
                self.path.display(),
                err
            );
        }
    }
}

/// Directory on the host filesystem
#[derive(Debug)]
pub struct HostDir {
    chars: Characteristics,
    /// Interned paths relative to the root; slot 0 is the root itself
    paths: RefCell<Vec<PathBuf>>,
    index: RefCell<HashMap<PathBuf, usize>>,
    root: PathBuf,
    read_only: bool,
    ext_attrs: bool,
}

impl HostDir {
    /// Use an existing directory as a container
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(DiskArcError::NotADirectory(root.display().to_string()));
        }
        let read_only = fs::metadata(&root)?.permissions().readonly();
        Ok(Self {
            chars: HOST_CHARACTERISTICS,
            paths: RefCell::new(vec![PathBuf::new()]),
            index: RefCell::new(HashMap::from([(PathBuf::new(), 0)])),
            root,
            read_only,
            ext_attrs: false,
        })
    }

    /// Keep resource forks and file types in extended attributes
    pub fn with_extended_attributes(mut self, enable: bool) -> Result<Self> {
        if enable && !ext::SUPPORTED {
            return Err(DiskArcError::unsupported(
                "extended attributes are not available on this platform",
            ));
        }
        self.ext_attrs = enable;
        self.chars.name = if enable { "host+xattr" } else { "host" };
        self.chars.has_resource_forks = enable;
        self.chars.has_prodos_types = enable;
        self.chars.has_hfs_types = enable;
        Ok(self)
    }

    /// True if forks and types are kept in extended attributes
    pub fn uses_extended_attributes(&self) -> bool {
        self.ext_attrs
    }

    /// Root directory on the host
    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// Host path of an entry
    pub fn host_path(&self, id: EntryId) -> Result<PathBuf> {
        Ok(self.root.join(self.relative(id)?))
    }

    fn relative(&self, id: EntryId) -> Result<PathBuf> {
        self.paths
            .borrow()
            .get(id.0)
            .cloned()
            .ok_or(DiskArcError::InvalidEntry(id.0))
    }

    fn intern(&self, rel: PathBuf) -> EntryId {
        let mut index = self.index.borrow_mut();
        if let Some(&idx) = index.get(&rel) {
            return EntryId(idx);
        }
        let mut paths = self.paths.borrow_mut();
        paths.push(rel.clone());
        index.insert(rel, paths.len() - 1);
        EntryId(paths.len() - 1)
    }

    fn check_forks(&self) -> Result<()> {
        if !self.ext_attrs {
            return Err(DiskArcError::unsupported("host files have no resource fork"));
        }
        Ok(())
    }

    /// Read the type attributes of a file into `attribs`
    fn load_types(&self, path: &Path, attribs: &mut FileAttribs) {
        if let Some((file_type, creator)) = ext::get(path, FINDER_ATTR)
            .ok()
            .flatten()
            .and_then(|raw| appledouble::decode_finder_info(&raw))
        {
            attribs.hfs_file_type = file_type;
            attribs.hfs_creator = creator;
        }
        if let Some(info) = ext::get(path, PRODOS_ATTR)
            .ok()
            .flatten()
            .and_then(|raw| ProDosInfo::decode(&raw))
        {
            attribs.file_type = info.file_type;
            attribs.aux_type = info.aux_type;
            attribs.access = info.access;
        }
    }

    fn store_types(&self, path: &Path, attribs: &FileAttribs) -> Result<()> {
        let (_, _, hfs_file_type, hfs_creator) = attribs.types_for(false, true);
        if hfs_file_type != 0 || hfs_creator != 0 {
            let finder = appledouble::encode_finder_info(hfs_file_type, hfs_creator);
            ext::set(path, FINDER_ATTR, &finder)?;
        }
        if attribs.has_prodos_types() {
            let info = ProDosInfo {
                access: attribs.access,
                file_type: attribs.file_type,
                aux_type: attribs.aux_type,
            };
            ext::set(path, PRODOS_ATTR, &info.encode())?;
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(DiskArcError::ReadOnly { damaged: false });
        }
        Ok(())
    }
}

fn to_system_time(when: NaiveDateTime) -> Option<SystemTime> {
    let secs = u64::try_from(when.and_utc().timestamp()).ok()?;
    UNIX_EPOCH.checked_add(Duration::from_secs(secs))
}

fn from_system_time(when: SystemTime) -> Option<NaiveDateTime> {
    let secs = when.duration_since(UNIX_EPOCH).ok()?.as_secs();
    DateTime::from_timestamp(i64::try_from(secs).ok()?, 0).map(|dt| dt.naive_utc())
}

impl Container for HostDir {
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
        let rel = self.relative(id)?;
        let meta = fs::metadata(self.root.join(&rel))?;
        let full_path = rel.to_string_lossy().into_owned();
        let mut attribs = if meta.is_dir() {
            FileAttribs::directory(full_path, MAIN_SEPARATOR)
        } else {
            FileAttribs::file(full_path, MAIN_SEPARATOR)
        };
        attribs.mod_when = meta.modified().ok().and_then(from_system_time);
        let mut rsrc_length = None;
        if self.ext_attrs && !meta.is_dir() {
            let path = self.root.join(&rel);
            rsrc_length = ext::get(&path, RSRC_ATTR)
                .ok()
                .flatten()
                .map(|fork| fork.len() as u64);
            self.load_types(&path, &mut attribs);
        }
        attribs.set_fork_lengths(Some(meta.len()), rsrc_length);
        Ok(FileEntry {
            id,
            attribs,
            has_data_fork: !meta.is_dir(),
            has_rsrc_fork: rsrc_length.is_some(),
            is_disk_image: false,
            is_dubious: false,
            is_damaged: false,
        })
    }

    fn children(&self, dir: EntryId) -> Result<Vec<EntryId>> {
        let rel = self.relative(dir)?;
        let mut names: Vec<PathBuf> = fs::read_dir(self.root.join(&rel))?
            .filter_map(|e| e.ok())
            .map(|e| rel.join(e.file_name()))
            .collect();
        names.sort();
        Ok(names.into_iter().map(|path| self.intern(path)).collect())
    }

    fn find_child(&self, dir: EntryId, name: &str) -> Option<EntryId> {
        let rel = self.relative(dir).ok()?.join(name);
        if !self.root.join(&rel).exists() {
            return None;
        }
        Some(self.intern(rel))
    }

    fn create_entry(
        &mut self,
        dir: EntryId,
        name: &str,
        mode: CreateMode,
        _file_type: u8,
    ) -> Result<EntryId> {
        self.check_writable()?;
        let rel = self.relative(dir)?.join(name);
        let path = self.root.join(&rel);
        if path.exists() {
            return Err(DiskArcError::container(format!("'{}' already exists", path.display())));
        }
        match mode {
            CreateMode::Directory => fs::create_dir(&path)?,
            CreateMode::File | CreateMode::Extended => {
                File::create(&path)?;
            }
        }
        Ok(self.intern(rel))
    }

    fn open_read(&self, id: EntryId, part: FilePart) -> Result<Box<dyn Read + '_>> {
        let path = self.host_path(id)?;
        if part == FilePart::RsrcFork {
            self.check_forks()?;
            let fork = ext::get(&path, RSRC_ATTR)?.unwrap_or_default();
            return Ok(Box::new(Cursor::new(fork)));
        }
        let file = File::open(path)?;
        Ok(Box::new(file))
    }

    fn open_write(&mut self, id: EntryId, part: FilePart) -> Result<Box<dyn Write + '_>> {
        self.check_writable()?;
        let path = self.host_path(id)?;
        if part == FilePart::RsrcFork {
            self.check_forks()?;
            // an empty fork is still a fork
            return Ok(Box::new(RsrcWriter {
                path,
                buf: Vec::new(),
                dirty: true,
            }));
        }
        let file = File::create(path)?;
        Ok(Box::new(file))
    }

    fn delete_entry(&mut self, id: EntryId) -> Result<()> {
        self.check_writable()?;
        if id == EntryId::ROOT {
            return Err(DiskArcError::container("cannot delete the root directory"));
        }
        let path = self.host_path(id)?;
        if path.is_dir() {
            fs::remove_dir(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn commit_attribs(&mut self, id: EntryId, attribs: &FileAttribs) -> Result<()> {
        self.check_writable()?;
        let path = self.host_path(id)?;
        if path.is_dir() {
            return Ok(());
        }
        if self.ext_attrs {
            self.store_types(&path, attribs)?;
        }
        if let Some(when) = attribs.mod_when.and_then(to_system_time) {
            let file = File::options().write(true).open(&path)?;
            file.set_modified(when)?;
        }
        Ok(())
    }

    fn adjust_name(&self, name: &str) -> String {
        let out: String = name
            .chars()
            .map(|c| match c {
                '/' | '\\' | '\0' => '_',
                c if cfg!(windows) && "<>:\"|?*".contains(c) => '_',
                c => c,
            })
            .collect();
        match out.as_str() {
            "" | "." | ".." => format!("_{}", out),
            _ => out,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_create_write_find() {
        let tmp = tempfile::tempdir().unwrap();
        let mut host = HostDir::open(tmp.path()).unwrap();
        let dir = host
            .create_entry(EntryId::ROOT, "subdir1", CreateMode::Directory, 0)
            .unwrap();
        let file = host.create_entry(dir, "DataOnly", CreateMode::File, 0).unwrap();
        host.open_write(file, FilePart::DataFork).unwrap().write_all(b"hello").unwrap();

        assert_eq!(host.find_child(EntryId::ROOT, "subdir1"), Some(dir));
        assert_eq!(host.find_child(dir, "DataOnly"), Some(file));
        assert_eq!(host.children(dir).unwrap(), vec![file]);
        let entry = host.entry(file).unwrap();
        assert_eq!(entry.attribs.data_length(), Some(5));
        assert_eq!(fs::read(tmp.path().join("subdir1").join("DataOnly")).unwrap(), b"hello");
    }

    #[test]
    fn test_commit_sets_mod_time() {
        let tmp = tempfile::tempdir().unwrap();
        let mut host = HostDir::open(tmp.path()).unwrap();
        let file = host.create_entry(EntryId::ROOT, "f", CreateMode::File, 0).unwrap();
        let when = NaiveDate::from_ymd_opt(1986, 9, 15)
            .unwrap()
            .and_hms_opt(4, 5, 0)
            .unwrap();
        let attrs = FileAttribs::file("f", MAIN_SEPARATOR).with_dates(None, Some(when));
        host.commit_attribs(file, &attrs).unwrap();
        assert_eq!(host.entry(file).unwrap().attribs.mod_when, Some(when));
    }

    #[test]
    fn test_no_resource_fork() {
        let tmp = tempfile::tempdir().unwrap();
        let mut host = HostDir::open(tmp.path()).unwrap();
        let file = host.create_entry(EntryId::ROOT, "f", CreateMode::File, 0).unwrap();
        assert!(host.open_write(file, FilePart::RsrcFork).is_err());
    }

    #[test]
    fn test_intern_reuses_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let mut host = HostDir::open(tmp.path()).unwrap();
        let dir = host
            .create_entry(EntryId::ROOT, "subdir1", CreateMode::Directory, 0)
            .unwrap();
        let mut files = Vec::new();
        for i in 0..50 {
            files.push(host.create_entry(dir, &format!("f{:02}", i), CreateMode::File, 0).unwrap());
        }
        assert_eq!(host.children(dir).unwrap(), files);
        assert_eq!(host.find_child(dir, "f17"), Some(files[17]));
        assert_eq!(host.find_child(EntryId::ROOT, "subdir1"), Some(dir));
        assert_eq!(host.paths.borrow().len(), 52);
        assert_eq!(host.index.borrow().len(), 52);
    }

    /// Host directory with extended attributes, if the temp filesystem takes them
    fn xattr_host(tmp: &Path) -> Option<HostDir> {
        let host = HostDir::open(tmp).ok()?.with_extended_attributes(true).ok()?;
        let trial = tmp.join(".trial");
        File::create(&trial).ok()?;
        let usable = ext::set(&trial, RSRC_ATTR, b"x").is_ok();
        fs::remove_file(&trial).ok()?;
        usable.then_some(host)
    }

    #[test]
    fn test_extended_attributes() {
        let tmp = tempfile::tempdir().unwrap();
        let Some(mut host) = xattr_host(tmp.path()) else {
            return;
        };
        assert!(host.characteristics().has_resource_forks);
        let file = host
            .create_entry(EntryId::ROOT, "DataRsrc", CreateMode::Extended, 0)
            .unwrap();
        host.open_write(file, FilePart::DataFork).unwrap().write_all(b"data").unwrap();
        let mut writer = host.open_write(file, FilePart::RsrcFork).unwrap();
        writer.write_all(&[0x28; 300]).unwrap();
        writer.flush().unwrap();
        drop(writer);
        let attrs = FileAttribs::file("DataRsrc", MAIN_SEPARATOR)
            .with_prodos_types(0x06, 0x12cd)
            .with_hfs_types(0x54455354, 0x23435032);
        host.commit_attribs(file, &attrs).unwrap();

        let entry = host.entry(file).unwrap();
        assert!(entry.has_rsrc_fork);
        assert_eq!(entry.attribs.data_length(), Some(4));
        assert_eq!(entry.attribs.rsrc_length(), Some(300));
        assert_eq!(entry.attribs.file_type, 0x06);
        assert_eq!(entry.attribs.aux_type, 0x12cd);
        assert_eq!(entry.attribs.hfs_file_type, 0x54455354);
        assert_eq!(entry.attribs.hfs_creator, 0x23435032);

        let mut fork = Vec::new();
        host.open_read(file, FilePart::RsrcFork).unwrap().read_to_end(&mut fork).unwrap();
        assert_eq!(fork, vec![0x28; 300]);
    }

    #[test]
    fn test_extended_attributes_empty_fork() {
        let tmp = tempfile::tempdir().unwrap();
        let Some(mut host) = xattr_host(tmp.path()) else {
            return;
        };
        let file = host
            .create_entry(EntryId::ROOT, "RsrcOnly", CreateMode::Extended, 0)
            .unwrap();
        host.open_write(file, FilePart::RsrcFork).unwrap().flush().unwrap();
        let entry = host.entry(file).unwrap();
        assert!(entry.has_rsrc_fork);
        assert_eq!(entry.attribs.rsrc_length(), Some(0));
        // untyped files get no type attributes
        host.commit_attribs(file, &FileAttribs::file("RsrcOnly", MAIN_SEPARATOR))
            .unwrap();
        assert_eq!(host.entry(file).unwrap().attribs.file_type, 0);
    }

    #[test]
    fn test_adjust_name() {
        let tmp = tempfile::tempdir().unwrap();
        let host = HostDir::open(tmp.path()).unwrap();
        assert_eq!(host.adjust_name("a/b"), "a_b");
        assert_eq!(host.adjust_name(".."), "_..");
        assert_eq!(host.adjust_name("DataOnly#0612cd"), "DataOnly#0612cd");
    }
}
