/// Transfer worker
///
/// Writes a sequence of transfer entries into a destination filesystem or
/// archive. Each logical file (a data part, a resource part, or both) is
/// created, filled and committed before the next one is looked at. A failure
/// while filling a file removes that file and aborts the transfer.

use crate::appledouble::{self, AppleDouble};
use crate::container::attribs::split_path;
use crate::container::{
    create_subdirectories, Container, ContainerKind, CreateMode, EntryId, FileAttribs, FilePart,
};
use crate::error::{DiskArcError, Result};
use crate::xfer::{
    CallbackFacts, CallbackResult, StreamGenerator, TransferEntry, TransferHandler,
    TransferOptions,
};
use std::collections::HashMap;
use std::io::{self, Read, Write};

/// How a transfer ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Every entry was processed
    Completed,
    /// The handler answered `Cancel` to a name collision
    Cancelled,
}

impl TransferOutcome {
    /// True if the transfer was cancelled
    pub fn is_cancelled(&self) -> bool {
        *self == TransferOutcome::Cancelled
    }
}

/// Part of a transfer entry list together with its position
type Part<'e> = (usize, &'e TransferEntry);

/// Entries making up one logical file
struct FileGroup<'e> {
    first: &'e TransferEntry,
    data: Option<Part<'e>>,
    rsrc: Option<Part<'e>>,
}

impl<'e> FileGroup<'e> {
    /// Take the file starting at `idx`, returning it and the index after it
    fn take(entries: &'e [TransferEntry], idx: usize) -> (Self, usize) {
        let first = &entries[idx];
        if first.store_part == FilePart::RsrcFork {
            let group = FileGroup {
                first,
                data: None,
                rsrc: Some((idx, first)),
            };
            return (group, idx + 1);
        }
        match entries.get(idx + 1) {
            Some(next) if first.pairs_with(next) => {
                let group = FileGroup {
                    first,
                    data: Some((idx, first)),
                    rsrc: Some((idx + 1, next)),
                };
                (group, idx + 2)
            }
            _ => {
                let group = FileGroup {
                    first,
                    data: Some((idx, first)),
                    rsrc: None,
                };
                (group, idx + 1)
            }
        }
    }
}

/// What to do about an existing entry with the incoming name
enum Resolution {
    /// Nothing in the way (any old file has been removed)
    Create,
    /// Directory already there; use it
    Reuse,
    /// Leave the existing file alone
    Skip,
    /// Stop the transfer
    Cancel,
}

/// Writes transfer entries into a destination container
pub struct TransferWorker<'a> {
    options: TransferOptions,
    handler: &'a mut dyn TransferHandler,
    streams: &'a mut dyn StreamGenerator,
}

impl<'a> TransferWorker<'a> {
    /// Create a worker. `options` should be the ones the entries were built with.
    pub fn new(
        options: TransferOptions,
        handler: &'a mut dyn TransferHandler,
        streams: &'a mut dyn StreamGenerator,
    ) -> Self {
        Self {
            options,
            handler,
            streams,
        }
    }

    /// Write `entries` into `dest`, below `target_dir` (the root if `None`).
    ///
    /// Files completed before a cancellation or an error stay in place.
    pub fn transfer(
        &mut self,
        dest: &mut dyn Container,
        target_dir: Option<EntryId>,
        entries: &[TransferEntry],
    ) -> Result<TransferOutcome> {
        if dest.is_read_only() {
            return Err(DiskArcError::ReadOnly {
                damaged: dest.is_dubious(),
            });
        }
        let base = match target_dir {
            Some(dir) => {
                let entry = dest.entry(dir)?;
                if !entry.is_directory() {
                    return Err(DiskArcError::NotADirectory(entry.full_path().to_string()));
                }
                dir
            }
            None => EntryId::ROOT,
        };

        let kind = dest.characteristics().kind;
        tracing::debug!(
            "transferring {} entries to {} ({:?})",
            entries.len(),
            dest.characteristics().name,
            kind
        );
        match kind {
            ContainerKind::Archive => self.transfer_to_archive(dest, entries),
            ContainerKind::FileSystem | ContainerKind::Host => {
                self.transfer_to_filesystem(dest, base, entries)
            }
        }
    }

    fn transfer_to_filesystem(
        &mut self,
        dest: &mut dyn Container,
        base: EntryId,
        entries: &[TransferEntry],
    ) -> Result<TransferOutcome> {
        let chars = dest.characteristics().clone();
        let strip = self.options.strip_paths || !chars.is_hierarchical;
        let mut dir_cache: HashMap<String, EntryId> = HashMap::new();

        let mut idx = 0;
        while idx < entries.len() {
            let (group, next) = FileGroup::take(entries, idx);
            idx = next;
            let entry = group.first;

            if entry.attribs.is_directory && strip {
                continue;
            }
            if group.data.is_none() && !chars.has_resource_forks {
                self.report_ignored(entry);
                continue;
            }
            let rsrc = if chars.has_resource_forks {
                group.rsrc
            } else {
                if group.rsrc.is_some() {
                    tracing::debug!(
                        "{} has no resource forks, storing data of '{}' only",
                        chars.name,
                        entry.attribs.full_path_name
                    );
                }
                None
            };

            let components = split_path(&entry.extract_path, entry.extract_sep);
            let Some((leaf, dir_parts)) = components.split_last() else {
                tracing::warn!("skipping entry with empty path");
                continue;
            };
            let dir = if strip || dir_parts.is_empty() {
                base
            } else {
                let dir_path = dir_parts.join(&entry.extract_sep.to_string());
                match dir_cache.get(&dir_path) {
                    Some(&dir) => dir,
                    None => {
                        let dir = create_subdirectories(dest, base, &dir_path, entry.extract_sep)?;
                        dir_cache.insert(dir_path, dir);
                        dir
                    }
                }
            };

            let name = dest.adjust_name(leaf);
            if let Some(existing) = dest.find_child(dir, &name) {
                match self.resolve(dest, existing, entry)? {
                    Resolution::Create => {}
                    Resolution::Reuse | Resolution::Skip => continue,
                    Resolution::Cancel => return Ok(TransferOutcome::Cancelled),
                }
            }

            let mode = if entry.attribs.is_directory {
                CreateMode::Directory
            } else if rsrc.is_some() {
                CreateMode::Extended
            } else {
                CreateMode::File
            };
            let new_id = dest.create_entry(dir, &name, mode, entry.attribs.file_type)?;
            if entry.attribs.is_directory {
                tracing::debug!("created directory '{}'", name);
                continue;
            }

            let new_path = dest.entry(new_id)?.full_path().to_string();
            let parts: Vec<Part<'_>> = group.data.into_iter().chain(rsrc).collect();
            if let Err(err) = self.fill_file(dest, new_id, &parts, &new_path, entries.len()) {
                roll_back(dest, new_id, &new_path, &err);
                return Err(err);
            }

            let mut attribs = entry.attribs.clone();
            attribs.set_file_name_only(&name);
            dest.commit_attribs(new_id, &attribs)?;
            tracing::debug!("added '{}'", new_path);
        }
        Ok(TransferOutcome::Completed)
    }

    fn transfer_to_archive(
        &mut self,
        dest: &mut dyn Container,
        entries: &[TransferEntry],
    ) -> Result<TransferOutcome> {
        let chars = dest.characteristics().clone();
        let sep = chars.dir_sep;
        let mac_zip = self.options.mac_zip && chars.zip_like;
        let keeps_rsrc = chars.has_resource_forks || mac_zip;

        let mut idx = 0;
        while idx < entries.len() {
            let (group, next) = FileGroup::take(entries, idx);
            idx = next;
            let entry = group.first;

            // archives keep no directory records
            if entry.attribs.is_directory {
                continue;
            }
            if group.data.is_none() && !keeps_rsrc {
                self.report_ignored(entry);
                continue;
            }
            let rsrc = if keeps_rsrc { group.rsrc } else { None };

            let mut components = split_path(&entry.extract_path, entry.extract_sep);
            if self.options.strip_paths && components.len() > 1 {
                components = components.split_off(components.len() - 1);
            }
            if components.is_empty() {
                tracing::warn!("skipping entry with empty path");
                continue;
            }
            let name = components
                .iter()
                .map(|c| dest.adjust_name(c))
                .collect::<Vec<_>>()
                .join(&sep.to_string());

            if let Some(existing) = dest.find_child(EntryId::ROOT, &name) {
                match self.resolve(dest, existing, entry)? {
                    Resolution::Create => {}
                    Resolution::Reuse | Resolution::Skip => continue,
                    Resolution::Cancel => return Ok(TransferOutcome::Cancelled),
                }
            }

            let wants_shadow = mac_zip
                && (rsrc.is_some()
                    || entry.attribs.has_prodos_types()
                    || entry.attribs.has_hfs_types());
            let shadow_name = if mac_zip {
                // any old shadow describes the file being replaced
                let shadow_name = appledouble::shadow_path(&name, sep);
                if let Some(old) = dest.find_child(EntryId::ROOT, &shadow_name) {
                    tracing::debug!("removing old '{}'", shadow_name);
                    dest.delete_entry(old)?;
                }
                wants_shadow.then_some(shadow_name)
            } else {
                None
            };

            let mode = if rsrc.is_some() && chars.has_resource_forks {
                CreateMode::Extended
            } else {
                CreateMode::File
            };
            let new_id = dest.create_entry(EntryId::ROOT, &name, mode, entry.attribs.file_type)?;
            let written = self.fill_record(
                dest,
                new_id,
                &name,
                &group,
                rsrc,
                shadow_name.as_deref(),
                entries.len(),
            );
            if let Err(err) = written {
                roll_back(dest, new_id, &name, &err);
                return Err(err);
            }

            let mut attribs = entry.attribs.clone();
            attribs.full_path_name = name.clone();
            attribs.path_sep = sep;
            dest.commit_attribs(new_id, &attribs)?;
            tracing::debug!("added record '{}'", name);
        }
        Ok(TransferOutcome::Completed)
    }

    /// Write the parts of a new file in order
    fn fill_file(
        &mut self,
        dest: &mut dyn Container,
        id: EntryId,
        parts: &[Part<'_>],
        new_path: &str,
        total: usize,
    ) -> Result<()> {
        for &(pos, part) in parts {
            self.copy_part(dest, id, part, new_path, percent(pos, total))?;
        }
        Ok(())
    }

    /// Write the forks of an archive record, plus its AppleDouble shadow
    #[allow(clippy::too_many_arguments)]
    fn fill_record(
        &mut self,
        dest: &mut dyn Container,
        id: EntryId,
        name: &str,
        group: &FileGroup<'_>,
        rsrc: Option<Part<'_>>,
        shadow_name: Option<&str>,
        total: usize,
    ) -> Result<()> {
        if let Some((pos, data)) = group.data {
            self.copy_part(dest, id, data, name, percent(pos, total))?;
        }
        let Some(shadow_name) = shadow_name else {
            if let Some((pos, part)) = rsrc {
                self.copy_part(dest, id, part, name, percent(pos, total))?;
            }
            return Ok(());
        };

        let fork = match rsrc {
            Some((pos, part)) => {
                let sep = dest.characteristics().dir_sep;
                self.report_progress(part, shadow_name, sep, percent(pos, total));
                let mut reader = self.open_source(part)?;
                let mut fork = Vec::new();
                reader.read_to_end(&mut fork)?;
                fork
            }
            None => Vec::new(),
        };
        let header = AppleDouble::from_attribs(&group.first.attribs, fork);
        write_shadow(dest, shadow_name, &group.first.attribs, &header.encode())
    }

    /// Decide what to do about `existing`, which has the incoming entry's name
    fn resolve(
        &mut self,
        dest: &mut dyn Container,
        existing: EntryId,
        entry: &TransferEntry,
    ) -> Result<Resolution> {
        let found = dest.entry(existing)?;
        let path = found.full_path().to_string();
        match (entry.attribs.is_directory, found.is_directory()) {
            (true, true) => Ok(Resolution::Reuse),
            (true, false) => Err(DiskArcError::DirectoryReplace(path)),
            (false, true) => Err(DiskArcError::FileReplace(path)),
            (false, false) => {
                let facts = CallbackFacts::FileNameExists {
                    path: path.clone(),
                    sep: dest.characteristics().dir_sep,
                };
                match self.handler.handle(&facts) {
                    CallbackResult::Cancel => {
                        tracing::debug!("transfer cancelled at '{}'", path);
                        Ok(Resolution::Cancel)
                    }
                    CallbackResult::Skip => {
                        tracing::debug!("skipping existing '{}'", path);
                        Ok(Resolution::Skip)
                    }
                    CallbackResult::Overwrite => {
                        if found.is_damaged || found.is_dubious {
                            return Err(DiskArcError::DamagedEntry(path));
                        }
                        tracing::debug!("overwriting '{}'", path);
                        dest.delete_entry(existing)?;
                        Ok(Resolution::Create)
                    }
                }
            }
        }
    }

    /// Copy one part into the matching fork of `id`
    fn copy_part(
        &mut self,
        dest: &mut dyn Container,
        id: EntryId,
        entry: &TransferEntry,
        new_path: &str,
        percent: u8,
    ) -> Result<()> {
        let new_sep = dest.characteristics().dir_sep;
        let mut writer = dest.open_write(id, entry.store_part)?;
        self.report_progress(entry, new_path, new_sep, percent);
        let mut reader = self.open_source(entry)?;
        let copied = io::copy(&mut reader, &mut writer)?;
        writer.flush()?;
        tracing::trace!("copied {} bytes ({})", copied, entry.store_part);
        Ok(())
    }

    fn open_source(&mut self, entry: &TransferEntry) -> Result<Box<dyn Read + '_>> {
        self.streams.open_stream(entry).ok_or_else(|| {
            DiskArcError::SourceUnavailable(format!(
                "{} ({})",
                entry.attribs.full_path_name, entry.part
            ))
        })
    }

    fn report_progress(
        &mut self,
        entry: &TransferEntry,
        new_path: &str,
        new_sep: char,
        percent: u8,
    ) {
        let facts = CallbackFacts::Progress {
            orig_path: entry.attribs.full_path_name.clone(),
            orig_sep: entry.attribs.path_sep,
            new_path: new_path.to_string(),
            new_sep,
            percent,
            part: entry.part,
        };
        self.handler.handle(&facts);
    }

    fn report_ignored(&mut self, entry: &TransferEntry) {
        tracing::debug!(
            "destination has no resource forks, dropping '{}'",
            entry.attribs.full_path_name
        );
        let facts = CallbackFacts::ResourceForkIgnored {
            path: entry.attribs.full_path_name.clone(),
            sep: entry.attribs.path_sep,
            part: entry.part,
        };
        self.handler.handle(&facts);
    }
}

fn percent(pos: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (pos * 100 / total).min(100) as u8
}

/// Remove an entry left incomplete by a failed copy
fn roll_back(dest: &mut dyn Container, id: EntryId, path: &str, cause: &DiskArcError) {
    tracing::warn!("removing partial '{}' after failure: {}", path, cause);
    if let Err(err) = dest.delete_entry(id) {
        tracing::warn!("unable to remove '{}': {}", path, err);
    }
}

/// Store an AppleDouble record, removing it again if it cannot be completed
fn write_shadow(
    dest: &mut dyn Container,
    name: &str,
    attribs: &FileAttribs,
    bytes: &[u8],
) -> Result<()> {
    let sep = dest.characteristics().dir_sep;
    let id = dest.create_entry(EntryId::ROOT, name, CreateMode::File, 0)?;
    let mut shadow_attribs = FileAttribs::file(name, sep);
    shadow_attribs.create_when = attribs.create_when;
    shadow_attribs.mod_when = attribs.mod_when;

    if let Err(err) = store_record(dest, id, bytes, &shadow_attribs) {
        roll_back(dest, id, name, &err);
        return Err(err);
    }
    Ok(())
}

fn store_record(
    dest: &mut dyn Container,
    id: EntryId,
    bytes: &[u8],
    attribs: &FileAttribs,
) -> Result<()> {
    dest.open_write(id, FilePart::DataFork)?.write_all(bytes)?;
    dest.commit_attribs(id, attribs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{
        find_by_path, walk_entries, ArchiveKind, FsProfile, MemArchive, MemFileSystem,
    };
    use crate::sample;
    use crate::xfer::{build, ContainerStreamSource, FixedResolution, SourceRef, TransferEntrySet};
    use std::io::Cursor;

    #[derive(Default)]
    struct Recorder {
        facts: Vec<CallbackFacts>,
        answer: Option<CallbackResult>,
    }

    impl TransferHandler for Recorder {
        fn handle(&mut self, facts: &CallbackFacts) -> CallbackResult {
            self.facts.push(facts.clone());
            self.answer.unwrap_or(CallbackResult::Cancel)
        }
    }

    fn sample_set(options: &TransferOptions) -> (MemFileSystem, TransferEntrySet) {
        let fs = sample::sample_volume(FsProfile::ProDos).unwrap();
        let list = walk_entries(&fs, EntryId::ROOT).unwrap();
        let set = build(&fs, &list, None, options);
        (fs, set)
    }

    fn read_fork(c: &dyn Container, path: &str, part: FilePart) -> Vec<u8> {
        let id = find_by_path(c, path, '/').unwrap();
        let mut out = Vec::new();
        c.open_read(id, part).unwrap().read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 4), 0);
        assert_eq!(percent(3, 4), 75);
        assert_eq!(percent(0, 0), 100);
    }

    #[test]
    fn test_copy_prodos_to_hfs() {
        let options = TransferOptions::default();
        let (src, set) = sample_set(&options);
        let mut dest = MemFileSystem::new(FsProfile::Hfs, "Dest");
        let mut handler = Recorder::default();
        let mut streams = ContainerStreamSource::new(&src);

        let outcome = TransferWorker::new(options, &mut handler, &mut streams)
            .transfer(&mut dest, None, set.direct_entries())
            .unwrap();
        assert_eq!(outcome, TransferOutcome::Completed);

        assert_eq!(read_fork(&dest, "DataRsrc", FilePart::RsrcFork), sample::pattern(5432, 0x28));
        let id = find_by_path(&dest, "subdir1/subdir2/DataOnly", '/').unwrap();
        let attribs = dest.entry(id).unwrap().attribs;
        assert_eq!(attribs.full_path_name, "subdir1:subdir2:DataOnly");
        // HFS keeps the sample's own HFS types and drops the ProDOS ones
        assert_eq!(attribs.hfs_file_type, sample::HFS_FILE_TYPE);
        assert_eq!(attribs.file_type, 0);
        assert_eq!(attribs.create_when, sample::create_when());

        let progress = handler
            .facts
            .iter()
            .filter(|f| matches!(f, CallbackFacts::Progress { .. }))
            .count();
        assert_eq!(progress, 7);
    }

    #[test]
    fn test_target_dir_must_be_directory() {
        let options = TransferOptions::default();
        let (src, set) = sample_set(&options);
        let mut dest = sample::sample_volume(FsProfile::ProDos).unwrap();
        let file = find_by_path(&dest, "DataOnly", '/').unwrap();
        let mut handler = Recorder::default();
        let mut streams = ContainerStreamSource::new(&src);

        let result = TransferWorker::new(options, &mut handler, &mut streams).transfer(
            &mut dest,
            Some(file),
            set.direct_entries(),
        );
        assert!(matches!(result, Err(DiskArcError::NotADirectory(_))));
        assert!(handler.facts.is_empty());
    }

    #[test]
    fn test_into_target_dir() {
        let options = TransferOptions::default();
        let (src, set) = sample_set(&options);
        let mut dest = MemFileSystem::new(FsProfile::ProDos, "DEST");
        let target = create_subdirectories(&mut dest, EntryId::ROOT, "into", '/').unwrap();
        let mut handler = Recorder::default();
        let mut streams = ContainerStreamSource::new(&src);

        TransferWorker::new(options, &mut handler, &mut streams)
            .transfer(&mut dest, Some(target), set.direct_entries())
            .unwrap();
        assert!(find_by_path(&dest, "into/subdir1/DataOnly", '/').is_ok());
        assert_eq!(dest.children(EntryId::ROOT).unwrap(), vec![target]);
    }

    #[test]
    fn test_directory_collides_with_file() {
        let options = TransferOptions::default();
        let (src, set) = sample_set(&options);
        let mut dest = MemFileSystem::new(FsProfile::ProDos, "DEST");
        dest.create_entry(EntryId::ROOT, "subdir1", CreateMode::File, 0)
            .unwrap();
        let mut handler = Recorder::default();
        let mut streams = ContainerStreamSource::new(&src);

        let result = TransferWorker::new(options, &mut handler, &mut streams).transfer(
            &mut dest,
            None,
            set.direct_entries(),
        );
        assert!(matches!(result, Err(DiskArcError::DirectoryReplace(_))));
    }

    #[test]
    fn test_file_collides_with_directory() {
        let options = TransferOptions::default();
        let (src, set) = sample_set(&options);
        let mut dest = MemFileSystem::new(FsProfile::ProDos, "DEST");
        create_subdirectories(&mut dest, EntryId::ROOT, "DataOnly", '/').unwrap();
        let mut handler = Recorder::default();
        let mut streams = ContainerStreamSource::new(&src);

        let result = TransferWorker::new(options, &mut handler, &mut streams).transfer(
            &mut dest,
            None,
            set.direct_entries(),
        );
        assert!(matches!(result, Err(DiskArcError::FileReplace(_))));
    }

    #[test]
    fn test_pair_requires_matching_key() {
        let data_entry = |part: FilePart, file_id: usize| TransferEntry {
            attribs: FileAttribs::file("X", '/'),
            part,
            store_part: part,
            extract_path: "X".to_string(),
            extract_sep: '/',
            output_length: 1,
            file_id,
            source: SourceRef::None,
        };
        let entries = vec![
            data_entry(FilePart::DataFork, 1),
            data_entry(FilePart::RsrcFork, 2),
        ];
        let (group, next) = FileGroup::take(&entries, 0);
        assert!(group.rsrc.is_none());
        assert_eq!(next, 1);
        let (group, next) = FileGroup::take(&entries, 1);
        assert!(group.data.is_none());
        assert_eq!(next, 2);
    }

    #[test]
    fn test_generator_closure() {
        let entry = TransferEntry {
            attribs: FileAttribs::file("NOTE", '/').with_prodos_types(0x04, 0),
            part: FilePart::DataFork,
            store_part: FilePart::DataFork,
            extract_path: "NOTE".to_string(),
            extract_sep: '/',
            output_length: 5,
            file_id: 1,
            source: SourceRef::None,
        };
        let mut dest = MemFileSystem::new(FsProfile::Dos33, "DOS");
        let mut handler = FixedResolution(CallbackResult::Skip);
        let mut streams = |_: &TransferEntry| -> Option<Box<dyn Read>> {
            Some(Box::new(Cursor::new(b"HELLO".to_vec())))
        };

        TransferWorker::new(TransferOptions::default(), &mut handler, &mut streams)
            .transfer(&mut dest, None, &[entry])
            .unwrap();
        // DOS text is stored with the high bit set and read back plain
        assert_eq!(read_fork(&dest, "NOTE", FilePart::RawData), b"\xc8\xc5\xcc\xcc\xcf".to_vec());
        assert_eq!(read_fork(&dest, "NOTE", FilePart::DataFork), b"HELLO".to_vec());
    }

    #[test]
    fn test_archive_destination() {
        let options = TransferOptions::default();
        let (src, set) = sample_set(&options);
        let mut dest = MemArchive::new(ArchiveKind::NuFx);
        let mut handler = Recorder::default();
        let mut streams = ContainerStreamSource::new(&src);

        TransferWorker::new(options, &mut handler, &mut streams)
            .transfer(&mut dest, None, set.direct_entries())
            .unwrap();
        assert_eq!(dest.record_count(), 5);
        let id = find_by_path(&dest, "subdir1/subdir2/DataOnly", '/').unwrap();
        let entry = dest.entry(id).unwrap();
        assert_eq!(entry.full_path(), "subdir1:subdir2:DataOnly");
        assert_eq!(entry.attribs.aux_type, sample::AUX_TYPE);
        assert_eq!(read_fork(&dest, "RsrcOnly", FilePart::RsrcFork).len(), 4321);
    }

    #[test]
    fn test_archive_destination_read_only() {
        let options = TransferOptions::default();
        let (src, set) = sample_set(&options);
        let mut dest = MemArchive::new(ArchiveKind::Zip);
        dest.set_read_only(true);
        let mut handler = Recorder::default();
        let mut streams = ContainerStreamSource::new(&src);

        let result = TransferWorker::new(options, &mut handler, &mut streams).transfer(
            &mut dest,
            None,
            set.direct_entries(),
        );
        assert!(matches!(result, Err(DiskArcError::ReadOnly { damaged: false })));
    }

    #[test]
    fn test_zip_without_mac_zip_drops_rsrc() {
        let options = TransferOptions::default();
        let (src, set) = sample_set(&options);
        let mut dest = MemArchive::new(ArchiveKind::Zip);
        let mut handler = Recorder::default();
        let mut streams = ContainerStreamSource::new(&src);

        TransferWorker::new(options, &mut handler, &mut streams)
            .transfer(&mut dest, None, set.direct_entries())
            .unwrap();
        // RsrcOnly still has an (empty) data fork on ProDOS, so it is kept
        assert_eq!(dest.record_count(), 5);
        assert!(handler
            .facts
            .iter()
            .all(|f| !matches!(f, CallbackFacts::ResourceForkIgnored { .. })));
        assert!(dest.find_child(EntryId::ROOT, "__MACOSX/._DataRsrc").is_none());
    }

    #[test]
    fn test_mac_zip_shadow_records() {
        let options = TransferOptions::default().mac_zip(true);
        let (src, set) = sample_set(&options);
        let mut dest = MemArchive::new(ArchiveKind::Zip);
        let mut handler = Recorder::default();
        let mut streams = ContainerStreamSource::new(&src);

        TransferWorker::new(options, &mut handler, &mut streams)
            .transfer(&mut dest, None, set.direct_entries())
            .unwrap();
        // five files plus one shadow each (every sample file has types)
        assert_eq!(dest.record_count(), 10);
        let raw = read_fork(&dest, "__MACOSX/._DataRsrc", FilePart::DataFork);
        let header = AppleDouble::decode(&raw).unwrap();
        assert_eq!(header.rsrc_fork, sample::pattern(5432, 0x28));
        assert_eq!(header.hfs_file_type, sample::HFS_FILE_TYPE);
        assert!(dest
            .find_child(EntryId::ROOT, "__MACOSX/subdir1/subdir2/._DataOnly")
            .is_some());
    }

    #[test]
    fn test_mac_zip_overwrite_removes_old_shadow() {
        let options = TransferOptions::default().mac_zip(true);
        let (src, set) = sample_set(&options);
        let mut dest = MemArchive::new(ArchiveKind::Zip);
        let mut handler = Recorder::default();
        let mut streams = ContainerStreamSource::new(&src);
        TransferWorker::new(options, &mut handler, &mut streams)
            .transfer(&mut dest, None, set.direct_entries())
            .unwrap();
        assert!(dest.find_child(EntryId::ROOT, "__MACOSX/._DataRsrc").is_some());

        // plain replacement: no types and no resource fork, so no new shadow
        let plain = TransferEntry {
            attribs: FileAttribs::file("DataRsrc", '/'),
            part: FilePart::DataFork,
            store_part: FilePart::DataFork,
            extract_path: "DataRsrc".to_string(),
            extract_sep: '/',
            output_length: 3,
            file_id: 1,
            source: SourceRef::None,
        };
        let mut handler = FixedResolution(CallbackResult::Overwrite);
        let mut streams = |_: &TransferEntry| -> Option<Box<dyn Read>> {
            Some(Box::new(Cursor::new(b"new".to_vec())))
        };
        TransferWorker::new(options, &mut handler, &mut streams)
            .transfer(&mut dest, None, &[plain])
            .unwrap();

        assert!(dest.find_child(EntryId::ROOT, "__MACOSX/._DataRsrc").is_none());
        assert_eq!(dest.record_count(), 9);
        assert_eq!(read_fork(&dest, "DataRsrc", FilePart::DataFork), b"new".to_vec());

        // restoring the archive yields the plain file, not the old type and fork
        let list = walk_entries(&dest, EntryId::ROOT).unwrap();
        let restored = build(&dest, &list, None, &options);
        let mut volume = MemFileSystem::new(FsProfile::ProDos, "BACK");
        let mut handler = Recorder::default();
        let mut streams = ContainerStreamSource::new(&dest);
        TransferWorker::new(options, &mut handler, &mut streams)
            .transfer(&mut volume, None, restored.direct_entries())
            .unwrap();
        let id = find_by_path(&volume, "DataRsrc", '/').unwrap();
        let entry = volume.entry(id).unwrap();
        assert_eq!(entry.attribs.file_type, 0);
        assert_eq!(entry.attribs.rsrc_length(), None);
        assert_eq!(read_fork(&volume, "DataRsrc", FilePart::DataFork), b"new".to_vec());
    }
}
