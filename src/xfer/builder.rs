/// Transfer entry set builder
///
/// Turns a pre-order list of source entries into transfer entries: applies
/// re-rooting and path stripping, splits files into data and resource forks,
/// and prepares the NAPS-encoded foreign view. Host files with NAPS names are
/// imported with their types, and `r` files become resource forks again.

use crate::appledouble::{self, AppleDouble};
use crate::container::attribs::{split_path, TYPE_TXT};
use crate::container::{Container, ContainerKind, EntryId, FileAttribs, FileEntry, FilePart};
use crate::error::Result;
use crate::naps;
use crate::xfer::{PreserveMode, SourceRef, TransferEntry, TransferEntrySet, TransferOptions};
use std::collections::{HashMap, HashSet};
use std::io::Read;

/// Build the transfer entries for `entries`, which must list directories
/// before their contents (see [`crate::container::walk_entries`]).
///
/// With `reroot`, paths are made relative to that directory and anything
/// outside it is left out. Entries that cannot be read are skipped with a
/// warning.
pub fn build(
    source: &dyn Container,
    entries: &[EntryId],
    reroot: Option<EntryId>,
    options: &TransferOptions,
) -> TransferEntrySet {
    let chars = source.characteristics();
    let base: Vec<String> = match reroot.map(|id| source.entry(id)) {
        Some(Ok(entry)) => entry.attribs.components().iter().map(|c| c.to_string()).collect(),
        Some(Err(err)) => {
            tracing::warn!("cannot read reroot base: {}", err);
            return TransferEntrySet::default();
        }
        None => Vec::new(),
    };

    let mac_zip = options.mac_zip && chars.zip_like;
    let shadows = if mac_zip {
        find_shadows(source, entries)
    } else {
        HashMap::new()
    };
    let naps_import = chars.kind == ContainerKind::Host && options.preserve == PreserveMode::Naps;
    let naps_files = if naps_import {
        NapsFiles::scan(source, entries)
    } else {
        NapsFiles::default()
    };

    let mut set = SetBuilder {
        options,
        sep: chars.dir_sep,
        data_part: if options.raw_mode && chars.has_raw_mode {
            FilePart::RawData
        } else {
            FilePart::DataFork
        },
        cooks_text: chars.has_raw_mode,
        next_id: 0,
        foreign_dirs: HashSet::new(),
        set: TransferEntrySet::default(),
    };

    for &id in entries {
        if Some(id) == reroot {
            continue;
        }
        let mut entry = match source.entry(id) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!("skipping entry #{}: {}", id.0, err);
                continue;
            }
        };
        let mut naps_rsrc = None;
        if naps_import && !entry.is_directory() {
            match naps_files.import(&mut entry) {
                NapsImport::Plain => {}
                NapsImport::Merged => continue,
                NapsImport::Typed(rsrc) => naps_rsrc = rsrc,
            }
        }
        if mac_zip && appledouble::shadowed_path(entry.full_path(), chars.dir_sep).is_some() {
            continue;
        }
        if entry.is_directory() && options.strip_paths {
            continue;
        }

        let components = entry.attribs.components();
        if components.len() <= base.len()
            || !components.iter().zip(&base).all(|(a, b)| *a == b.as_str())
        {
            tracing::trace!("'{}' is outside the reroot base", entry.full_path());
            continue;
        }
        let rel = &components[base.len()..];
        let extract_path = if options.strip_paths {
            rel[rel.len() - 1].to_string()
        } else {
            rel.join(&chars.dir_sep.to_string())
        };

        let mut attribs = entry.attribs.clone();
        let mut rsrc = entry
            .has_rsrc_fork
            .then(|| (SourceRef::Entry(id), entry.attribs.rsrc_length().unwrap_or(0)));
        if naps_rsrc.is_some() {
            rsrc = naps_rsrc;
        }
        if let Some(&shadow) = shadows.get(entry.full_path()) {
            match read_shadow(source, shadow) {
                Ok(header) => {
                    header.apply_to(&mut attribs);
                    if !header.rsrc_fork.is_empty() {
                        rsrc = Some((SourceRef::AppleDouble(shadow), header.rsrc_fork.len() as u64));
                    }
                }
                Err(err) => tracing::warn!("ignoring AppleDouble for '{}': {}", entry.full_path(), err),
            }
        }

        set.add(&entry, attribs, extract_path, rsrc);
    }

    tracing::debug!(
        "built {} transfer entries ({} foreign) from {}",
        set.set.direct.len(),
        set.set.foreign.len(),
        chars.name
    );
    set.set
}

/// Map the paths of files described by `__MACOSX` records to those records.
/// Records whose file is missing are reported and left out.
fn find_shadows(source: &dyn Container, entries: &[EntryId]) -> HashMap<String, EntryId> {
    let sep = source.characteristics().dir_sep;
    let mut shadows = HashMap::new();
    let mut files = HashSet::new();
    for &id in entries {
        let Ok(entry) = source.entry(id) else {
            continue;
        };
        match appledouble::shadowed_path(entry.full_path(), sep) {
            Some(target) => {
                shadows.insert(target, id);
            }
            None => {
                files.insert(entry.attribs.full_path_name);
            }
        }
    }
    shadows.retain(|target, _| {
        let found = files.contains(target);
        if !found {
            tracing::warn!("ignoring AppleDouble record for missing file '{}'", target);
        }
        found
    });
    shadows
}

/// How a host file with a NAPS name enters the transfer
enum NapsImport {
    /// Name has no NAPS suffix
    Plain,
    /// Resource fork file already paired with its data file
    Merged,
    /// Renamed and typed, with the resource fork to pair with it
    Typed(Option<(SourceRef, u64)>),
}

/// NAPS-named host files, keyed by their decoded pathnames
#[derive(Default)]
struct NapsFiles {
    data: HashSet<String>,
    rsrc: HashMap<String, (EntryId, u64)>,
}

impl NapsFiles {
    fn scan(source: &dyn Container, entries: &[EntryId]) -> Self {
        let mut files = NapsFiles::default();
        for &id in entries {
            let Ok(entry) = source.entry(id) else {
                continue;
            };
            if entry.is_directory() {
                continue;
            }
            let Some(name) = naps::decode(entry.attribs.file_name_only()) else {
                continue;
            };
            let mut attribs = entry.attribs.clone();
            attribs.set_file_name_only(&name.base);
            if name.is_rsrc {
                let length = entry.attribs.data_length().unwrap_or(0);
                files.rsrc.insert(attribs.full_path_name, (id, length));
            } else {
                files.data.insert(attribs.full_path_name);
            }
        }
        files
    }

    /// Strip the suffix from `entry`, apply its types and find its resource fork
    fn import(&self, entry: &mut FileEntry) -> NapsImport {
        let Some(name) = naps::decode(entry.attribs.file_name_only()) else {
            return NapsImport::Plain;
        };
        let mut attribs = entry.attribs.clone();
        attribs.set_file_name_only(&name.base);
        name.types.apply_to(&mut attribs);

        let rsrc = if name.is_rsrc {
            if self.data.contains(&attribs.full_path_name) {
                return NapsImport::Merged;
            }
            let length = entry.attribs.data_length().unwrap_or(0);
            attribs.set_fork_lengths(None, Some(length));
            entry.has_data_fork = false;
            Some((SourceRef::DataForkOf(entry.id), length))
        } else {
            let rsrc = self.rsrc.get(&attribs.full_path_name);
            attribs.set_fork_lengths(entry.attribs.data_length(), rsrc.map(|&(_, len)| len));
            rsrc.map(|&(id, len)| (SourceRef::DataForkOf(id), len))
        };
        tracing::trace!("NAPS import '{}' as '{}'", entry.full_path(), attribs.full_path_name);
        entry.has_rsrc_fork = rsrc.is_some();
        entry.attribs = attribs;
        NapsImport::Typed(rsrc)
    }
}

fn read_shadow(source: &dyn Container, id: EntryId) -> Result<AppleDouble> {
    let mut raw = Vec::new();
    source.open_read(id, FilePart::DataFork)?.read_to_end(&mut raw)?;
    AppleDouble::decode(&raw)
}

struct SetBuilder<'o> {
    options: &'o TransferOptions,
    sep: char,
    data_part: FilePart,
    cooks_text: bool,
    next_id: usize,
    foreign_dirs: HashSet<String>,
    set: TransferEntrySet,
}

impl SetBuilder<'_> {
    fn new_id(&mut self) -> usize {
        self.next_id += 1;
        self.next_id
    }

    fn entry(
        &self,
        attribs: &FileAttribs,
        part: FilePart,
        extract_path: String,
        output_length: i64,
        file_id: usize,
        source: SourceRef,
    ) -> TransferEntry {
        TransferEntry {
            attribs: attribs.clone(),
            part,
            store_part: part,
            extract_path,
            extract_sep: self.sep,
            output_length,
            file_id,
            source,
        }
    }

    fn add(
        &mut self,
        entry: &FileEntry,
        attribs: FileAttribs,
        extract_path: String,
        rsrc: Option<(SourceRef, u64)>,
    ) {
        let file_id = self.new_id();
        if attribs.is_directory {
            self.add_foreign_parents(&extract_path);
            let dir = self.entry(
                &attribs,
                FilePart::Unknown,
                extract_path.clone(),
                -1,
                file_id,
                SourceRef::Entry(entry.id),
            );
            if self.foreign_dirs.insert(extract_path) {
                self.set.foreign.push(dir.clone());
            }
            self.set.direct.push(dir);
            return;
        }

        self.add_foreign_parents(&extract_path);
        let data_part = if entry.is_disk_image {
            FilePart::DiskImage
        } else {
            self.data_part
        };
        // whole-entry parts never carry a resource fork
        let rsrc = if data_part == FilePart::DataFork {
            rsrc
        } else {
            None
        };

        if entry.has_data_fork || rsrc.is_none() {
            let cooked =
                self.cooks_text && data_part == FilePart::DataFork && attribs.file_type == TYPE_TXT;
            let length = if cooked {
                -1
            } else {
                attribs.data_length().unwrap_or(0) as i64
            };
            let data = self.entry(
                &attribs,
                data_part,
                extract_path.clone(),
                length,
                file_id,
                SourceRef::Entry(entry.id),
            );
            let mut foreign = data.clone();
            if self.options.preserve == PreserveMode::Naps {
                foreign.extract_path.push_str(&naps::suffix_for(&attribs, false));
            }
            self.set.direct.push(data);
            self.set.foreign.push(foreign);
        }

        if let Some((source, length)) = rsrc {
            let rsrc = self.entry(
                &attribs,
                FilePart::RsrcFork,
                extract_path.clone(),
                length as i64,
                file_id,
                source,
            );
            match self.options.preserve {
                PreserveMode::None => {}
                PreserveMode::Naps => {
                    let mut foreign = rsrc.clone();
                    foreign.file_id = self.new_id();
                    foreign.store_part = FilePart::DataFork;
                    foreign.extract_path.push_str(&naps::suffix_for(&attribs, true));
                    self.set.foreign.push(foreign);
                }
                PreserveMode::Host => self.set.foreign.push(rsrc.clone()),
            }
            self.set.direct.push(rsrc);
        }
    }

    /// Foreign destinations get every intermediate directory as an entry
    fn add_foreign_parents(&mut self, extract_path: &str) {
        let components = split_path(extract_path, self.sep);
        let sep = self.sep.to_string();
        for depth in 1..components.len() {
            let path = components[..depth].join(&sep);
            if !self.foreign_dirs.insert(path.clone()) {
                continue;
            }
            let file_id = self.new_id();
            let dir = self.entry(
                &FileAttribs::directory(path.clone(), self.sep),
                FilePart::Unknown,
                path,
                -1,
                file_id,
                SourceRef::None,
            );
            self.set.foreign.push(dir);
        }
    }
}
