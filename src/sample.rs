/// Sample file set
///
/// A small, fixed set of files exercising every fork combination:
///
/// | Path                       | Data  | Resource |
/// |----------------------------|-------|----------|
/// | `DataOnly`                 | 1234  | -        |
/// | `RsrcOnly`                 | -     | 4321     |
/// | `DataRsrc`                 | 2345  | 5432     |
/// | `subdir1/DataOnly`         | 1234  | -        |
/// | `subdir1/subdir2/DataOnly` | 1234  | -        |
///
/// Every file has ProDOS type `$06`/`$12CD`, HFS type `TEST`/`#CP2` and fixed
/// dates.

use crate::container::attribs::{directory_name, file_name, FileAttribs};
use crate::container::{
    create_subdirectories, ArchiveKind, Container, CreateMode, EntryId, FilePart, FsProfile,
    MemArchive, MemFileSystem,
};
use crate::error::Result;
use chrono::{NaiveDate, NaiveDateTime};
use std::io::Write;

/// Sample file type
pub const FILE_TYPE: u8 = 0x06;
/// Sample aux type
pub const AUX_TYPE: u16 = 0x12cd;
/// Sample HFS file type
pub const HFS_FILE_TYPE: u32 = u32::from_be_bytes(*b"TEST");
/// Sample HFS creator
pub const HFS_CREATOR: u32 = u32::from_be_bytes(*b"#CP2");

/// (path, data length, resource length)
pub const SAMPLE_FILES: &[(&str, Option<usize>, Option<usize>)] = &[
    ("DataOnly", Some(1234), None),
    ("RsrcOnly", None, Some(4321)),
    ("DataRsrc", Some(2345), Some(5432)),
    ("subdir1/DataOnly", Some(1234), None),
    ("subdir1/subdir2/DataOnly", Some(1234), None),
];

/// Creation date of every sample file
pub fn create_when() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1977, 6, 1)?.and_hms_opt(1, 2, 0)
}

/// Modification date of every sample file
pub fn mod_when() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1986, 9, 15)?.and_hms_opt(4, 5, 0)
}

/// Recognizable fork contents: `len` bytes counting up from `seed`
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_add(seed)).collect()
}

fn sample_attribs(path: &str) -> FileAttribs {
    FileAttribs::file(path, '/')
        .with_prodos_types(FILE_TYPE, AUX_TYPE)
        .with_hfs_types(HFS_FILE_TYPE, HFS_CREATOR)
        .with_dates(create_when(), mod_when())
}

/// Populate a filesystem volume with the sample set. Flat volumes get the
/// top-level files only and volumes without resource forks skip `RsrcOnly`
/// and the resource fork of `DataRsrc`.
pub fn populate(fs: &mut dyn Container) -> Result<()> {
    let chars = fs.characteristics().clone();
    for (seed, &(path, data_len, rsrc_len)) in SAMPLE_FILES.iter().enumerate() {
        let dir_path = directory_name(path, '/');
        if !dir_path.is_empty() && !chars.is_hierarchical {
            continue;
        }
        let rsrc_len = rsrc_len.filter(|_| chars.has_resource_forks);
        if data_len.is_none() && rsrc_len.is_none() {
            continue;
        }

        let dir = create_subdirectories(fs, EntryId::ROOT, dir_path, '/')?;
        let name = fs.adjust_name(file_name(path, '/'));
        let mode = if rsrc_len.is_some() {
            CreateMode::Extended
        } else {
            CreateMode::File
        };
        let id = fs.create_entry(dir, &name, mode, FILE_TYPE)?;
        let seed = seed as u8 * 0x10;
        if let Some(len) = data_len {
            fs.open_write(id, FilePart::DataFork)?.write_all(&pattern(len, seed))?;
        }
        if let Some(len) = rsrc_len {
            fs.open_write(id, FilePart::RsrcFork)?.write_all(&pattern(len, seed + 8))?;
        }

        let mut attribs = sample_attribs(path);
        attribs.set_file_name_only(&name);
        fs.commit_attribs(id, &attribs)?;
    }
    Ok(())
}

/// Fresh in-memory volume holding the sample set
pub fn sample_volume(profile: FsProfile) -> Result<MemFileSystem> {
    let mut fs = MemFileSystem::new(profile, "SAMPLE");
    populate(&mut fs)?;
    Ok(fs)
}

/// Fresh in-memory archive holding the sample set. Records without a data
/// fork have none; ZIP archives skip the resource forks.
pub fn sample_archive(kind: ArchiveKind) -> Result<MemArchive> {
    let mut arc = MemArchive::new(kind);
    let has_rsrc = arc.characteristics().has_resource_forks;
    for (seed, &(path, data_len, rsrc_len)) in SAMPLE_FILES.iter().enumerate() {
        let seed = seed as u8 * 0x10;
        let data = data_len.map(|len| pattern(len, seed));
        let rsrc = rsrc_len
            .filter(|_| has_rsrc)
            .map(|len| pattern(len, seed + 8));
        if data.is_none() && rsrc.is_none() {
            continue;
        }
        arc.add_record(sample_attribs(path), data, rsrc)?;
    }
    Ok(arc)
}
