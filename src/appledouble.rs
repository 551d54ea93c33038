/// AppleDouble header files for MacZip archives
///
/// ZIP archives cannot hold resource forks or Mac file types, so MacZip keeps
/// them in a sibling record `__MACOSX/<dir>/._<name>` in AppleDouble format.
/// Only the entries needed for a transfer are handled: resource fork, Finder
/// info (HFS type/creator) and ProDOS file info.

use crate::container::attribs::{split_path, FileAttribs};
use crate::error::{DiskArcError, Result};

/// Directory that holds the AppleDouble shadow records
pub const MACOSX_DIR: &str = "__MACOSX";
/// Prefix of a shadow record's leaf name
pub const SHADOW_PREFIX: &str = "._";

/// AppleDouble magic number
pub const MAGIC: u32 = 0x0005_1607;
/// AppleDouble version 2
pub const VERSION: u32 = 0x0002_0000;

/// Entry id: resource fork
pub const ENTRY_RSRC_FORK: u32 = 2;
/// Entry id: Finder info
pub const ENTRY_FINDER_INFO: u32 = 9;
/// Entry id: ProDOS file info
pub const ENTRY_PRODOS_INFO: u32 = 11;

const HEADER_SIZE: usize = 26;
const ENTRY_COUNT_OFFSET: usize = 24;
const DESCRIPTOR_SIZE: usize = 12;
/// Size of a Finder info block
pub const FINDER_INFO_SIZE: usize = 32;
/// Size of a ProDOS file info block
pub const PRODOS_INFO_SIZE: usize = 8;

/// ProDOS file info as stored in entry 11
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProDosInfo {
    /// Access flags
    pub access: u8,
    /// File type
    pub file_type: u8,
    /// Aux type
    pub aux_type: u16,
}

impl ProDosInfo {
    /// Serialize as the 8-byte AppleDouble entry body
    pub fn encode(&self) -> [u8; PRODOS_INFO_SIZE] {
        let mut body = [0u8; PRODOS_INFO_SIZE];
        body[0..2].copy_from_slice(&u16::from(self.access).to_be_bytes());
        body[2..4].copy_from_slice(&u16::from(self.file_type).to_be_bytes());
        body[4..8].copy_from_slice(&u32::from(self.aux_type).to_be_bytes());
        body
    }

    /// Parse an entry body; `None` if it is too short
    pub fn decode(body: &[u8]) -> Option<Self> {
        if body.len() < PRODOS_INFO_SIZE {
            return None;
        }
        Some(ProDosInfo {
            access: body[1],
            file_type: body[3],
            aux_type: read_u32(body, 4) as u16,
        })
    }
}

/// Finder info block holding an HFS type and creator
pub fn encode_finder_info(hfs_file_type: u32, hfs_creator: u32) -> [u8; FINDER_INFO_SIZE] {
    let mut finder = [0u8; FINDER_INFO_SIZE];
    finder[0..4].copy_from_slice(&hfs_file_type.to_be_bytes());
    finder[4..8].copy_from_slice(&hfs_creator.to_be_bytes());
    finder
}

/// HFS type and creator from a Finder info block; `None` if it is too short
pub fn decode_finder_info(body: &[u8]) -> Option<(u32, u32)> {
    if body.len() < 8 {
        return None;
    }
    Some((read_u32(body, 0), read_u32(body, 4)))
}

/// Decoded AppleDouble header file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppleDouble {
    /// HFS file type
    pub hfs_file_type: u32,
    /// HFS creator
    pub hfs_creator: u32,
    /// ProDOS file info, if present
    pub prodos: Option<ProDosInfo>,
    /// Resource fork contents
    pub rsrc_fork: Vec<u8>,
}

impl AppleDouble {
    /// Build a header file for an entry. ProDOS types are also folded into the
    /// Finder info when the entry has no HFS types of its own.
    pub fn from_attribs(attribs: &FileAttribs, rsrc_fork: Vec<u8>) -> Self {
        let (_, _, hfs_file_type, hfs_creator) = attribs.types_for(false, true);
        let prodos = attribs.has_prodos_types().then_some(ProDosInfo {
            access: attribs.access,
            file_type: attribs.file_type,
            aux_type: attribs.aux_type,
        });
        Self {
            hfs_file_type,
            hfs_creator,
            prodos,
            rsrc_fork,
        }
    }

    /// Copy the type information onto a set of attributes
    pub fn apply_to(&self, attribs: &mut FileAttribs) {
        attribs.hfs_file_type = self.hfs_file_type;
        attribs.hfs_creator = self.hfs_creator;
        if let Some(info) = self.prodos {
            attribs.file_type = info.file_type;
            attribs.aux_type = info.aux_type;
            attribs.access = info.access;
        }
    }

    /// Serialize to AppleDouble v2
    pub fn encode(&self) -> Vec<u8> {
        let finder = encode_finder_info(self.hfs_file_type, self.hfs_creator);
        let mut entries: Vec<(u32, Vec<u8>)> = vec![(ENTRY_FINDER_INFO, finder.to_vec())];
        if let Some(info) = self.prodos {
            entries.push((ENTRY_PRODOS_INFO, info.encode().to_vec()));
        }
        entries.push((ENTRY_RSRC_FORK, self.rsrc_fork.clone()));

        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.extend_from_slice(&VERSION.to_be_bytes());
        out.extend_from_slice(&[0u8; 16]);
        out.extend_from_slice(&(entries.len() as u16).to_be_bytes());

        let mut offset = HEADER_SIZE + entries.len() * DESCRIPTOR_SIZE;
        for (id, body) in &entries {
            out.extend_from_slice(&id.to_be_bytes());
            out.extend_from_slice(&(offset as u32).to_be_bytes());
            out.extend_from_slice(&(body.len() as u32).to_be_bytes());
            offset += body.len();
        }
        for (_, body) in entries {
            out.extend_from_slice(&body);
        }
        out
    }

    /// Parse an AppleDouble v2 header file
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(DiskArcError::parse(0, "AppleDouble header too short"));
        }
        if read_u32(data, 0) != MAGIC {
            return Err(DiskArcError::parse(0, "Bad AppleDouble magic"));
        }
        if read_u32(data, 4) != VERSION {
            return Err(DiskArcError::parse(4, "Unsupported AppleDouble version"));
        }

        let count = u16::from_be_bytes([data[ENTRY_COUNT_OFFSET], data[ENTRY_COUNT_OFFSET + 1]]);
        let mut result = AppleDouble::default();
        for i in 0..count as usize {
            let desc = HEADER_SIZE + i * DESCRIPTOR_SIZE;
            if desc + DESCRIPTOR_SIZE > data.len() {
                return Err(DiskArcError::parse(desc, "Truncated entry descriptor"));
            }
            let id = read_u32(data, desc);
            let start = read_u32(data, desc + 4) as usize;
            let len = read_u32(data, desc + 8) as usize;
            let body = start
                .checked_add(len)
                .and_then(|end| data.get(start..end))
                .ok_or_else(|| DiskArcError::parse(desc, "Entry extends past end of file"))?;

            match id {
                ENTRY_RSRC_FORK => result.rsrc_fork = body.to_vec(),
                ENTRY_FINDER_INFO => {
                    if let Some((file_type, creator)) = decode_finder_info(body) {
                        result.hfs_file_type = file_type;
                        result.hfs_creator = creator;
                    }
                }
                ENTRY_PRODOS_INFO => result.prodos = ProDosInfo::decode(body),
                _ => tracing::trace!("skipping AppleDouble entry {} ({} bytes)", id, len),
            }
        }
        Ok(result)
    }
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Shadow record path for a file, e.g. `a/b` becomes `__MACOSX/a/._b`
pub fn shadow_path(path: &str, sep: char) -> String {
    let mut parts = split_path(path, sep);
    let leaf = parts.pop().unwrap_or_default();
    let mut out = String::from(MACOSX_DIR);
    for part in parts {
        out.push(sep);
        out.push_str(part);
    }
    out.push(sep);
    out.push_str(SHADOW_PREFIX);
    out.push_str(leaf);
    out
}

/// If `path` names a shadow record, the path of the file it describes
pub fn shadowed_path(path: &str, sep: char) -> Option<String> {
    let mut parts = split_path(path, sep);
    if parts.len() < 2 || parts[0] != MACOSX_DIR {
        return None;
    }
    let leaf = parts.pop()?.strip_prefix(SHADOW_PREFIX)?;
    if leaf.is_empty() {
        return None;
    }
    let mut out: Vec<&str> = parts[1..].to_vec();
    out.push(leaf);
    Some(out.join(&sep.to_string()))
}
