/// NAPS filename suffix codec
///
/// Preserves type metadata and fork identity in a plain filename when the
/// destination cannot store them: `NAME#0612cd` for ProDOS type `$06` / aux
/// `$12CD`, `NAME#5445535423435032` for HFS type `TEST` / creator `#CP2`.
/// A trailing `r` marks the resource fork of the same file.

use crate::container::FileAttribs;
use regex::Regex;
use std::sync::OnceLock;

/// Suffix marking a resource fork
pub const RSRC_MARKER: char = 'r';

/// Type metadata carried by a NAPS suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NapsTypes {
    /// ProDOS file type and aux type
    ProDos {
        /// File type
        file_type: u8,
        /// Aux type
        aux_type: u16,
    },
    /// HFS file type and creator
    Hfs {
        /// File type
        file_type: u32,
        /// Creator
        creator: u32,
    },
}

impl NapsTypes {
    /// Store the types in a set of attributes
    pub fn apply_to(&self, attribs: &mut FileAttribs) {
        match *self {
            NapsTypes::ProDos {
                file_type,
                aux_type,
            } => {
                attribs.file_type = file_type;
                attribs.aux_type = aux_type;
            }
            NapsTypes::Hfs { file_type, creator } => {
                attribs.hfs_file_type = file_type;
                attribs.hfs_creator = creator;
            }
        }
    }
}

/// Result of decoding a NAPS filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NapsName {
    /// Filename with the suffix removed
    pub base: String,
    /// Encoded types
    pub types: NapsTypes,
    /// Name refers to a resource fork
    pub is_rsrc: bool,
}

/// Encode ProDOS types, e.g. `#0612cd`
pub fn encode_prodos(file_type: u8, aux_type: u16) -> String {
    format!("#{:02x}{:04x}", file_type, aux_type)
}

/// Encode HFS types, e.g. `#5445535423435032`
pub fn encode_hfs(file_type: u32, creator: u32) -> String {
    format!("#{:08x}{:08x}", file_type, creator)
}

/// Suffix for an entry's extracted name. HFS form is used only when the entry
/// has HFS types and no ProDOS types, so every file gets a suffix and its two
/// forks never share a name.
pub fn suffix_for(attribs: &FileAttribs, is_rsrc: bool) -> String {
    let mut suffix = if attribs.has_hfs_types() && !attribs.has_prodos_types() {
        encode_hfs(attribs.hfs_file_type, attribs.hfs_creator)
    } else {
        encode_prodos(attribs.file_type, attribs.aux_type)
    };
    if is_rsrc {
        suffix.push(RSRC_MARKER);
    }
    suffix
}

fn suffix_regex() -> Option<&'static Regex> {
    static SUFFIX: OnceLock<Option<Regex>> = OnceLock::new();
    SUFFIX
        .get_or_init(|| Regex::new(r"^(.*)#([0-9a-fA-F]{16}|[0-9a-fA-F]{6})([rR])?$").ok())
        .as_ref()
}

/// Split a filename into its base name and NAPS metadata.
///
/// Returns `None` when the name carries no suffix.
pub fn decode(name: &str) -> Option<NapsName> {
    let caps = suffix_regex()?.captures(name)?;
    let base = caps.get(1)?.as_str();
    let hex = caps.get(2)?.as_str();
    let types = if hex.len() == 6 {
        NapsTypes::ProDos {
            file_type: u8::from_str_radix(&hex[..2], 16).ok()?,
            aux_type: u16::from_str_radix(&hex[2..], 16).ok()?,
        }
    } else {
        NapsTypes::Hfs {
            file_type: u32::from_str_radix(&hex[..8], 16).ok()?,
            creator: u32::from_str_radix(&hex[8..], 16).ok()?,
        }
    };
    Some(NapsName {
        base: base.to_string(),
        types,
        is_rsrc: caps.get(3).is_some(),
    })
}
