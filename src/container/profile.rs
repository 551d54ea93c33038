/// Filesystem profiles: naming rules and capabilities per disk format

use crate::container::{Characteristics, ContainerKind};

/// Maximum ProDOS filename length
pub const PRODOS_MAX_NAME: usize = 15;
/// Maximum HFS filename length
pub const HFS_MAX_NAME: usize = 31;
/// Maximum DOS 3.3 filename length
pub const DOS_MAX_NAME: usize = 30;
/// Maximum Pascal filename length
pub const PASCAL_MAX_NAME: usize = 15;
/// CP/M base name length
pub const CPM_BASE_LEN: usize = 8;
/// CP/M extension length
pub const CPM_EXT_LEN: usize = 3;

const PASCAL_ILLEGAL: &[char] = &[' ', '$', '=', '?', ',', '[', '#', ':'];
const CPM_ILLEGAL: &[char] = &['<', '>', '.', ',', ';', ':', '=', '?', '*', '[', ']', ' '];

/// Disk filesystem formats understood by [`crate::MemFileSystem`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsProfile {
    /// Apple ProDOS (hierarchical, extended files)
    ProDos,
    /// Macintosh HFS (hierarchical, resource forks, HFS types)
    Hfs,
    /// Apple DOS 3.3 (flat, cooked text files)
    Dos33,
    /// Apple Pascal (flat)
    Pascal,
    /// CP/M 2.2 (flat, 8.3 names)
    Cpm,
}

impl FsProfile {
    /// Parse a profile name as typed by a user
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "prodos" => Some(FsProfile::ProDos),
            "hfs" => Some(FsProfile::Hfs),
            "dos" | "dos33" => Some(FsProfile::Dos33),
            "pascal" => Some(FsProfile::Pascal),
            "cpm" => Some(FsProfile::Cpm),
            _ => None,
        }
    }

    /// Capability flags for this format
    pub fn characteristics(&self) -> Characteristics {
        let base = Characteristics {
            name: "",
            kind: ContainerKind::FileSystem,
            has_resource_forks: false,
            is_hierarchical: false,
            has_prodos_types: false,
            has_hfs_types: false,
            has_raw_mode: false,
            case_sensitive: false,
            dir_sep: '/',
            zip_like: false,
        };
        match self {
            FsProfile::ProDos => Characteristics {
                name: "ProDOS",
                has_resource_forks: true,
                is_hierarchical: true,
                has_prodos_types: true,
                ..base
            },
            FsProfile::Hfs => Characteristics {
                name: "HFS",
                has_resource_forks: true,
                is_hierarchical: true,
                has_hfs_types: true,
                dir_sep: ':',
                ..base
            },
            FsProfile::Dos33 => Characteristics {
                name: "DOS 3.3",
                has_prodos_types: true,
                has_raw_mode: true,
                case_sensitive: true,
                ..base
            },
            FsProfile::Pascal => Characteristics {
                name: "Pascal",
                has_prodos_types: true,
                ..base
            },
            FsProfile::Cpm => Characteristics {
                name: "CP/M",
                ..base
            },
        }
    }

    /// Convert a name into one that is legal for this format
    pub fn adjust_name(&self, name: &str) -> String {
        match self {
            FsProfile::ProDos => {
                let mut out: String = name
                    .chars()
                    .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '.' })
                    .collect();
                if !out.starts_with(|c: char| c.is_ascii_alphabetic()) {
                    out.insert(0, 'A');
                }
                truncate(out, PRODOS_MAX_NAME)
            }
            FsProfile::Hfs => {
                let out: String = name
                    .chars()
                    .map(|c| if c == ':' || c.is_control() { '_' } else { c })
                    .collect();
                if out.is_empty() {
                    return "_".to_string();
                }
                truncate(out, HFS_MAX_NAME)
            }
            FsProfile::Dos33 => {
                let mut out: String = name
                    .chars()
                    .map(|c| c.to_ascii_uppercase())
                    .map(|c| if c == ',' || !c.is_ascii() || c.is_ascii_control() { '.' } else { c })
                    .collect();
                if !out.starts_with(|c: char| c.is_ascii_alphabetic()) {
                    out.insert(0, 'A');
                }
                truncate(out, DOS_MAX_NAME)
            }
            FsProfile::Pascal => {
                let out: String = name
                    .chars()
                    .map(|c| c.to_ascii_uppercase())
                    .map(|c| if PASCAL_ILLEGAL.contains(&c) || !c.is_ascii_graphic() { '.' } else { c })
                    .collect();
                if out.is_empty() {
                    return "A".to_string();
                }
                truncate(out, PASCAL_MAX_NAME)
            }
            FsProfile::Cpm => {
                let (base, ext) = match name.rfind('.') {
                    Some(pos) if pos > 0 => (&name[..pos], &name[pos + 1..]),
                    _ => (name, ""),
                };
                let base = truncate(cpm_part(base), CPM_BASE_LEN);
                let ext = truncate(cpm_part(ext), CPM_EXT_LEN);
                let base = if base.is_empty() { "A".to_string() } else { base };
                if ext.is_empty() {
                    base
                } else {
                    format!("{}.{}", base, ext)
                }
            }
        }
    }

    /// Compare two names using this format's case rules
    pub fn names_equal(&self, a: &str, b: &str) -> bool {
        if self.characteristics().case_sensitive {
            a == b
        } else {
            a.eq_ignore_ascii_case(b)
        }
    }
}

impl std::fmt::Display for FsProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.characteristics().name)
    }
}

/// Uppercase a CP/M name part, replacing characters the directory cannot hold
fn cpm_part(part: &str) -> String {
    part.chars()
        .map(|c| c.to_ascii_uppercase())
        .map(|c| if CPM_ILLEGAL.contains(&c) || !c.is_ascii_graphic() { '_' } else { c })
        .collect()
}

fn truncate(mut s: String, max: usize) -> String {
    if let Some((idx, _)) = s.char_indices().nth(max) {
        s.truncate(idx);
    }
    s
}
