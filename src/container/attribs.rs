/// Format-neutral file attributes

use chrono::NaiveDateTime;

/// ProDOS access: file may be destroyed
pub const ACCESS_DESTROY: u8 = 0x80;
/// ProDOS access: file may be renamed
pub const ACCESS_RENAME: u8 = 0x40;
/// ProDOS access: file needs backup
pub const ACCESS_BACKUP: u8 = 0x20;
/// ProDOS access: file is invisible
pub const ACCESS_INVISIBLE: u8 = 0x04;
/// ProDOS access: file may be written
pub const ACCESS_WRITE: u8 = 0x02;
/// ProDOS access: file may be read
pub const ACCESS_READ: u8 = 0x01;
/// Access flags of a freshly created, unlocked file
pub const ACCESS_UNLOCKED: u8 =
    ACCESS_DESTROY | ACCESS_RENAME | ACCESS_BACKUP | ACCESS_WRITE | ACCESS_READ;
/// Access flags of a locked file
pub const ACCESS_LOCKED: u8 = ACCESS_BACKUP | ACCESS_READ;

/// ProDOS "no type" file type
pub const TYPE_NONE: u8 = 0x00;
/// ProDOS text file type
pub const TYPE_TXT: u8 = 0x04;
/// ProDOS binary file type
pub const TYPE_BIN: u8 = 0x06;

/// HFS creator used when ProDOS types are wrapped in HFS types
pub const HFS_CREATOR_PDOS: u32 = u32::from_be_bytes(*b"pdos");

/// Metadata for a single file or directory, independent of the container format.
///
/// Absent type fields hold zero; absent timestamps hold `None`. Directories
/// never carry fork lengths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttribs {
    /// Hierarchical name as recorded in the source container
    pub full_path_name: String,
    /// Separator used in `full_path_name`
    pub path_sep: char,
    /// Directory flag
    pub is_directory: bool,
    /// ProDOS file type
    pub file_type: u8,
    /// ProDOS auxiliary type
    pub aux_type: u16,
    /// HFS file type
    pub hfs_file_type: u32,
    /// HFS creator
    pub hfs_creator: u32,
    /// Creation date
    pub create_when: Option<NaiveDateTime>,
    /// Modification date
    pub mod_when: Option<NaiveDateTime>,
    /// Access flags (ProDOS layout)
    pub access: u8,
    data_length: Option<u64>,
    rsrc_length: Option<u64>,
}

impl FileAttribs {
    /// Create attributes for a plain file
    pub fn file<S: Into<String>>(full_path_name: S, path_sep: char) -> Self {
        Self {
            full_path_name: full_path_name.into(),
            path_sep,
            is_directory: false,
            file_type: TYPE_NONE,
            aux_type: 0,
            hfs_file_type: 0,
            hfs_creator: 0,
            create_when: None,
            mod_when: None,
            access: ACCESS_UNLOCKED,
            data_length: None,
            rsrc_length: None,
        }
    }

    /// Create attributes for a directory
    pub fn directory<S: Into<String>>(full_path_name: S, path_sep: char) -> Self {
        Self {
            is_directory: true,
            ..Self::file(full_path_name, path_sep)
        }
    }

    /// Set the ProDOS file type and aux type
    pub fn with_prodos_types(mut self, file_type: u8, aux_type: u16) -> Self {
        self.file_type = file_type;
        self.aux_type = aux_type;
        self
    }

    /// Set the HFS file type and creator
    pub fn with_hfs_types(mut self, hfs_file_type: u32, hfs_creator: u32) -> Self {
        self.hfs_file_type = hfs_file_type;
        self.hfs_creator = hfs_creator;
        self
    }

    /// Set creation and modification dates
    pub fn with_dates(
        mut self,
        create_when: Option<NaiveDateTime>,
        mod_when: Option<NaiveDateTime>,
    ) -> Self {
        self.create_when = create_when;
        self.mod_when = mod_when;
        self
    }

    /// Record fork lengths. Ignored for directories.
    pub fn set_fork_lengths(&mut self, data_length: Option<u64>, rsrc_length: Option<u64>) {
        if self.is_directory {
            return;
        }
        self.data_length = data_length;
        self.rsrc_length = rsrc_length;
    }

    /// Data fork length, if the entry has a data fork
    pub fn data_length(&self) -> Option<u64> {
        self.data_length
    }

    /// Resource fork length, if the entry has a resource fork
    pub fn rsrc_length(&self) -> Option<u64> {
        self.rsrc_length
    }

    /// Final component of the pathname
    pub fn file_name_only(&self) -> &str {
        file_name(&self.full_path_name, self.path_sep)
    }

    /// Replace the final component of the pathname
    pub fn set_file_name_only(&mut self, name: &str) {
        let dir = directory_name(&self.full_path_name, self.path_sep);
        self.full_path_name = if dir.is_empty() {
            name.to_string()
        } else {
            format!("{}{}{}", dir, self.path_sep, name)
        };
    }

    /// Pathname components, ignoring empty segments
    pub fn components(&self) -> Vec<&str> {
        split_path(&self.full_path_name, self.path_sep)
    }

    /// True if any ProDOS type information is present
    pub fn has_prodos_types(&self) -> bool {
        self.file_type != TYPE_NONE || self.aux_type != 0
    }

    /// True if any HFS type information is present
    pub fn has_hfs_types(&self) -> bool {
        self.hfs_file_type != 0 || self.hfs_creator != 0
    }

    /// True if the access flags forbid writing
    pub fn is_locked(&self) -> bool {
        self.access & (ACCESS_WRITE | ACCESS_DESTROY | ACCESS_RENAME) == 0
    }

    /// Type information as it should be stored on a destination with the given
    /// capabilities. ProDOS types are wrapped in `pdos` HFS types when only the
    /// latter can be stored.
    pub fn types_for(&self, prodos: bool, hfs: bool) -> (u8, u16, u32, u32) {
        let (mut hfs_type, mut hfs_creator) = (self.hfs_file_type, self.hfs_creator);
        if hfs && !prodos && !self.has_hfs_types() && self.has_prodos_types() {
            (hfs_type, hfs_creator) = prodos_to_hfs(self.file_type, self.aux_type);
        }
        (
            if prodos { self.file_type } else { TYPE_NONE },
            if prodos { self.aux_type } else { 0 },
            if hfs { hfs_type } else { 0 },
            if hfs { hfs_creator } else { 0 },
        )
    }
}

/// Wrap ProDOS types in an HFS type/creator pair (`'p' type aux` / `'pdos'`)
pub fn prodos_to_hfs(file_type: u8, aux_type: u16) -> (u32, u32) {
    let aux = aux_type.to_be_bytes();
    (
        u32::from_be_bytes([b'p', file_type, aux[0], aux[1]]),
        HFS_CREATOR_PDOS,
    )
}

/// Split a pathname into its non-empty components
pub fn split_path(path: &str, sep: char) -> Vec<&str> {
    path.split(sep).filter(|s| !s.is_empty()).collect()
}

/// Final component of a pathname
pub fn file_name(path: &str, sep: char) -> &str {
    let trimmed = path.trim_end_matches(sep);
    match trimmed.rfind(sep) {
        Some(pos) => &trimmed[pos + sep.len_utf8()..],
        None => trimmed,
    }
}

/// Everything before the final component of a pathname
pub fn directory_name(path: &str, sep: char) -> &str {
    let trimmed = path.trim_end_matches(sep);
    match trimmed.rfind(sep) {
        Some(pos) => trimmed[..pos].trim_end_matches(sep),
        None => "",
    }
}
