use crate::artifacts::objects::object_type::ObjectType;

/// Object type bits of a mode word
const TYPE_MASK: u32 = 0o170000;

#[derive(Debug, Clone, Copy, Eq, Ord, Default, PartialEq, PartialOrd, Hash)]
pub enum FileMode {
    #[default]
    Regular,
    Executable,
}

/// Type and permission bits of a tree or index entry
///
/// Only the file-like variants may be stored in the index; directories are
/// implied by the paths beneath them and `Missing` marks "no entry here"
/// in walk rows.
#[derive(Debug, Clone, Copy, Eq, Ord, Default, PartialEq, PartialOrd, Hash)]
pub enum EntryMode {
    File(FileMode),
    Symlink,
    Gitlink,
    Directory,
    #[default]
    Missing,
}

impl EntryMode {
    pub fn as_str(&self) -> &str {
        match self {
            EntryMode::File(FileMode::Regular) => "100644",
            EntryMode::File(FileMode::Executable) => "100755",
            EntryMode::Symlink => "120000",
            EntryMode::Gitlink => "160000",
            EntryMode::Directory => "40000",
            EntryMode::Missing => "0",
        }
    }

    pub fn as_u32(&self) -> u32 {
        match self {
            EntryMode::File(FileMode::Regular) => 0o100644,
            EntryMode::File(FileMode::Executable) => 0o100755,
            EntryMode::Symlink => 0o120000,
            EntryMode::Gitlink => 0o160000,
            EntryMode::Directory => 0o40000,
            EntryMode::Missing => 0,
        }
    }

    /// Classify raw mode bits by their object type bits
    ///
    /// Permission bits other than the owner execute bit are ignored, the way
    /// git normalizes `100664` and friends. Unknown types map to `Missing`.
    pub fn from_bits(bits: u32) -> Self {
        match bits & TYPE_MASK {
            0o040000 => EntryMode::Directory,
            0o120000 => EntryMode::Symlink,
            0o160000 => EntryMode::Gitlink,
            0o100000 if bits & 0o100 != 0 => EntryMode::File(FileMode::Executable),
            0o100000 => EntryMode::File(FileMode::Regular),
            _ => EntryMode::Missing,
        }
    }

    /// Parse the octal text used in tree objects, e.g. `100644` or `40000`
    pub fn from_octal_str(value: &str) -> anyhow::Result<Self> {
        let bits = u32::from_str_radix(value, 8)
            .map_err(|_| anyhow::anyhow!("Invalid entry mode {value:?}"))?;
        match EntryMode::from_bits(bits) {
            EntryMode::Missing => Err(anyhow::anyhow!("Invalid entry mode {value:?}")),
            mode => Ok(mode),
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, EntryMode::Directory)
    }

    pub fn is_gitlink(&self) -> bool {
        matches!(self, EntryMode::Gitlink)
    }

    /// True for the modes an index entry may carry
    pub fn is_storable(&self) -> bool {
        matches!(
            self,
            EntryMode::File(_) | EntryMode::Symlink | EntryMode::Gitlink
        )
    }

    /// Kind of object an entry with this mode points at
    pub fn object_type(&self) -> Option<ObjectType> {
        match self {
            EntryMode::File(_) | EntryMode::Symlink => Some(ObjectType::Blob),
            EntryMode::Directory => Some(ObjectType::Tree),
            EntryMode::Gitlink => Some(ObjectType::Commit),
            EntryMode::Missing => None,
        }
    }
}

impl From<EntryMode> for u32 {
    fn from(mode: EntryMode) -> Self {
        mode.as_u32()
    }
}

impl From<FileMode> for EntryMode {
    fn from(mode: FileMode) -> Self {
        EntryMode::File(mode)
    }
}

impl TryFrom<EntryMode> for FileMode {
    type Error = anyhow::Error;

    fn try_from(value: EntryMode) -> anyhow::Result<Self> {
        match value {
            EntryMode::File(mode) => Ok(mode),
            _ => Err(anyhow::anyhow!("Invalid entry mode")),
        }
    }
}

impl TryFrom<&str> for EntryMode {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> anyhow::Result<Self> {
        EntryMode::from_octal_str(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0o100644, EntryMode::File(FileMode::Regular))]
    #[case(0o100664, EntryMode::File(FileMode::Regular))]
    #[case(0o100755, EntryMode::File(FileMode::Executable))]
    #[case(0o120000, EntryMode::Symlink)]
    #[case(0o160000, EntryMode::Gitlink)]
    #[case(0o040000, EntryMode::Directory)]
    #[case(0, EntryMode::Missing)]
    #[case(0o070000, EntryMode::Missing)]
    fn mode_bits_are_classified(#[case] bits: u32, #[case] expected: EntryMode) {
        assert_eq!(EntryMode::from_bits(bits), expected);
    }

    #[rstest]
    #[case("40000", EntryMode::Directory)]
    #[case("040000", EntryMode::Directory)]
    #[case("100755", EntryMode::File(FileMode::Executable))]
    fn octal_text_is_parsed(#[case] text: &str, #[case] expected: EntryMode) {
        assert_eq!(EntryMode::from_octal_str(text).unwrap(), expected);
    }

    #[rstest]
    #[case("0")]
    #[case("hello")]
    #[case("99")]
    fn bad_octal_text_is_rejected(#[case] text: &str) {
        assert!(EntryMode::from_octal_str(text).is_err());
    }

    #[test]
    fn only_file_like_modes_are_storable() {
        assert!(EntryMode::File(FileMode::Regular).is_storable());
        assert!(EntryMode::Gitlink.is_storable());
        assert!(!EntryMode::Directory.is_storable());
        assert!(!EntryMode::Missing.is_storable());
    }
}
