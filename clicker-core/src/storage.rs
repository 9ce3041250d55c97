// Durable-file seam. The firmware backs this with a FAT directory on the
// SD card, so names stay in 8.3 form; host tests use the in-memory
// implementation below.

use alloc::vec::Vec;

use crate::error::StorageError;

#[cfg(test)]
use alloc::string::String;

pub const RAW_FILE: &str = "LAST.RAW";
pub const RAW_TMP: &str = "LASTRAW.TMP";
pub const PNG_FILE: &str = "LAST.PNG";
pub const PNG_TMP: &str = "LASTPNG.TMP";
pub const STATE_FILE: &str = "STATE.JSN";
pub const STATE_TMP: &str = "STATE.TMP";
pub const CONFIG_FILE: &str = "CONFIG.JSN";
pub const SECRETS_FILE: &str = "SECRETS.JSN";
pub const CATALOG_FILE: &str = "DEMOS.JSN";

pub trait Storage {
    /// Whole-file read. A missing file is `Ok(None)`, including one that
    /// vanishes between a directory listing and the read.
    fn read(&mut self, name: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Create-or-truncate write of the full contents.
    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete; removing a missing file is not an error.
    fn remove(&mut self, name: &str) -> Result<(), StorageError>;

    /// Move `old` over `new`. `new` must not exist (callers remove it
    /// first); FAT backends may emulate this with copy-then-delete.
    fn rename(&mut self, old: &str, new: &str) -> Result<(), StorageError>;

    /// Size in bytes, `None` if missing.
    fn len(&mut self, name: &str) -> Result<Option<usize>, StorageError>;
}

/// Temp-write, remove target, rename. A failure before the rename leaves
/// the previous target intact; the temp file is cleaned up best-effort.
pub fn atomic_write(
    storage: &mut dyn Storage,
    name: &str,
    tmp: &str,
    data: &[u8],
) -> Result<(), StorageError> {
    storage.write(tmp, data)?;
    if let Err(e) = storage.remove(name).and_then(|_| storage.rename(tmp, name)) {
        let _ = storage.remove(tmp);
        return Err(e);
    }
    Ok(())
}

/// In-memory backend for host tests. Records every mutating operation so
/// tests can assert on ordering (e.g. that saves are temp-then-rename).
#[cfg(test)]
pub(crate) struct MemStorage {
    files: Vec<(String, Vec<u8>)>,
    pub ops: Vec<String>,
    pub fail_rename: bool,
    pub fail_write: bool,
}

#[cfg(test)]
impl MemStorage {
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            ops: Vec::new(),
            fail_rename: false,
            fail_write: false,
        }
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.files.iter().position(|(n, _)| n == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }
}

#[cfg(test)]
impl Storage for MemStorage {
    fn read(&mut self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.find(name).map(|i| self.files[i].1.clone()))
    }

    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), StorageError> {
        use alloc::format;
        if self.fail_write {
            return Err(StorageError::Io("write failed"));
        }
        self.ops.push(format!("write {name}"));
        match self.find(name) {
            Some(i) => self.files[i].1 = data.to_vec(),
            None => self.files.push((String::from(name), data.to_vec())),
        }
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<(), StorageError> {
        use alloc::format;
        self.ops.push(format!("remove {name}"));
        if let Some(i) = self.find(name) {
            self.files.remove(i);
        }
        Ok(())
    }

    fn rename(&mut self, old: &str, new: &str) -> Result<(), StorageError> {
        use alloc::format;
        if self.fail_rename {
            return Err(StorageError::Io("rename failed"));
        }
        self.ops.push(format!("rename {old} {new}"));
        let i = self.find(old).ok_or(StorageError::Io("rename source missing"))?;
        self.files[i].0 = String::from(new);
        Ok(())
    }

    fn len(&mut self, name: &str) -> Result<Option<usize>, StorageError> {
        Ok(self.find(name).map(|i| self.files[i].1.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_is_temp_then_remove_then_rename() {
        let mut s = MemStorage::new();
        s.write(STATE_FILE, b"old").unwrap();
        s.ops.clear();

        atomic_write(&mut s, STATE_FILE, STATE_TMP, b"new").unwrap();

        assert_eq!(
            s.ops,
            [
                alloc::format!("write {STATE_TMP}"),
                alloc::format!("remove {STATE_FILE}"),
                alloc::format!("rename {STATE_TMP} {STATE_FILE}"),
            ]
        );
        assert_eq!(s.read(STATE_FILE).unwrap().unwrap(), b"new");
        assert!(!s.contains(STATE_TMP));
    }

    #[test]
    fn failed_write_leaves_target_untouched() {
        let mut s = MemStorage::new();
        s.write(STATE_FILE, b"old").unwrap();
        s.fail_write = true;

        assert!(atomic_write(&mut s, STATE_FILE, STATE_TMP, b"new").is_err());
        s.fail_write = false;
        assert_eq!(s.read(STATE_FILE).unwrap().unwrap(), b"old");
    }

    #[test]
    fn failed_rename_cleans_up_temp() {
        let mut s = MemStorage::new();
        s.fail_rename = true;

        assert!(atomic_write(&mut s, STATE_FILE, STATE_TMP, b"new").is_err());
        assert!(!s.contains(STATE_TMP));
        assert!(!s.contains(STATE_FILE));
    }

    #[test]
    fn missing_read_is_none_not_error() {
        let mut s = MemStorage::new();
        assert_eq!(s.read("NOPE.BIN").unwrap(), None);
        assert_eq!(s.len("NOPE.BIN").unwrap(), None);
        s.remove("NOPE.BIN").unwrap();
    }
}
