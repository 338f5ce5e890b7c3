//! Asset store
//!
//! Three flat directories under one root hold imported cores, firmware images
//! and games. Imports copy the source bytes into a temporary file next to the
//! destination and rename it into place once the copy is complete, so a
//! failed import never leaves a truncated file under the final name.

use se_core::StorageError;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Prefix of in-progress import files; never listed
const TEMP_PREFIX: &str = ".import-";

/// Asset collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetCategory {
    Cores,
    Firmware,
    Games,
}

impl AssetCategory {
    pub const ALL: [AssetCategory; 3] = [
        AssetCategory::Cores,
        AssetCategory::Firmware,
        AssetCategory::Games,
    ];

    /// Directory name under the store root
    pub fn dir_name(self) -> &'static str {
        match self {
            AssetCategory::Cores => "cores",
            AssetCategory::Firmware => "bios",
            AssetCategory::Games => "roms",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AssetCategory::Cores => "Cores",
            AssetCategory::Firmware => "BIOS",
            AssetCategory::Games => "Games",
        }
    }
}

/// Reduce a source name to a bare file name, or `None` if nothing usable is left
fn sanitize(name: &str) -> Option<String> {
    let base = Path::new(name).file_name()?.to_str()?;
    if base.is_empty() {
        None
    } else {
        Some(base.to_string())
    }
}

fn fallback_name() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("file_{}", millis)
}

/// Filesystem-backed store of cores, firmware and games
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    /// Open a store rooted at `root`, creating the category directories
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let store = Self { root: root.into() };
        for category in AssetCategory::ALL {
            let dir = store.dir(category);
            fs::create_dir_all(&dir)
                .map_err(|source| StorageError::DestinationUnwritable { path: dir, source })?;
        }
        tracing::info!("Asset store opened at {}", store.root.display());
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, category: AssetCategory) -> PathBuf {
        self.root.join(category.dir_name())
    }

    /// Copy a byte stream into `category`. Returns the final path.
    ///
    /// `name` is reduced to its last path component; without a usable name the
    /// file is called `file_<unix millis>`. An existing file of the same name is
    /// replaced.
    pub fn import_reader(
        &self,
        name: Option<&str>,
        mut reader: impl Read,
        category: AssetCategory,
    ) -> Result<PathBuf, StorageError> {
        let file_name = match name.and_then(sanitize) {
            Some(n) if n.starts_with(TEMP_PREFIX) => return Err(StorageError::InvalidName(n)),
            Some(n) => n,
            None => fallback_name(),
        };
        let dir = self.dir(category);
        let dest = dir.join(&file_name);

        let unwritable = |source: io::Error| StorageError::DestinationUnwritable {
            path: dest.clone(),
            source,
        };

        let mut temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&dir)
            .map_err(unwritable)?;

        let mut buf = [0u8; 64 * 1024];
        let mut copied = 0u64;
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    tracing::warn!("Import of {} aborted after {} bytes: {}", file_name, copied, source);
                    return Err(StorageError::SourceUnreadable {
                        name: file_name,
                        source,
                    });
                }
            };
            temp.write_all(&buf[..n]).map_err(unwritable)?;
            copied += n as u64;
        }
        temp.as_file().sync_all().map_err(unwritable)?;

        temp.persist(&dest).map_err(|e| unwritable(e.error))?;
        tracing::info!(
            "Imported {} ({} bytes) into {}",
            file_name,
            copied,
            category.dir_name()
        );
        Ok(dest)
    }

    /// Copy a file from the host filesystem into `category`
    pub fn import_path(&self, source: &Path, category: AssetCategory) -> Result<PathBuf, StorageError> {
        let name = source.file_name().and_then(|n| n.to_str());
        let file = fs::File::open(source).map_err(|e| StorageError::SourceUnreadable {
            name: source.display().to_string(),
            source: e,
        })?;
        self.import_reader(name, file, category)
    }

    /// Names of the regular files in `category`, sorted
    pub fn list_files(&self, category: AssetCategory) -> Vec<String> {
        let entries = match fs::read_dir(self.dir(category)) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Cannot list {}: {}", category.dir_name(), e);
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .flatten()
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|n| !n.starts_with(TEMP_PREFIX))
            .collect();
        names.sort();
        names
    }

    /// First core library in name order
    pub fn find_first_core(&self) -> Option<PathBuf> {
        let suffix = format!(".{}", std::env::consts::DLL_EXTENSION);
        self.list_files(AssetCategory::Cores)
            .into_iter()
            .find(|n| n.ends_with(&suffix))
            .map(|n| self.dir(AssetCategory::Cores).join(n))
    }

    /// Path of `name` in `category` if it exists as a regular file
    pub fn find_exact(&self, category: AssetCategory, name: &str) -> Option<PathBuf> {
        if sanitize(name).as_deref() != Some(name) {
            return None;
        }
        let path = self.dir(category).join(name);
        path.is_file().then_some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn store() -> (TempDir, AssetStore) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = AssetStore::open(temp_dir.path().join("data")).unwrap();
        (temp_dir, store)
    }

    struct FailingReader {
        served: bool,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.served {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream closed"));
            }
            self.served = true;
            buf[..4].copy_from_slice(b"half");
            Ok(4)
        }
    }

    #[test]
    fn test_open_creates_dirs() {
        let (_tmp, store) = store();
        assert!(store.root().join("cores").is_dir());
        assert!(store.root().join("bios").is_dir());
        assert!(store.root().join("roms").is_dir());
    }

    #[test]
    fn test_import_and_list() {
        let (_tmp, store) = store();
        let path = store
            .import_reader(Some("tetris.gb"), Cursor::new(b"ROM".to_vec()), AssetCategory::Games)
            .unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"ROM");
        assert_eq!(store.list_files(AssetCategory::Games), vec!["tetris.gb"]);
        assert!(store.list_files(AssetCategory::Cores).is_empty());
    }

    #[test]
    fn test_name_reduced_to_last_component() {
        let (_tmp, store) = store();
        let path = store
            .import_reader(Some("../../etc/scph1001.bin"), Cursor::new(vec![1]), AssetCategory::Firmware)
            .unwrap();
        assert_eq!(path, store.dir(AssetCategory::Firmware).join("scph1001.bin"));
    }

    #[test]
    fn test_fallback_name() {
        let (_tmp, store) = store();
        let path = store
            .import_reader(None, Cursor::new(vec![1, 2]), AssetCategory::Games)
            .unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("file_"));
    }

    #[test]
    fn test_reserved_prefix_rejected() {
        let (_tmp, store) = store();
        let err = store
            .import_reader(Some(".import-x"), Cursor::new(vec![]), AssetCategory::Games)
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidName(_)));
    }

    #[test]
    fn test_collision_overwrites() {
        let (_tmp, store) = store();
        store
            .import_reader(Some("a.gb"), Cursor::new(b"old".to_vec()), AssetCategory::Games)
            .unwrap();
        let path = store
            .import_reader(Some("a.gb"), Cursor::new(b"new".to_vec()), AssetCategory::Games)
            .unwrap();
        assert_eq!(fs::read(path).unwrap(), b"new");
        assert_eq!(store.list_files(AssetCategory::Games).len(), 1);
    }

    #[test]
    fn test_failed_import_leaves_nothing() {
        let (_tmp, store) = store();
        store
            .import_reader(Some("a.gb"), Cursor::new(b"good".to_vec()), AssetCategory::Games)
            .unwrap();

        let err = store
            .import_reader(Some("a.gb"), FailingReader { served: false }, AssetCategory::Games)
            .unwrap_err();
        assert!(matches!(err, StorageError::SourceUnreadable { .. }));

        // the earlier copy survives and no temporary is left behind
        let dir = store.dir(AssetCategory::Games);
        assert_eq!(fs::read(dir.join("a.gb")).unwrap(), b"good");
        assert_eq!(fs::read_dir(dir).unwrap().count(), 1);
    }

    #[test]
    fn test_import_missing_path() {
        let (tmp, store) = store();
        let err = store
            .import_path(&tmp.path().join("nope.so"), AssetCategory::Cores)
            .unwrap_err();
        assert!(matches!(err, StorageError::SourceUnreadable { .. }));
    }

    #[test]
    fn test_find_first_core() {
        let (tmp, store) = store();
        assert!(store.find_first_core().is_none());

        let lib = format!("b_core.{}", std::env::consts::DLL_EXTENSION);
        let other = tmp.path().join(&lib);
        fs::write(&other, b"\x7fELF").unwrap();
        store.import_path(&other, AssetCategory::Cores).unwrap();
        store
            .import_reader(Some("a_readme.txt"), Cursor::new(vec![]), AssetCategory::Cores)
            .unwrap();

        assert_eq!(
            store.find_first_core(),
            Some(store.dir(AssetCategory::Cores).join(lib))
        );
    }

    #[test]
    fn test_find_exact() {
        let (_tmp, store) = store();
        store
            .import_reader(Some("Zelda.gb"), Cursor::new(vec![0]), AssetCategory::Games)
            .unwrap();

        assert!(store.find_exact(AssetCategory::Games, "Zelda.gb").is_some());
        assert!(store.find_exact(AssetCategory::Games, "zelda.gb").is_none());
        assert!(store.find_exact(AssetCategory::Firmware, "Zelda.gb").is_none());
        assert!(store.find_exact(AssetCategory::Games, "../roms/Zelda.gb").is_none());
    }

    #[test]
    fn test_directories_are_not_listed() {
        let (_tmp, store) = store();
        fs::create_dir(store.dir(AssetCategory::Games).join("subdir")).unwrap();
        assert!(store.list_files(AssetCategory::Games).is_empty());
    }
}
