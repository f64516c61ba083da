//! Font byte-source collaborator.
//!
//! Owns the raw bytes of every opened font file and hands out cheap
//! `Arc` references to them. Font indices are stable for the whole
//! session: removing a font retires its slot instead of shifting later
//! indices, because the face-id registry and the cache both key off the
//! index. System fonts can be located by family name through `fontdb`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::{anyhow, Context, Result};

use crate::error::FontOpenError;

/// One opened font file (or in-memory font).
#[derive(Clone)]
pub struct FontFile {
    path: Option<PathBuf>,
    label: String,
    data: Arc<Vec<u8>>,
    mtime: Option<SystemTime>,
}

impl FontFile {
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Display label: the file name, or the label given at memory-open.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn data(&self) -> &Arc<Vec<u8>> {
        &self.data
    }
}

impl std::fmt::Debug for FontFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontFile")
            .field("label", &self.label)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// Manages the set of opened font files.
#[derive(Default)]
pub struct FontFileManager {
    files: Vec<Option<FontFile>>,
    db: Option<fontdb::Database>,
}

impl FontFileManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a single font file from disk. Returns the new font index.
    pub fn open_file(&mut self, path: &Path) -> Result<usize> {
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read font file '{}'", path.display()))?;
        let mtime = std::fs::metadata(path).and_then(|m| m.modified()).ok();
        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let index = self.push(FontFile {
            path: Some(path.to_path_buf()),
            label,
            data: Arc::new(data),
            mtime,
        });
        log::info!("opened font file '{}' as font {}", path.display(), index);
        Ok(index)
    }

    /// Open many font files; failures are logged and skipped. Returns the
    /// number successfully opened. Iterates on the caller's thread;
    /// chunking/progress is the caller's responsibility.
    pub fn open_files(&mut self, paths: &[PathBuf]) -> usize {
        let mut opened = 0;
        for path in paths {
            match self.open_file(path) {
                Ok(_) => opened += 1,
                Err(e) => log::warn!("skipping '{}': {e:#}", path.display()),
            }
        }
        opened
    }

    /// Open a font already resident in memory.
    pub fn open_memory(&mut self, data: Vec<u8>, label: &str) -> usize {
        let index = self.push(FontFile {
            path: None,
            label: label.to_string(),
            data: Arc::new(data),
            mtime: None,
        });
        log::info!("opened in-memory font '{label}' as font {index}");
        index
    }

    /// Locate a family in the system font database and open its file.
    pub fn open_system_family(&mut self, family: &str) -> Result<usize> {
        let db = self.db.get_or_insert_with(|| {
            let mut db = fontdb::Database::new();
            db.load_system_fonts();
            log::info!("loaded {} system fonts", db.len());
            db
        });
        let query = fontdb::Query {
            families: &[fontdb::Family::Name(family)],
            ..Default::default()
        };
        let id = db
            .query(&query)
            .ok_or_else(|| anyhow!("font family '{family}' not found in system database"))?;
        let (source, _face_index) = db
            .face_source(id)
            .ok_or_else(|| anyhow!("font family '{family}' has no readable source"))?;
        match source {
            fontdb::Source::File(path) => self.open_file(&path),
            fontdb::Source::Binary(bytes) => {
                Ok(self.open_memory(bytes.as_ref().as_ref().to_vec(), family))
            }
            _ => Err(anyhow!("unsupported source kind for family '{family}'")),
        }
    }

    /// Byte source for a font index. Removed/unknown indices surface as
    /// typed errors for the requester chain.
    pub fn data(&self, font_index: usize) -> Result<Arc<Vec<u8>>, FontOpenError> {
        match self.files.get(font_index) {
            Some(Some(file)) => Ok(Arc::clone(&file.data)),
            Some(None) => Err(FontOpenError::FontRemoved(font_index)),
            None => Err(FontOpenError::UnknownFont(font_index)),
        }
    }

    pub fn get(&self, font_index: usize) -> Option<&FontFile> {
        self.files.get(font_index).and_then(|f| f.as_ref())
    }

    pub fn is_open(&self, font_index: usize) -> bool {
        self.get(font_index).is_some()
    }

    /// Retire a font slot. Later indices keep their positions.
    pub fn remove(&mut self, font_index: usize) -> bool {
        match self.files.get_mut(font_index) {
            Some(slot @ Some(_)) => {
                *slot = None;
                log::info!("removed font {font_index}");
                true
            }
            _ => false,
        }
    }

    /// Number of fonts currently open (retired slots excluded).
    pub fn open_count(&self) -> usize {
        self.files.iter().filter(|f| f.is_some()).count()
    }

    /// One past the highest index ever allocated.
    pub fn index_limit(&self) -> usize {
        self.files.len()
    }

    /// True if the backing file changed on disk (or vanished) since it was
    /// read. In-memory fonts never change.
    pub fn has_changed(&self, font_index: usize) -> bool {
        let Some(file) = self.get(font_index) else {
            return false;
        };
        let Some(path) = &file.path else {
            return false;
        };
        match std::fs::metadata(path).and_then(|m| m.modified()) {
            Ok(mtime) => file.mtime != Some(mtime),
            // Deleted or unreadable counts as changed.
            Err(_) => true,
        }
    }

    /// Re-read a changed file from disk. Returns true if bytes were
    /// refreshed; the caller is responsible for resetting caches.
    pub fn reload_if_changed(&mut self, font_index: usize) -> Result<bool> {
        if !self.has_changed(font_index) {
            return Ok(false);
        }
        let path = self
            .get(font_index)
            .and_then(|f| f.path().map(Path::to_path_buf))
            .ok_or_else(|| anyhow!("font {font_index} has no backing file"))?;
        let data = std::fs::read(&path)
            .with_context(|| format!("failed to re-read font file '{}'", path.display()))?;
        let mtime = std::fs::metadata(&path).and_then(|m| m.modified()).ok();
        if let Some(Some(file)) = self.files.get_mut(font_index) {
            file.data = Arc::new(data);
            file.mtime = mtime;
        }
        log::info!("reloaded changed font file '{}'", path.display());
        Ok(true)
    }

    fn push(&mut self, file: FontFile) -> usize {
        self.files.push(Some(file));
        self.files.len() - 1
    }
}
