//! Browsing collaborator: an ordered, indexable list of locators.
//!
//! The viewer only sees the `Browser` trait. `DirBrowser` lists the images in
//! one directory; archive-backed browsers implement the same trait.

use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::core::locator::Locator;
use crate::error::{Error, Result};

/// Image suffixes decodable by the default `ImageDecoder`.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "jfif", "tif", "tiff", "tga", "bmp", "gif", "webp",
];

pub trait Browser: Send {
    /// Selected index, if the collection is non-empty.
    fn current_index(&self) -> Option<usize>;

    fn count(&self) -> usize;

    /// Locator at `index` without moving the selection.
    fn get(&self, index: usize) -> Option<Locator>;

    /// Folder or archive the collection came from.
    fn source(&self) -> &Path;

    /// Select `index`.
    fn select(&mut self, index: usize) -> Option<Locator>;

    /// File name shown to the user.
    fn display_name(&self, index: usize) -> Option<String> {
        self.get(index).map(|l| l.display_name())
    }

    fn current(&self) -> Option<Locator> {
        self.current_index().and_then(|i| self.get(i))
    }

    /// Index `offset` steps from the selection, wrapping at both ends.
    fn index_relative(&self, offset: i64) -> Option<usize> {
        let count = self.count() as i64;
        let current = self.current_index()? as i64;
        if count == 0 {
            return None;
        }
        Some((current + offset).rem_euclid(count) as usize)
    }

    /// Move the selection by `direction` and return the new locator.
    fn step(&mut self, direction: i64) -> Option<Locator> {
        let index = self.index_relative(direction)?;
        self.select(index)
    }

    /// Locator `offset` steps away, without moving the selection (prefetch).
    fn peek_relative(&self, offset: i64) -> Option<Locator> {
        self.index_relative(offset).and_then(|i| self.get(i))
    }
}

/// Images of one directory, sorted by path.
#[derive(Debug, Clone)]
pub struct DirBrowser {
    dir: PathBuf,
    files: Vec<PathBuf>,
    index: usize,
}

impl DirBrowser {
    /// Browse `path`: a directory starts at its first image, a file browses
    /// its parent directory starting at that file.
    ///
    /// Fails with `EmptyCollection` when no file matches `extensions`
    /// (compared case-insensitively, without the dot).
    pub fn open(path: &Path, extensions: &[String]) -> Result<Self> {
        let (dir, selected) = if path.is_dir() {
            (path.to_path_buf(), None)
        } else {
            let parent = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            (parent.to_path_buf(), Some(path))
        };

        let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .flatten()
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && has_extension(p, extensions))
            .collect();
        if files.is_empty() {
            return Err(Error::EmptyCollection(dir));
        }
        files.sort();

        let index = selected
            .and_then(|sel| files.iter().position(|f| f == sel || f.file_name() == sel.file_name()))
            .unwrap_or(0);

        info!("Browsing {}: {} images, starting at {}", dir.display(), files.len(), index);
        Ok(Self { dir, files, index })
    }
}

impl Browser for DirBrowser {
    fn current_index(&self) -> Option<usize> {
        (!self.files.is_empty()).then_some(self.index)
    }

    fn count(&self) -> usize {
        self.files.len()
    }

    fn get(&self, index: usize) -> Option<Locator> {
        self.files.get(index).map(|p| Locator::from(p.as_path()))
    }

    fn source(&self) -> &Path {
        &self.dir
    }

    fn select(&mut self, index: usize) -> Option<Locator> {
        let locator = self.get(index)?;
        debug!("Select {}/{}: {}", index + 1, self.files.len(), locator);
        self.index = index;
        Some(locator)
    }
}

/// Case-insensitive suffix check.
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            extensions
                .iter()
                .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

pub fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect()
}
