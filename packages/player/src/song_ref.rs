//! What to decode: either a file under the library root, or a URL.

use std::path::{Path, PathBuf};

use url::Url;

/// A reference to a playable song: either a local path (relative to a
/// [`LibraryRoot`]) or a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SongRef {
    File(PathBuf),
    Url(Url),
}

impl SongRef {
    #[must_use]
    pub const fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }

    /// The suffix used for suffix-based plugin dispatch: the file
    /// extension for a file, or the URL path's extension for a URL.
    #[must_use]
    pub fn suffix(&self) -> Option<&str> {
        match self {
            Self::File(path) => path.extension().and_then(|ext| ext.to_str()),
            Self::Url(url) => Path::new(url.path())
                .extension()
                .and_then(|ext| ext.to_str()),
        }
    }
}

/// The root directory local `SongRef::File` paths are resolved against.
///
/// Grounded on MPD's `map_song_fs`: a song's on-disk path is always
/// relative to the configured music directory, never absolute.
#[derive(Debug, Clone)]
pub struct LibraryRoot(PathBuf);

#[derive(Debug, thiserror::Error)]
pub enum LibraryRootError {
    #[error("path escapes the library root: {0:?}")]
    Escapes(PathBuf),
}

impl LibraryRoot {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self(root.into())
    }

    /// Resolves `relative` against this root, rejecting any path that
    /// would escape it via `..` components.
    ///
    /// # Errors
    ///
    /// * [`LibraryRootError::Escapes`] if `relative` contains a parent
    ///   component.
    pub fn resolve(&self, relative: &Path) -> Result<PathBuf, LibraryRootError> {
        if relative
            .components()
            .any(|component| matches!(component, std::path::Component::ParentDir))
        {
            return Err(LibraryRootError::Escapes(relative.to_path_buf()));
        }
        Ok(self.0.join(relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_refs_report_is_file() {
        let song = SongRef::File(PathBuf::from("a/b.flac"));
        assert!(song.is_file());
        assert_eq!(song.suffix(), Some("flac"));
    }

    #[test]
    fn url_refs_report_suffix_from_path() {
        let song = SongRef::Url(Url::parse("http://example.com/stream.mp3").unwrap());
        assert!(!song.is_file());
        assert_eq!(song.suffix(), Some("mp3"));
    }

    #[test]
    fn library_root_rejects_escaping_paths() {
        let root = LibraryRoot::new("/music");
        assert!(root.resolve(Path::new("../etc/passwd")).is_err());
        assert_eq!(
            root.resolve(Path::new("artist/album/track.flac")).unwrap(),
            PathBuf::from("/music/artist/album/track.flac")
        );
    }
}
