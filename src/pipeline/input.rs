//! Input resolution: validate the user-supplied path and derive names from it.
//!
//! We check the PDF magic bytes (`%PDF`) up front so callers get a
//! meaningful error rather than an opaque pdfium failure.

use crate::error::Pdf2EpubError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate that `path` exists, is readable and starts with `%PDF`.
pub fn resolve_local(path: &Path) -> Result<PathBuf, Pdf2EpubError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(Pdf2EpubError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(Pdf2EpubError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2EpubError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(Pdf2EpubError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

/// The input path with its extension replaced by `.epub`.
pub fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("epub")
}

/// Package identifier derived from the input's base name: `pdf-{stem}`.
pub fn book_identifier(input: &Path) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    format!("pdf-{stem}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn output_path_replaces_extension() {
        assert_eq!(
            default_output_path(Path::new("/books/atlas.pdf")),
            PathBuf::from("/books/atlas.epub")
        );
        assert_eq!(
            default_output_path(Path::new("scan")),
            PathBuf::from("scan.epub")
        );
    }

    #[test]
    fn identifier_uses_file_stem() {
        assert_eq!(book_identifier(Path::new("/tmp/My Book.v2.pdf")), "pdf-My Book.v2");
        assert_eq!(book_identifier(Path::new("notes.pdf")), "pdf-notes");
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = resolve_local(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, Pdf2EpubError::FileNotFound { .. }));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"PK\x03\x04not a pdf").unwrap();
        let err = resolve_local(f.path()).unwrap_err();
        match err {
            Pdf2EpubError::NotAPdf { magic, .. } => assert_eq!(&magic, b"PK\x03\x04"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn pdf_magic_is_accepted() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-1.7\n").unwrap();
        assert_eq!(resolve_local(f.path()).unwrap(), f.path().to_path_buf());
    }
}
