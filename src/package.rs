//! Package archive handling and path derivation.
//!
//! A package is a zip archive whose internal root folder matches the archive
//! base name; the metadata document inside it is named after the final
//! segment of the package identifier.

use std::{fs, io, path::Path, path::PathBuf};

use log::debug;

use crate::error::{Error, Result};

/// Extension of the metadata document inside the package.
const DOC_EXTENSION: &str = "xml";

/// Unpack `archive` into `dest`.
///
/// The archive's internal root folder becomes a subdirectory of `dest`.
/// Entries that would escape `dest` are rejected. Fails with an extraction
/// error on corrupt or unsupported archives; extraction failures are fatal
/// for the current pipeline run and are not retried.
pub fn extract(archive: &Path, dest: &Path) -> Result<()> {
    let file = fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let Some(rel_path) = entry.enclosed_name() else {
            return Err(Error::ExtractionFailed(format!(
                "archive entry escapes the destination: {}",
                entry.name()
            )));
        };
        let out_path = dest.join(rel_path);
        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
        } else {
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = fs::File::create(&out_path)?;
            io::copy(&mut entry, &mut out)?;
        }
    }
    debug!("extracted {} into {}", archive.display(), dest.display());
    Ok(())
}

/// Normalize a submitted package identifier: non-empty and starting with `/`.
pub fn normalize_iri(iri: &str) -> Result<String> {
    let iri = iri.trim();
    if iri.is_empty() || iri.chars().all(|c| c == '/') {
        return Err(Error::IdentifierInvalid("identifier is empty".to_owned()));
    }
    if iri.starts_with('/') {
        Ok(iri.to_owned())
    } else {
        Ok(format!("/{iri}"))
    }
}

/// Metadata document file name for an identifier: its final path segment
/// plus the `.xml` extension (`/akn/.../!main` becomes `!main.xml`).
pub fn document_file_name(iri: &str) -> Result<String> {
    let segment = iri
        .split('/')
        .rev()
        .find(|s| !s.is_empty())
        .ok_or_else(|| Error::IdentifierInvalid(format!("no file segment in '{iri}'")))?;
    Ok(format!("{segment}.{DOC_EXTENSION}"))
}

/// Package folder name for a retrieved archive: its base name without the
/// `.zip` extension.
pub fn package_folder_name(archive: &Path) -> Result<String> {
    archive
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_owned)
        .ok_or_else(|| {
            Error::ExtractionFailed(format!("archive has no base name: {}", archive.display()))
        })
}

/// On-disk path of the metadata document for an identifier, inside the
/// package folder extracted under `scratch_dir`.
///
/// Deterministic: the same archive path and identifier always resolve to the
/// byte-identical path.
pub fn document_path(scratch_dir: &Path, archive: &Path, iri: &str) -> Result<PathBuf> {
    let folder = package_folder_name(archive)?;
    let doc_name = document_file_name(iri)?;
    Ok(scratch_dir.join(folder).join(doc_name))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;

    use super::*;

    /// Build a package archive the way the editor service ships them: one
    /// root folder holding the metadata document and attachments.
    pub(crate) fn write_package_zip(
        zip_path: &Path,
        folder: &str,
        files: &[(&str, &[u8])],
    ) {
        let file = fs::File::create(zip_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, contents) in files {
            writer
                .start_file(format!("{folder}/{name}"), SimpleFileOptions::default())
                .unwrap();
            writer.write_all(contents).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn extract_creates_package_folder() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("Cap_44.zip");
        write_package_zip(
            &zip_path,
            "Cap_44",
            &[("!main.xml", b"<doc/>"), ("att1.pdf", b"pdf bytes")],
        );

        extract(&zip_path, dir.path()).unwrap();
        assert_eq!(
            fs::read(dir.path().join("Cap_44").join("!main.xml")).unwrap(),
            b"<doc/>"
        );
        assert_eq!(
            fs::read(dir.path().join("Cap_44").join("att1.pdf")).unwrap(),
            b"pdf bytes"
        );
    }

    #[test]
    fn corrupt_archive_is_an_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("broken.zip");
        fs::write(&zip_path, b"this is not a zip archive").unwrap();

        let err = extract(&zip_path, dir.path()).unwrap_err();
        assert_eq!(err.code(), "extraction_failed");
    }

    #[test]
    fn iri_normalization_enforces_leading_slash() {
        assert_eq!(normalize_iri("/akn/ke/act").unwrap(), "/akn/ke/act");
        assert_eq!(normalize_iri("akn/ke/act").unwrap(), "/akn/ke/act");
        assert_eq!(normalize_iri(" akn ").unwrap(), "/akn");
        assert_eq!(normalize_iri("").unwrap_err().code(), "identifier_invalid");
        assert_eq!(normalize_iri("///").unwrap_err().code(), "identifier_invalid");
    }

    #[test]
    fn document_name_comes_from_final_segment() {
        assert_eq!(
            document_file_name("/akn/ke/act/1970/Cap_44/eng@/!main").unwrap(),
            "!main.xml"
        );
        assert_eq!(document_file_name("/akn/ke/act/main/").unwrap(), "main.xml");
    }

    #[test]
    fn document_path_is_deterministic() {
        let scratch = Path::new("/tmp/ds/req-1");
        let archive = Path::new("/tmp/ds/req-1/Cap_44.zip");
        let iri = "/akn/ke/act/1970/Cap_44/eng@/!main";

        let a = document_path(scratch, archive, iri).unwrap();
        let b = document_path(scratch, archive, iri).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, PathBuf::from("/tmp/ds/req-1/Cap_44/!main.xml"));
    }
}
