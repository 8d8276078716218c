//! Checksum injection and verification for embedded attachments.
//!
//! The metadata document lists each binary attachment as an
//! `<an:embeddedContent file="..."/>` element. Signing injects a `checksum`
//! attribute per attachment; validation recomputes each digest and compares.
//!
//! Injection edits the document by splicing attribute text into the original
//! string at byte ranges reported by the parser. Every byte outside the
//! injected attributes is preserved verbatim, which the downstream signature
//! depends on: the external services hash the serialized document as-is.

use std::path::Path;

use log::debug;

use crate::{
    digest::file_digest,
    error::{Error, Result},
};

/// Local name of the element referencing one embedded attachment.
pub const ATTACHMENT_ELEMENT: &str = "embeddedContent";
/// Attribute naming the attachment file, relative to the package folder.
pub const FILE_ATTR: &str = "file";
/// Attribute carrying the attachment's content digest.
pub const CHECKSUM_ATTR: &str = "checksum";

/// Result of verifying every attachment checksum in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentCheck {
    /// Every attachment digest matched (vacuously true for zero attachments).
    Valid,
    /// The first attachment whose stored digest did not match; attachments
    /// after it were not examined.
    Mismatch { attachment: String },
}

impl AttachmentCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, AttachmentCheck::Valid)
    }
}

/// One pending text edit, applied back-to-front so ranges stay valid.
enum Edit {
    /// Replace `range` with the new text.
    Replace(std::ops::Range<usize>, String),
    /// Insert the new text at the byte offset.
    Insert(usize, String),
}

/// Compute and inject a `checksum` attribute into every embedded-attachment
/// element of `xml`, resolving attachment files under `pkg_dir`.
///
/// The returned document is byte-identical to the input outside the injected
/// (or replaced) `checksum` attributes. Fails with a parse error on malformed
/// XML and with an I/O error if any referenced attachment is absent; no
/// partial result is produced on failure.
pub fn inject_checksums(xml: &str, pkg_dir: &Path) -> Result<String> {
    let doc = roxmltree::Document::parse(xml).map_err(|e| Error::Parse(e.to_string()))?;

    let mut edits = Vec::new();
    for node in doc.descendants() {
        if !node.is_element() || node.tag_name().name() != ATTACHMENT_ELEMENT {
            continue;
        }
        let file_name = node
            .attribute(FILE_ATTR)
            .ok_or_else(|| Error::Parse(format!("{ATTACHMENT_ELEMENT} element has no {FILE_ATTR} attribute")))?;

        let att_path = pkg_dir.join(file_name);
        if !att_path.exists() {
            return Err(Error::missing_file(&att_path));
        }
        let checksum = file_digest(&att_path)?;
        debug!("checksum for {file_name}: {checksum}");

        let tag = OpeningTag::scan(xml, node.range().start)?;
        let attr_text = format!("{CHECKSUM_ATTR}=\"{checksum}\"");
        match tag.attribute_span(CHECKSUM_ATTR) {
            Some(span) => edits.push(Edit::Replace(span, attr_text)),
            None => edits.push(Edit::Insert(tag.insert_at, format!(" {attr_text}"))),
        }
    }

    let mut out = xml.to_owned();
    edits.sort_by_key(|e| std::cmp::Reverse(match e {
        Edit::Replace(range, _) => range.start,
        Edit::Insert(at, _) => *at,
    }));
    for edit in edits {
        match edit {
            Edit::Replace(range, text) => out.replace_range(range, &text),
            Edit::Insert(at, text) => out.insert_str(at, &text),
        }
    }
    Ok(out)
}

/// Recompute the digest of every referenced attachment under `pkg_dir` and
/// compare it with the stored `checksum` attribute.
///
/// Stops at the first mismatch (an absent `checksum` attribute counts as a
/// mismatch) and names the failing attachment. A document with no attachment
/// elements verifies successfully.
pub fn verify_checksums(xml: &str, pkg_dir: &Path) -> Result<AttachmentCheck> {
    let doc = roxmltree::Document::parse(xml).map_err(|e| Error::Parse(e.to_string()))?;

    for node in doc.descendants() {
        if !node.is_element() || node.tag_name().name() != ATTACHMENT_ELEMENT {
            continue;
        }
        let file_name = node
            .attribute(FILE_ATTR)
            .ok_or_else(|| Error::Parse(format!("{ATTACHMENT_ELEMENT} element has no {FILE_ATTR} attribute")))?;

        let Some(stored) = node.attribute(CHECKSUM_ATTR) else {
            debug!("attachment {file_name} has no stored checksum");
            return Ok(AttachmentCheck::Mismatch {
                attachment: file_name.to_owned(),
            });
        };

        let att_path = pkg_dir.join(file_name);
        if !att_path.exists() {
            return Err(Error::missing_file(&att_path));
        }
        let computed = file_digest(&att_path)?;
        if computed != stored {
            debug!("attachment {file_name} digest {computed} != stored {stored}");
            return Ok(AttachmentCheck::Mismatch {
                attachment: file_name.to_owned(),
            });
        }
    }
    Ok(AttachmentCheck::Valid)
}

/// Textual view of one element's opening tag in the source document.
struct OpeningTag {
    /// Byte offset of `<` in the source.
    start: usize,
    /// Tag text including the angle brackets.
    text: String,
    /// Byte offset (in the source) where a new attribute is inserted: just
    /// before `>`, or before `/>` for an empty element.
    insert_at: usize,
}

impl OpeningTag {
    /// Scan the opening tag beginning at `start` (which must point at `<`).
    ///
    /// The closing `>` is found with a quote-aware scan since `>` is legal
    /// inside attribute values.
    fn scan(xml: &str, start: usize) -> Result<OpeningTag> {
        let bytes = xml.as_bytes();
        let mut quote: Option<u8> = None;
        let mut i = start;
        while i < bytes.len() {
            let b = bytes[i];
            match quote {
                Some(q) => {
                    if b == q {
                        quote = None;
                    }
                }
                None => match b {
                    b'"' | b'\'' => quote = Some(b),
                    b'>' => {
                        let insert_at = if bytes[i - 1] == b'/' { i - 1 } else { i };
                        return Ok(OpeningTag {
                            start,
                            text: xml[start..=i].to_owned(),
                            insert_at,
                        });
                    }
                    _ => {}
                },
            }
            i += 1;
        }
        Err(Error::Parse("unterminated opening tag".to_owned()))
    }

    /// Byte span (in the source document) of the `name="value"` token for the
    /// given attribute, or `None` if the tag does not carry it.
    fn attribute_span(&self, name: &str) -> Option<std::ops::Range<usize>> {
        let bytes = self.text.as_bytes();
        // Skip "<tagname"
        let mut i = 1;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' && bytes[i] != b'/' {
            i += 1;
        }
        while i < bytes.len() {
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i >= bytes.len() || bytes[i] == b'>' || bytes[i] == b'/' {
                return None;
            }
            let name_start = i;
            while i < bytes.len() && bytes[i] != b'=' && !bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            let attr_name = &self.text[name_start..i];
            while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b'=') {
                i += 1;
            }
            if i >= bytes.len() {
                return None;
            }
            let q = bytes[i];
            i += 1;
            while i < bytes.len() && bytes[i] != q {
                i += 1;
            }
            i += 1; // past the closing quote
            if attr_name == name {
                return Some(self.start + name_start..self.start + i);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gwd:package xmlns:gwd="http://gawati.org/ns/1.0" xmlns:an="http://docs.oasis-open.org/legaldocml/ns/akn/3.0">
  <an:akomaNtoso>
    <an:embeddedContent file="att1.pdf"/>
    <an:embeddedContent file="att2.pdf"/>
  </an:akomaNtoso>
</gwd:package>
"#;

    fn write_attachments(dir: &Path) {
        fs::write(dir.join("att1.pdf"), b"first attachment").unwrap();
        fs::write(dir.join("att2.pdf"), b"second attachment").unwrap();
    }

    #[test]
    fn inject_then_verify_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        write_attachments(dir.path());

        let injected = inject_checksums(DOC, dir.path()).unwrap();
        assert_eq!(verify_checksums(&injected, dir.path()).unwrap(), AttachmentCheck::Valid);
    }

    #[test]
    fn injection_only_adds_checksum_attributes() {
        let dir = tempfile::tempdir().unwrap();
        write_attachments(dir.path());

        let injected = inject_checksums(DOC, dir.path()).unwrap();
        let d1 = file_digest(&dir.path().join("att1.pdf")).unwrap();
        let d2 = file_digest(&dir.path().join("att2.pdf")).unwrap();
        let expected = DOC
            .replace(
                r#"file="att1.pdf""#,
                &format!(r#"file="att1.pdf" checksum="{d1}""#),
            )
            .replace(
                r#"file="att2.pdf""#,
                &format!(r#"file="att2.pdf" checksum="{d2}""#),
            );
        assert_eq!(injected, expected);
    }

    #[test]
    fn reinjection_replaces_stale_checksum() {
        let dir = tempfile::tempdir().unwrap();
        write_attachments(dir.path());

        let injected = inject_checksums(DOC, dir.path()).unwrap();
        fs::write(dir.path().join("att1.pdf"), b"rewritten").unwrap();

        let reinjected = inject_checksums(&injected, dir.path()).unwrap();
        assert_eq!(verify_checksums(&reinjected, dir.path()).unwrap(), AttachmentCheck::Valid);
        // No duplicate attributes were produced
        assert_eq!(reinjected.matches(CHECKSUM_ATTR).count(), 2);
    }

    #[test]
    fn tampering_is_detected_and_scan_stops_at_first_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        write_attachments(dir.path());

        let injected = inject_checksums(DOC, dir.path()).unwrap();
        fs::write(dir.path().join("att1.pdf"), b"tampered").unwrap();
        // If the scan continued past the first mismatch it would fail with an
        // I/O error on the removed second attachment.
        fs::remove_file(dir.path().join("att2.pdf")).unwrap();

        assert_eq!(
            verify_checksums(&injected, dir.path()).unwrap(),
            AttachmentCheck::Mismatch {
                attachment: "att1.pdf".to_owned()
            }
        );
    }

    #[test]
    fn missing_stored_checksum_is_a_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        write_attachments(dir.path());

        assert_eq!(
            verify_checksums(DOC, dir.path()).unwrap(),
            AttachmentCheck::Mismatch {
                attachment: "att1.pdf".to_owned()
            }
        );
    }

    #[test]
    fn document_without_attachments_is_vacuously_valid() {
        let dir = tempfile::tempdir().unwrap();
        let xml = r#"<gwd:package xmlns:gwd="http://gawati.org/ns/1.0"><doc/></gwd:package>"#;
        assert_eq!(verify_checksums(xml, dir.path()).unwrap(), AttachmentCheck::Valid);
        assert_eq!(inject_checksums(xml, dir.path()).unwrap(), xml);
    }

    #[test]
    fn missing_attachment_file_fails_injection() {
        let dir = tempfile::tempdir().unwrap();
        let err = inject_checksums(DOC, dir.path()).unwrap_err();
        assert_eq!(err.code(), "io_error");
    }

    #[test]
    fn malformed_xml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = inject_checksums("<gwd:package>", dir.path()).unwrap_err();
        assert_eq!(err.code(), "parse_error");
    }
}
