//! Whitespace trimming for the signature region of the metadata document.
//!
//! The external validator rehashes the exact bytes from the `<Signature>`
//! opening tag through the package root's closing tag. Serializers are free
//! to introduce whitespace between tags there, and any such whitespace breaks
//! verification, so it is stripped before the validate call. The sign path
//! must never apply this: the signer canonicalizes its own copy.
//!
//! This is deliberately not XML-C14N; it only removes whitespace-only text
//! between adjacent tags inside one region.

/// Opening-tag prefix marking the start of the signature region.
pub const SIGNATURE_OPEN: &str = "<Signature";
/// Closing tag of the package root, ending the signature region.
pub const PACKAGE_CLOSE: &str = "</gwd:package>";

/// Remove whitespace between adjacent tags inside the signature region.
///
/// The region runs from the first `<Signature` opening tag through the first
/// `</gwd:package>` after it. Bytes outside the region are untouched. A
/// document without a signature element is returned unchanged. Idempotent.
pub fn trim_signature_whitespace(xml: &str) -> String {
    let Some(start) = xml.find(SIGNATURE_OPEN) else {
        return xml.to_owned();
    };
    let Some(close_rel) = xml[start..].find(PACKAGE_CLOSE) else {
        return xml.to_owned();
    };
    let end = start + close_rel + PACKAGE_CLOSE.len();

    let mut out = String::with_capacity(xml.len());
    out.push_str(&xml[..start]);
    out.push_str(&collapse_intertag_whitespace(&xml[start..end]));
    out.push_str(&xml[end..]);
    out
}

/// Delete every run of whitespace occurring strictly between a `>` and the
/// next `<`. Whitespace inside tags or mixed with other text is kept.
fn collapse_intertag_whitespace(region: &str) -> String {
    let mut out = String::with_capacity(region.len());
    let mut rest = region;
    while let Some(pos) = rest.find('>') {
        out.push_str(&rest[..=pos]);
        let after = &rest[pos + 1..];
        let trimmed = after.trim_start();
        rest = if trimmed.starts_with('<') { trimmed } else { after };
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNED: &str = "<?xml version=\"1.0\"?>\n<gwd:package xmlns:gwd=\"g\">\n  <doc>\n    body text\n  </doc>\n  <Signature xmlns=\"http://www.w3.org/2000/09/xmldsig#\">\n    <SignedInfo>\n      <Reference URI=\"\"/>\n    </SignedInfo>\n    <SignatureValue>AbCd</SignatureValue>\n  </Signature>\n</gwd:package>\n";

    #[test]
    fn strips_whitespace_only_inside_region() {
        let trimmed = trim_signature_whitespace(SIGNED);

        // Region is collapsed down to adjacent tags
        assert!(trimmed.contains("<Signature xmlns=\"http://www.w3.org/2000/09/xmldsig#\"><SignedInfo><Reference URI=\"\"/></SignedInfo><SignatureValue>AbCd</SignatureValue></Signature></gwd:package>"));
        // Everything before the region is untouched
        assert!(trimmed.starts_with("<?xml version=\"1.0\"?>\n<gwd:package xmlns:gwd=\"g\">\n  <doc>\n    body text\n  </doc>\n  "));
        // Everything after is untouched
        assert!(trimmed.ends_with("</gwd:package>\n"));
    }

    #[test]
    fn idempotent() {
        let once = trim_signature_whitespace(SIGNED);
        let twice = trim_signature_whitespace(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn non_whitespace_text_in_region_is_kept() {
        let xml = "<gwd:package><Signature><SignatureValue>A B\nC</SignatureValue></Signature></gwd:package>";
        assert_eq!(trim_signature_whitespace(xml), xml);
    }

    #[test]
    fn document_without_signature_is_unchanged() {
        let xml = "<gwd:package>\n  <doc/>\n</gwd:package>";
        assert_eq!(trim_signature_whitespace(xml), xml);
    }

    #[test]
    fn unterminated_region_is_unchanged() {
        let xml = "<other><Signature></Signature></other>";
        assert_eq!(trim_signature_whitespace(xml), xml);
    }
}
