//! PDF assembly: splice a cover leaf in front of an existing document.
//!
//! Works at the object level with `lopdf`: the cover leaf's objects are
//! renumbered past the source's highest id, its page is hung off the source's
//! root page node at position 0, and nothing else in the source changes.
//! Page content streams, the document information dictionary and the rest of
//! the catalog are carried over as-is.

use crate::error::CoverError;
use lopdf::{Document, Object, ObjectId};
use tracing::debug;

/// Readers accept a `%PDF-` header anywhere in the first KiB.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Offset of the `%PDF-` header, if it starts within the search window.
pub fn header_offset(bytes: &[u8]) -> Option<usize> {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW + 5)];
    window.windows(5).position(|w| w == b"%PDF-")
}

/// Parse source bytes and reject encrypted or empty documents.
///
/// Leading junk before the header is skipped; object offsets are then taken
/// relative to the header.
pub fn parse_source(bytes: &[u8]) -> Result<Document, CoverError> {
    let start = header_offset(bytes).ok_or_else(|| CoverError::CorruptSource {
        detail: "no %PDF- header in the first 1024 bytes".into(),
    })?;
    if start > 0 {
        debug!("Skipping {} byte(s) before the PDF header", start);
    }
    let doc = Document::load_mem(&bytes[start..]).map_err(|e| CoverError::CorruptSource {
        detail: format!("cannot parse PDF: {e}"),
    })?;
    if doc.is_encrypted() {
        return Err(CoverError::CorruptSource {
            detail: "document is encrypted".into(),
        });
    }
    if doc.get_pages().is_empty() {
        return Err(CoverError::CorruptSource {
            detail: "document has no pages".into(),
        });
    }
    Ok(doc)
}

/// Prepend `cover_page` (a single-page PDF) to `source`.
pub fn prepend(source: &[u8], cover_page: &[u8]) -> Result<Vec<u8>, CoverError> {
    prepend_with(source, cover_page, false)
}

/// Prepend `cover_page` to `source`, optionally dropping the source's
/// first page. The drop only happens when the source has more than one page.
pub fn prepend_with(
    source: &[u8],
    cover_page: &[u8],
    replace_first_page: bool,
) -> Result<Vec<u8>, CoverError> {
    let mut doc = parse_source(source)?;

    if replace_first_page {
        if doc.get_pages().len() > 1 {
            doc.delete_pages(&[1]);
            doc.prune_objects();
            debug!("Dropped original first page");
        } else {
            debug!("Single-page source, keeping its only page");
        }
    }

    let mut cover = Document::load_mem(cover_page).map_err(|e| CoverError::RenderFailed {
        detail: format!("cover leaf is not a valid PDF: {e}"),
    })?;
    cover.renumber_objects_with(doc.max_id + 1);
    doc.max_id = doc.max_id.max(cover.max_id);

    let cover_page_id = *cover
        .get_pages()
        .get(&1)
        .ok_or_else(|| CoverError::RenderFailed {
            detail: "cover leaf has no page".into(),
        })?;
    let (cover_catalog_id, cover_pages_id) = catalog_and_pages(&cover).map_err(|detail| {
        CoverError::RenderFailed {
            detail: format!("cover leaf: {detail}"),
        }
    })?;

    let (_, root_pages_id) =
        catalog_and_pages(&doc).map_err(|detail| CoverError::CorruptSource { detail })?;
    let pages_before = doc.get_pages().len();

    for (id, object) in cover.objects {
        if id != cover_catalog_id && id != cover_pages_id {
            doc.objects.insert(id, object);
        }
    }

    link_cover_page(&mut doc, cover_page_id, root_pages_id, pages_before)
        .map_err(|detail| CoverError::CorruptSource { detail })?;

    let mut buf = Vec::new();
    doc.save_to(&mut buf)
        .map_err(|e| CoverError::Internal(format!("cannot serialise assembled PDF: {e}")))?;
    debug!(
        "Assembled {} pages → {} bytes",
        pages_before + 1,
        buf.len()
    );
    Ok(buf)
}

/// Ids of the catalog and its root page-tree node.
fn catalog_and_pages(doc: &Document) -> Result<(ObjectId, ObjectId), String> {
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|e| format!("missing catalog: {e}"))?;
    let pages_id = doc
        .get_dictionary(catalog_id)
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|e| format!("missing page tree: {e}"))?;
    Ok((catalog_id, pages_id))
}

fn link_cover_page(
    doc: &mut Document,
    cover_page_id: ObjectId,
    root_pages_id: ObjectId,
    pages_before: usize,
) -> Result<(), String> {
    let root = doc
        .get_dictionary(root_pages_id)
        .map_err(|e| format!("page tree root: {e}"))?;
    let kids_ref = match root.get(b"Kids") {
        Ok(Object::Reference(id)) => Some(*id),
        Ok(_) => None,
        Err(e) => return Err(format!("page tree has no Kids: {e}")),
    };
    // Inherited attributes on the root node must not rotate or crop the cover.
    let inherits_rotate = root.has(b"Rotate");
    let inherits_crop = root.has(b"CropBox");

    let kids = match kids_ref {
        Some(id) => doc.get_object_mut(id).and_then(Object::as_array_mut),
        None => doc
            .get_dictionary_mut(root_pages_id)
            .and_then(|d| d.get_mut(b"Kids"))
            .and_then(Object::as_array_mut),
    }
    .map_err(|e| format!("page tree Kids: {e}"))?;
    kids.insert(0, Object::Reference(cover_page_id));

    doc.get_dictionary_mut(root_pages_id)
        .map_err(|e| format!("page tree root: {e}"))?
        .set("Count", (pages_before + 1) as i64);

    let page = doc
        .get_dictionary_mut(cover_page_id)
        .map_err(|e| format!("cover page: {e}"))?;
    page.set("Parent", root_pages_id);
    if inherits_rotate {
        page.set("Rotate", 0_i64);
    }
    if inherits_crop {
        if let Ok(media_box) = page.get(b"MediaBox").cloned() {
            page.set("CropBox", media_box);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageSize;
    use crate::pipeline::render::render_cover_page;
    use crate::pipeline::testing::{empty_pdf, nested_pdf, sample_pdf};
    use image::{DynamicImage, Rgb, RgbImage};

    fn cover_leaf() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(30, 40, Rgb([90, 30, 160])));
        render_cover_page(&img, PageSize::A4, 72, 90).unwrap()
    }

    fn contents(doc: &Document) -> Vec<Vec<u8>> {
        doc.get_pages()
            .values()
            .map(|id| doc.get_page_content(*id).unwrap())
            .collect()
    }

    #[test]
    fn header_after_leading_junk_is_found() {
        let mut bytes = b"\x00\x00garbage\r\n".to_vec();
        bytes.extend_from_slice(&sample_pdf(2));
        assert_eq!(header_offset(&bytes), Some(11));
        assert_eq!(parse_source(&bytes).unwrap().get_pages().len(), 2);

        let out = prepend(&bytes, &cover_leaf()).unwrap();
        assert_eq!(Document::load_mem(&out).unwrap().get_pages().len(), 3);
    }

    #[test]
    fn header_past_first_kib_is_not_searched() {
        let mut bytes = vec![b' '; 2048];
        bytes.extend_from_slice(&sample_pdf(1));
        assert_eq!(header_offset(&bytes), None);
        assert!(matches!(
            parse_source(&bytes).unwrap_err(),
            CoverError::CorruptSource { .. }
        ));
    }

    #[test]
    fn prepend_adds_one_page_and_keeps_content() {
        let source = sample_pdf(3);
        let out = prepend(&source, &cover_leaf()).unwrap();

        let before = Document::load_mem(&source).unwrap();
        let after = Document::load_mem(&out).unwrap();
        assert_eq!(after.get_pages().len(), 4);
        assert_eq!(&contents(&after)[1..], contents(&before).as_slice());
        assert!(contents(&after)[0].windows(3).any(|w| w == b"/Im"));
    }

    #[test]
    fn metadata_is_preserved() {
        let out = prepend(&sample_pdf(2), &cover_leaf()).unwrap();
        let doc = Document::load_mem(&out).unwrap();
        let info_id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        let info = doc.get_dictionary(info_id).unwrap();
        let title = info.get(b"Title").unwrap().as_str().unwrap();
        assert_eq!(title, b"Sample Book");
    }

    #[test]
    fn nested_page_tree_keeps_order() {
        let source = nested_pdf();
        let out = prepend(&source, &cover_leaf()).unwrap();

        let before = Document::load_mem(&source).unwrap();
        let after = Document::load_mem(&out).unwrap();
        assert_eq!(after.get_pages().len(), before.get_pages().len() + 1);
        assert_eq!(&contents(&after)[1..], contents(&before).as_slice());
    }

    #[test]
    fn replace_first_page_drops_original_cover() {
        let source = sample_pdf(3);
        let out = prepend_with(&source, &cover_leaf(), true).unwrap();

        let before = Document::load_mem(&source).unwrap();
        let after = Document::load_mem(&out).unwrap();
        assert_eq!(after.get_pages().len(), 3);
        assert_eq!(&contents(&after)[1..], &contents(&before)[1..]);
    }

    #[test]
    fn replace_first_page_keeps_single_page() {
        let out = prepend_with(&sample_pdf(1), &cover_leaf(), true).unwrap();
        let after = Document::load_mem(&out).unwrap();
        assert_eq!(after.get_pages().len(), 2);
    }

    #[test]
    fn garbage_is_corrupt_source() {
        let err = prepend(b"%PDF-1.4 garbage", &cover_leaf()).unwrap_err();
        assert!(matches!(err, CoverError::CorruptSource { .. }));
    }

    #[test]
    fn empty_document_is_corrupt_source() {
        let err = prepend(&empty_pdf(), &cover_leaf()).unwrap_err();
        match err {
            CoverError::CorruptSource { detail } => assert!(detail.contains("no pages")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn source_bytes_are_not_modified() {
        let source = sample_pdf(2);
        let copy = source.clone();
        let _ = prepend(&source, &cover_leaf()).unwrap();
        assert_eq!(source, copy);
    }
}
