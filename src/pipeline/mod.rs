//! Pipeline stages for attaching a cover leaf to a PDF.
//!
//! Each submodule implements exactly one transformation step and is
//! independently testable.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ assemble ──▶ (export writes the result)
//! (paths)   (cover)    (lopdf)
//! ```
//!
//! 1. [`input`]    validate the source PDF and cover image paths
//! 2. [`render`]   fill-crop the cover image into a single-page PDF
//! 3. [`encode`]   JPEG for the cover raster, PNG for saved pictures
//! 4. [`assemble`] splice the cover leaf in front of the source pages
//!
//! [`preview`] is the odd one out: it rasterises page 1 of a finished PDF
//! through pdfium so the result can be checked visually.
//!
//! `render` and `assemble` are CPU-bound and synchronous; the export
//! coordinator runs them inside `spawn_blocking`.

pub mod assemble;
pub mod encode;
pub mod input;
pub mod preview;
pub mod render;

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory PDF fixtures.

    use lopdf::{dictionary, Document, Object, ObjectId, Stream};

    fn page(doc: &mut Document, parent: ObjectId, n: usize) -> Object {
        let text = format!("BT /F1 24 Tf 72 720 Td (Page {n}) Tj ET");
        let content_id = doc.add_object(Stream::new(dictionary! {}, text.into_bytes()));
        doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => parent,
            "Contents" => content_id,
        })
        .into()
    }

    fn finish(mut doc: Document, pages_id: ObjectId, pages: lopdf::Dictionary) -> Vec<u8> {
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal("Sample Book"),
            "Author" => Object::string_literal("Test Author"),
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    fn page_tree(doc: &mut Document, kids: Vec<Object>, count: usize) -> lopdf::Dictionary {
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count as i64,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            "MediaBox" => vec![0_i64.into(), 0_i64.into(), 595_i64.into(), 842_i64.into()],
        }
    }

    /// A flat document with `pages` text pages.
    pub fn sample_pdf(pages: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let kids: Vec<Object> = (1..=pages).map(|n| page(&mut doc, pages_id, n)).collect();
        let tree = page_tree(&mut doc, kids, pages);
        finish(doc, pages_id, tree)
    }

    /// Three pages where pages 2 and 3 hang off an intermediate node.
    pub fn nested_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let inner_id = doc.new_object_id();
        let first = page(&mut doc, pages_id, 1);
        let inner_kids = vec![page(&mut doc, inner_id, 2), page(&mut doc, inner_id, 3)];
        doc.objects.insert(
            inner_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Parent" => pages_id,
                "Kids" => inner_kids,
                "Count" => 2_i64,
            }),
        );
        let tree = page_tree(&mut doc, vec![first, inner_id.into()], 3);
        finish(doc, pages_id, tree)
    }

    /// A structurally valid document with an empty page tree.
    pub fn empty_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let tree = page_tree(&mut doc, Vec::new(), 0);
        finish(doc, pages_id, tree)
    }
}
