//! Cover leaf rendering: image + page geometry → single-page PDF.
//!
//! The image is scaled to cover the whole page raster and centre-cropped
//! (never stretched), encoded as JPEG and drawn full-bleed on a page whose
//! MediaBox is the requested size. No timestamps, IDs or compression passes
//! are written, so identical inputs give byte-identical output.

use crate::config::{ExportOptions, PageSize};
use crate::error::CoverError;
use crate::model::CoverCandidate;
use crate::pipeline::encode::encode_jpeg;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use lopdf::{dictionary, Document, Object, Stream};
use tracing::debug;

/// Render `cover` into a cover leaf using `options`' geometry.
pub fn render(cover: &CoverCandidate, options: &ExportOptions) -> Result<Vec<u8>, CoverError> {
    let image = cover.decode()?;
    render_cover_page(&image, options.page_size, options.dpi, options.jpeg_quality)
}

/// Render an already-decoded image into a cover leaf.
pub fn render_cover_page(
    image: &DynamicImage,
    page_size: PageSize,
    dpi: u32,
    jpeg_quality: u8,
) -> Result<Vec<u8>, CoverError> {
    let (px_w, px_h) = page_size.pixels(dpi);
    let raster = fill_crop(image, px_w, px_h);
    debug!(
        "Cover raster {}x{} → {}x{} px ({} @ {} dpi)",
        image.width(),
        image.height(),
        px_w,
        px_h,
        page_size,
        dpi
    );
    let jpeg = encode_jpeg(&raster, jpeg_quality)?;
    single_page_pdf(jpeg, (px_w, px_h), page_size.points())
}

/// Scale `image` so it covers `width × height`, then crop the overflow
/// equally from both sides.
pub fn fill_crop(image: &DynamicImage, width: u32, height: u32) -> RgbImage {
    image.resize_to_fill(width, height, FilterType::Lanczos3).to_rgb8()
}

fn single_page_pdf(jpeg: Vec<u8>, pixels: (u32, u32), points: (u32, u32)) -> Result<Vec<u8>, CoverError> {
    let (px_w, px_h) = pixels;
    let (pt_w, pt_h) = points;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => px_w as i64,
            "Height" => px_h as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8_i64,
            "Filter" => "DCTDecode",
        },
        jpeg,
    )
    .with_compression(false);
    let image_id = doc.add_object(image_stream);

    let content = format!("q\n{pt_w} 0 0 {pt_h} 0 0 cm\n/Im0 Do\nQ\n");
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0_i64.into(), 0_i64.into(), (pt_w as i64).into(), (pt_h as i64).into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                "Im0" => image_id,
            },
        },
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1_i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).map_err(|e| CoverError::RenderFailed {
        detail: format!("cannot serialise cover page: {e}"),
    })?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Wide image split into red | green | blue thirds.
    fn tricolour(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, _| match x * 3 / w {
            0 => Rgb([255, 0, 0]),
            1 => Rgb([0, 255, 0]),
            _ => Rgb([0, 0, 255]),
        }))
    }

    fn media_box(pdf: &[u8]) -> Vec<i64> {
        let doc = Document::load_mem(pdf).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);
        let page_id = pages[&1];
        let page = doc.get_dictionary(page_id).unwrap();
        page.get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o.as_i64().unwrap())
            .collect()
    }

    #[test]
    fn wide_image_is_centre_cropped() {
        let raster = fill_crop(&tricolour(300, 100), 10, 20);
        assert_eq!(raster.dimensions(), (10, 20));
        let Rgb([r, g, b]) = *raster.get_pixel(5, 10);
        assert!(g > 200 && r < 50 && b < 50, "expected green centre, got {r},{g},{b}");
    }

    #[test]
    fn page_has_requested_geometry() {
        let pdf = render_cover_page(&tricolour(60, 80), PageSize::A4, 72, 90).unwrap();
        assert_eq!(media_box(&pdf), vec![0, 0, 595, 842]);

        let pdf = render_cover_page(&tricolour(60, 80), PageSize::Letter, 72, 90).unwrap();
        assert_eq!(media_box(&pdf), vec![0, 0, 612, 792]);
    }

    #[test]
    fn image_xobject_matches_dpi() {
        let pdf = render_cover_page(&tricolour(60, 80), PageSize::Letter, 144, 90).unwrap();
        let doc = Document::load_mem(&pdf).unwrap();
        let image = doc
            .objects
            .values()
            .filter_map(|o| o.as_stream().ok())
            .find(|s| s.dict.get(b"Subtype").and_then(|v| v.as_name()).ok() == Some(b"Image".as_slice()))
            .expect("image xobject");
        assert_eq!(image.dict.get(b"Width").unwrap().as_i64().unwrap(), 1224);
        assert_eq!(image.dict.get(b"Height").unwrap().as_i64().unwrap(), 1584);
    }

    #[test]
    fn render_is_deterministic() {
        let img = tricolour(120, 90);
        let a = render_cover_page(&img, PageSize::A4, 96, 85).unwrap();
        let b = render_cover_page(&img, PageSize::A4, 96, 85).unwrap();
        assert_eq!(a, b);
    }
}
