//! The layered document compositor.
//!
//! One render pass owns one surface. The z-order is fixed: white fill,
//! template, photo (or placeholder), hologram tiles, watermark, placement
//! text, MRZ block, then whole-surface post effects. The template and photo
//! decodes are the only awaited operations and are issued concurrently;
//! everything after them is strictly sequential drawing.
//!
//! Asset failures degrade instead of aborting: a missing template becomes a
//! bordered placeholder, a bad photo leaves the "upload photo" slot. Only
//! encoding/checksum failures propagate to the caller.

use kurbo::Shape as _;

use crate::{
    assets::{AssetSource, DecodedImage, FontLibrary, decode_image},
    effects,
    error::{DocforgeError, DocforgeResult},
    model::{DocumentKind, DocumentRecord},
    mrz,
    template::{
        Canvas, DocumentTemplate, PhotoFit, PhotoSlot, SlotRect, TemplateSet, WatermarkSpec,
    },
    text::TextEngine,
};

const PLACEHOLDER_FILL: [u8; 4] = [203, 209, 219, 255];
const PLACEHOLDER_INK: [u8; 4] = [90, 98, 110, 255];
const BORDER_GRAY: [u8; 4] = [120, 128, 140, 255];
const GHOST_OPACITY: f32 = 0.35;
const GHOST_DARKEN: f32 = 0.9;

/// A finished composite: premultiplied RGBA8 at the template's fixed canvas
/// dimensions.
#[derive(Clone, Debug)]
pub struct FrameRgba {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct RenderOptions {
    /// Seed for grain noise (photo chain and post pass). Renders with the
    /// same record, assets and seed are byte-identical.
    pub grain_seed: u64,
    /// Disable to skip the whole-surface post chain entirely.
    pub with_post: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            grain_seed: 0,
            with_post: true,
        }
    }
}

pub struct Compositor {
    text: TextEngine,
    templates: TemplateSet,
}

impl Compositor {
    /// Build a compositor with the built-in templates. All font
    /// registration happens here, never at render time.
    pub fn new(fonts: FontLibrary) -> DocforgeResult<Self> {
        Self::with_templates(fonts, TemplateSet::builtin())
    }

    pub fn with_templates(fonts: FontLibrary, templates: TemplateSet) -> DocforgeResult<Self> {
        templates.validate()?;
        Ok(Self {
            text: TextEngine::new(fonts)?,
            templates,
        })
    }

    /// Render one record to its document's fixed-size surface.
    ///
    /// The template and photo decodes are awaited concurrently; the pass
    /// then draws every layer in the fixed z-order and applies the post
    /// chain. Always runs to completion or error; a superseded render is
    /// the caller's to discard.
    #[tracing::instrument(skip_all, fields(kind = %record.kind))]
    pub async fn render<S: AssetSource>(
        &mut self,
        record: &DocumentRecord,
        source: &S,
        opts: &RenderOptions,
    ) -> DocforgeResult<FrameRgba> {
        record.validate()?;
        let template = self.templates.get(record.kind)?.clone();

        // Encoding failures must surface before any drawing happens.
        let mrz_lines = if template.mrz.is_some() {
            Some(mrz::encode_for_record(record)?)
        } else {
            None
        };

        let (template_img, photo_img, hologram_img) = tokio::join!(
            fetch_template(source, record.kind),
            fetch_photo(record.photo.clone()),
            fetch_hologram(source),
        );

        let width_u16 = surface_dim(template.canvas.width, "width")?;
        let height_u16 = surface_dim(template.canvas.height, "height")?;
        let mut pixmap = vello_cpu::Pixmap::new(width_u16, height_u16);
        clear_pixmap(&mut pixmap, [255, 255, 255, 255]);

        let mut ctx = vello_cpu::RenderContext::new(width_u16, height_u16);

        match template_img {
            Ok(img) => draw_image_stretched(&mut ctx, &img, &template.canvas)?,
            Err(e) => {
                tracing::warn!(error = %e, "template load failed; rendering placeholder");
                self.draw_template_placeholder(&mut ctx, &template.canvas)?;
            }
        }

        let mut photo_drawn = false;
        match photo_img {
            Ok(Some(img)) => {
                draw_photo(&mut ctx, &template.photo, &img, opts)?;
                photo_drawn = true;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "photo decode failed; continuing without photo");
            }
        }
        if !photo_drawn {
            self.draw_photo_placeholder(&mut ctx, &template.photo.rect)?;
        }

        match hologram_img {
            Ok(Some(img)) => draw_holograms(&mut ctx, &template, &img)?,
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "hologram load failed; skipping tiles"),
        }
        if let Some(watermark) = &template.watermark {
            draw_watermark(&mut ctx, watermark)?;
        }

        for placement in &template.placements {
            let value = record.field(&placement.key);
            self.text.render_field(&mut ctx, placement, value)?;
        }

        if let (Some(block), Some((line1, line2))) = (&template.mrz, &mrz_lines) {
            self.text.render_mono(&mut ctx, block, 0, line1)?;
            self.text.render_mono(&mut ctx, block, 1, line2)?;
        }

        ctx.flush();
        ctx.render_to_pixmap(&mut pixmap);

        let mut data = pixmap.data_as_u8_slice().to_vec();
        if opts.with_post {
            let post = &template.post;
            let (w, h) = (template.canvas.width, template.canvas.height);
            effects::grain_in_place(&mut data, w, h, post.grain_amplitude, opts.grain_seed)?;
            effects::vignette_in_place(&mut data, w, h, post.vignette_strength)?;
            effects::warm_overlay_in_place(&mut data, w, h, post.warm_tint, post.warm_opacity)?;
            effects::blur_in_place(&mut data, w, h, post.blur.radius, post.blur.sigma)?;
        }

        Ok(FrameRgba {
            width: template.canvas.width,
            height: template.canvas.height,
            data,
            premultiplied: true,
        })
    }

    fn draw_template_placeholder(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        canvas: &Canvas,
    ) -> DocforgeResult<()> {
        let (w, h) = (f64::from(canvas.width), f64::from(canvas.height));
        let inset = 16.0;
        let thickness = 6.0;

        fill_rect(ctx, kurbo::Rect::new(0.0, 0.0, w, h), [244, 245, 247, 255]);
        for edge in [
            kurbo::Rect::new(inset, inset, w - inset, inset + thickness),
            kurbo::Rect::new(inset, h - inset - thickness, w - inset, h - inset),
            kurbo::Rect::new(inset, inset, inset + thickness, h - inset),
            kurbo::Rect::new(w - inset - thickness, inset, w - inset, h - inset),
        ] {
            fill_rect(ctx, edge, BORDER_GRAY);
        }

        self.text.render_label(
            ctx,
            "TEMPLATE UNAVAILABLE",
            w / 2.0,
            h / 2.0,
            (h / 18.0) as f32,
            BORDER_GRAY,
        )
    }

    fn draw_photo_placeholder(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        rect: &SlotRect,
    ) -> DocforgeResult<()> {
        fill_rect(
            ctx,
            kurbo::Rect::new(rect.x, rect.y, rect.x + rect.width, rect.y + rect.height),
            PLACEHOLDER_FILL,
        );
        let (cx, cy) = rect.center();
        self.text.render_label(
            ctx,
            "UPLOAD PHOTO",
            cx,
            cy,
            (rect.height / 10.0) as f32,
            PLACEHOLDER_INK,
        )
    }
}

/// Encode a frame as PNG bytes.
pub fn encode_png(frame: &FrameRgba) -> DocforgeResult<Vec<u8>> {
    let img = image::RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())
        .ok_or_else(|| DocforgeError::render("frame buffer does not match its dimensions"))?;
    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .map_err(|e| DocforgeError::render(format!("encode png: {e}")))?;
    Ok(out)
}

/// Encode a frame as the data-URL form the dashboard export uses.
pub fn to_png_data_url(frame: &FrameRgba) -> DocforgeResult<String> {
    use base64::Engine as _;
    let png = encode_png(frame)?;
    Ok(format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    ))
}

async fn fetch_template<S: AssetSource>(
    source: &S,
    kind: DocumentKind,
) -> DocforgeResult<DecodedImage> {
    let bytes = source.template_bytes(kind).await?;
    decode_on_blocking_pool(bytes)
        .await
        .map_err(|e| DocforgeError::template_load(e.to_string()))
}

async fn fetch_photo(photo: Option<Vec<u8>>) -> DocforgeResult<Option<DecodedImage>> {
    let Some(bytes) = photo else {
        return Ok(None);
    };
    decode_on_blocking_pool(bytes)
        .await
        .map(Some)
        .map_err(|e| DocforgeError::photo_load(e.to_string()))
}

async fn fetch_hologram<S: AssetSource>(source: &S) -> DocforgeResult<Option<DecodedImage>> {
    let Some(bytes) = source.hologram_bytes().await? else {
        return Ok(None);
    };
    decode_on_blocking_pool(bytes)
        .await
        .map(Some)
        .map_err(|e| DocforgeError::template_load(e.to_string()))
}

async fn decode_on_blocking_pool(bytes: Vec<u8>) -> DocforgeResult<DecodedImage> {
    tokio::task::spawn_blocking(move || decode_image(&bytes))
        .await
        .map_err(|e| DocforgeError::render(format!("decode task failed: {e}")))?
}

fn draw_image_stretched(
    ctx: &mut vello_cpu::RenderContext,
    img: &DecodedImage,
    canvas: &Canvas,
) -> DocforgeResult<()> {
    if img.width == 0 || img.height == 0 {
        return Err(DocforgeError::template_load("template image is empty"));
    }
    let paint = image_paint(img.rgba8_premul.as_slice(), img.width, img.height)?;
    let scale = kurbo::Affine::scale_non_uniform(
        f64::from(canvas.width) / f64::from(img.width),
        f64::from(canvas.height) / f64::from(img.height),
    );
    ctx.set_transform(affine_to_cpu(scale));
    ctx.set_paint(paint);
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
        0.0,
        0.0,
        f64::from(img.width),
        f64::from(img.height),
    ));
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    Ok(())
}

fn draw_photo(
    ctx: &mut vello_cpu::RenderContext,
    slot: &PhotoSlot,
    img: &DecodedImage,
    opts: &RenderOptions,
) -> DocforgeResult<()> {
    if img.width == 0 || img.height == 0 {
        return Err(DocforgeError::photo_load("photo image is empty"));
    }

    let mut buf = img.rgba8_premul.as_ref().clone();
    effects::apply_chain(&mut buf, img.width, img.height, &slot.effects, opts.grain_seed)?;
    let paint = image_paint(&buf, img.width, img.height)?;

    let rect = &slot.rect;
    let transform = match slot.fit {
        PhotoFit::Fill => cover_transform(rect, img.width, img.height),
        PhotoFit::Literal => kurbo::Affine::translate((rect.x, rect.y)),
    };

    draw_clipped_image(ctx, rect, &paint, transform, img, 1.0);

    if let Some(ghost_rect) = &slot.ghost {
        let mut ghost = img.rgba8_premul.as_ref().clone();
        effects::grayscale_blend_in_place(&mut ghost, img.width, img.height, 1.0)?;
        effects::darken_in_place(&mut ghost, img.width, img.height, GHOST_DARKEN)?;
        let ghost_paint = image_paint(&ghost, img.width, img.height)?;
        let transform = cover_transform(ghost_rect, img.width, img.height);
        draw_clipped_image(ctx, ghost_rect, &ghost_paint, transform, img, GHOST_OPACITY);
    }
    Ok(())
}

fn draw_clipped_image(
    ctx: &mut vello_cpu::RenderContext,
    rect: &SlotRect,
    paint: &vello_cpu::Image,
    transform: kurbo::Affine,
    img: &DecodedImage,
    opacity: f32,
) {
    let clip = kurbo::Rect::new(rect.x, rect.y, rect.x + rect.width, rect.y + rect.height)
        .to_path(0.1);
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.push_clip_layer(&bezpath_to_cpu(&clip));
    if opacity < 1.0 {
        ctx.push_opacity_layer(opacity);
    }
    ctx.set_transform(affine_to_cpu(transform));
    ctx.set_paint(paint.clone());
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
        0.0,
        0.0,
        f64::from(img.width),
        f64::from(img.height),
    ));
    if opacity < 1.0 {
        ctx.pop_layer();
    }
    ctx.pop_layer();
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
}

/// Aspect-fill: scale to cover the slot, centered.
fn cover_transform(rect: &SlotRect, img_w: u32, img_h: u32) -> kurbo::Affine {
    let iw = f64::from(img_w);
    let ih = f64::from(img_h);
    let scale = (rect.width / iw).max(rect.height / ih);
    let dx = rect.x + (rect.width - iw * scale) / 2.0;
    let dy = rect.y + (rect.height - ih * scale) / 2.0;
    kurbo::Affine::translate((dx, dy)) * kurbo::Affine::scale(scale)
}

fn draw_holograms(
    ctx: &mut vello_cpu::RenderContext,
    template: &DocumentTemplate,
    img: &DecodedImage,
) -> DocforgeResult<()> {
    if template.holograms.is_empty() || img.width == 0 || img.height == 0 {
        return Ok(());
    }
    let paint = image_paint(img.rgba8_premul.as_slice(), img.width, img.height)?;
    for tile in &template.holograms {
        let transform = kurbo::Affine::translate((tile.x, tile.y))
            * kurbo::Affine::rotate(tile.rotate_deg.to_radians())
            * kurbo::Affine::scale(tile.scale);
        ctx.set_transform(affine_to_cpu(transform));
        ctx.set_paint(paint.clone());
        ctx.push_opacity_layer(tile.opacity);
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(img.width),
            f64::from(img.height),
        ));
        ctx.pop_layer();
    }
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    Ok(())
}

fn draw_watermark(
    ctx: &mut vello_cpu::RenderContext,
    spec: &WatermarkSpec,
) -> DocforgeResult<()> {
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    match spec {
        WatermarkSpec::FlagStripes {
            rect,
            colors,
            opacity,
        } => {
            if colors.is_empty() {
                return Ok(());
            }
            let clip = kurbo::Rect::new(
                rect.x,
                rect.y,
                rect.x + rect.width,
                rect.y + rect.height,
            )
            .to_path(0.1);
            ctx.push_clip_layer(&bezpath_to_cpu(&clip));
            let stripe_h = rect.height / colors.len() as f64;
            let alpha = opacity_to_u8(*opacity);
            for (i, color) in colors.iter().enumerate() {
                let top = rect.y + stripe_h * i as f64;
                fill_rect(
                    ctx,
                    kurbo::Rect::new(rect.x, top, rect.x + rect.width, top + stripe_h),
                    [color[0], color[1], color[2], alpha],
                );
            }
            ctx.pop_layer();
        }
        WatermarkSpec::CircleBadge {
            cx,
            cy,
            radius,
            color,
            opacity,
        } => {
            let alpha = opacity_to_u8(*opacity);
            let outer = kurbo::Circle::new((*cx, *cy), *radius).to_path(0.1);
            ctx.push_clip_layer(&bezpath_to_cpu(&outer));
            fill_rect(
                ctx,
                kurbo::Rect::new(cx - radius, cy - radius, cx + radius, cy + radius),
                [color[0], color[1], color[2], alpha],
            );
            // Lighter core under a nested clip.
            let inner = kurbo::Circle::new((*cx, *cy), radius * 0.62).to_path(0.1);
            ctx.push_clip_layer(&bezpath_to_cpu(&inner));
            fill_rect(
                ctx,
                kurbo::Rect::new(cx - radius, cy - radius, cx + radius, cy + radius),
                [255, 255, 255, alpha],
            );
            ctx.pop_layer();
            ctx.pop_layer();
        }
    }
    Ok(())
}

fn fill_rect(ctx: &mut vello_cpu::RenderContext, rect: kurbo::Rect, color: [u8; 4]) {
    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
        color[0], color[1], color[2], color[3],
    ));
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
        rect.x0, rect.y0, rect.x1, rect.y1,
    ));
}

fn image_paint(
    rgba8_premul: &[u8],
    width: u32,
    height: u32,
) -> DocforgeResult<vello_cpu::Image> {
    let w: u16 = width
        .try_into()
        .map_err(|_| DocforgeError::render("image width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| DocforgeError::render("image height exceeds u16"))?;
    if rgba8_premul.len() != width as usize * height as usize * 4 {
        return Err(DocforgeError::render("decoded image byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for px in rgba8_premul.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a,
        });
    }

    let pixmap = vello_cpu::Pixmap::from_parts_with_opacity(pixels, w, h, may_have_opacities);
    Ok(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(std::sync::Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}

fn clear_pixmap(pixmap: &mut vello_cpu::Pixmap, rgba: [u8; 4]) {
    for px in pixmap.data_as_u8_slice_mut().chunks_exact_mut(4) {
        px.copy_from_slice(&rgba);
    }
}

fn surface_dim(value: u32, axis: &str) -> DocforgeResult<u16> {
    value
        .try_into()
        .map_err(|_| DocforgeError::render(format!("canvas {axis} exceeds u16")))
}

fn opacity_to_u8(opacity: f32) -> u8 {
    ((opacity.clamp(0.0, 1.0) * 255.0).round() as i32).clamp(0, 255) as u8
}

fn affine_to_cpu(a: kurbo::Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn bezpath_to_cpu(path: &kurbo::BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

fn point_to_cpu(p: kurbo::Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cover_transform_centers_overflow() {
        // 100x100 slot, 200x100 image: scale 1.0 on height, centered x.
        let rect = SlotRect {
            x: 10.0,
            y: 20.0,
            width: 100.0,
            height: 100.0,
        };
        let t = cover_transform(&rect, 200, 100);
        let c = t.as_coeffs();
        assert!((c[0] - 1.0).abs() < 1e-9);
        assert!((c[4] - (10.0 - 50.0)).abs() < 1e-9);
        assert!((c[5] - 20.0).abs() < 1e-9);
    }

    #[test]
    fn cover_transform_scales_up_small_images() {
        let rect = SlotRect {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 200.0,
        };
        let t = cover_transform(&rect, 50, 50);
        let c = t.as_coeffs();
        assert!((c[0] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn encode_png_roundtrips_through_decode() {
        let frame = FrameRgba {
            width: 3,
            height: 2,
            data: [10u8, 20, 30, 255].repeat(6),
            premultiplied: true,
        };
        let png = encode_png(&frame).unwrap();
        let back = decode_image(&png).unwrap();
        assert_eq!(back.width, 3);
        assert_eq!(back.height, 2);
        assert_eq!(back.rgba8_premul.as_slice(), frame.data.as_slice());
    }

    #[test]
    fn data_url_has_the_png_prefix() {
        let frame = FrameRgba {
            width: 1,
            height: 1,
            data: vec![0, 0, 0, 255],
            premultiplied: true,
        };
        let url = to_png_data_url(&frame).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn encode_png_rejects_mismatched_buffer() {
        let frame = FrameRgba {
            width: 4,
            height: 4,
            data: vec![0u8; 7],
            premultiplied: true,
        };
        assert!(encode_png(&frame).is_err());
    }

    #[test]
    fn opacity_clamps_to_byte_range() {
        assert_eq!(opacity_to_u8(-1.0), 0);
        assert_eq!(opacity_to_u8(0.5), 128);
        assert_eq!(opacity_to_u8(7.0), 255);
    }
}
