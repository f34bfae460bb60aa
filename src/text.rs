//! Text layout and drawing: placement-table fields and the manually spaced
//! MRZ block.
//!
//! Layout goes through Parley against fonts registered from an explicit
//! [`FontLibrary`]; glyphs are drawn through the `vello_cpu` render context.
//! Every draw is two passes — an offset low-alpha shadow copy, then the
//! solid glyphs — to simulate print depth. With no registered faces, text
//! draws become no-ops and the rest of the composite still renders.

use std::borrow::Cow;

use chrono::Datelike;

use crate::{
    assets::FontLibrary,
    error::{DocforgeError, DocforgeResult},
    mrz,
    template::{Calendar, FieldPlacement, HAlign, MrzBlock},
};

const EN_MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

const TH_MONTHS: [&str; 12] = [
    "ม.ค.",
    "ก.พ.",
    "มี.ค.",
    "เม.ย.",
    "พ.ค.",
    "มิ.ย.",
    "ก.ค.",
    "ส.ค.",
    "ก.ย.",
    "ต.ค.",
    "พ.ย.",
    "ธ.ค.",
];

const MRZ_INK: TextBrush = TextBrush {
    r: 24,
    g: 26,
    b: 30,
    a: 255,
};

const SHADOW_ALPHA: u8 = 60;

/// Per-run color payload carried through Parley layouts.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TextBrush {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl From<[u8; 4]> for TextBrush {
    fn from(c: [u8; 4]) -> Self {
        Self {
            r: c[0],
            g: c[1],
            b: c[2],
            a: c[3],
        }
    }
}

struct RegisteredFace {
    family_name: String,
    font: vello_cpu::peniko::FontData,
}

/// Stateful Parley layout engine plus the registered face set.
pub struct TextEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrush>,
    faces: Vec<RegisteredFace>,
}

impl TextEngine {
    /// Register every face of the library. This is the single font
    /// acquisition point; nothing else touches the font collection.
    pub fn new(library: FontLibrary) -> DocforgeResult<Self> {
        let mut font_ctx = parley::FontContext::default();
        let mut faces = Vec::new();

        for bytes in library.faces() {
            let families = font_ctx
                .collection
                .register_fonts(parley::fontique::Blob::from(bytes.clone()), None);
            let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
                DocforgeError::invalid_input("no font families registered from font bytes")
            })?;
            let family_name = font_ctx
                .collection
                .family_name(family_id)
                .ok_or_else(|| {
                    DocforgeError::invalid_input("registered font family has no name")
                })?
                .to_string();

            let font = vello_cpu::peniko::FontData::new(
                vello_cpu::peniko::Blob::from(bytes.clone()),
                0,
            );
            faces.push(RegisteredFace { family_name, font });
        }

        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            faces,
        })
    }

    pub fn has_faces(&self) -> bool {
        !self.faces.is_empty()
    }

    /// Draw one placement-table field. Empty values are skipped; date-typed
    /// placements are formatted per their calendar, falling back to the raw
    /// value when it does not parse.
    pub fn render_field(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        placement: &FieldPlacement,
        value: &str,
    ) -> DocforgeResult<()> {
        if value.trim().is_empty() {
            return Ok(());
        }
        let Some(face_idx) = self.face_index_for(&placement.font.family) else {
            return Ok(());
        };

        let text = match placement.calendar {
            Calendar::Verbatim => value.to_string(),
            calendar => format_date(value, calendar).unwrap_or_else(|| value.to_string()),
        };

        let brush = TextBrush::from(placement.color);
        let layout = self.layout(&text, face_idx, placement.font.size_px, placement.font.weight, brush);
        let width = f64::from(layout.width());
        let x = match placement.align {
            HAlign::Left => placement.x,
            HAlign::Center => placement.x - width / 2.0,
            HAlign::Right => placement.x - width,
        };

        let font = self.faces[face_idx].font.clone();
        let offset = shadow_offset(placement.font.size_px);
        draw_layout(
            ctx,
            &layout,
            &font,
            x + offset,
            placement.y + offset,
            Some(shadow_color(placement.color)),
        );
        draw_layout(ctx, &layout, &font, x, placement.y, None);
        Ok(())
    }

    /// Draw a centered standalone label (placeholder text).
    pub fn render_label(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        text: &str,
        cx: f64,
        cy: f64,
        size_px: f32,
        color: [u8; 4],
    ) -> DocforgeResult<()> {
        let Some(face_idx) = self.face_index_for("") else {
            return Ok(());
        };
        let layout = self.layout(text, face_idx, size_px, 400, TextBrush::from(color));
        let x = cx - f64::from(layout.width()) / 2.0;
        let y = cy - f64::from(layout.height()) / 2.0;
        let font = self.faces[face_idx].font.clone();
        draw_layout(ctx, &layout, &font, x, y, None);
        Ok(())
    }

    /// Draw one MRZ line with manual per-character advance: each glyph is
    /// measured, centered in its cell, shadowed, then drawn solid.
    pub fn render_mono(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        block: &MrzBlock,
        line_index: usize,
        line: &str,
    ) -> DocforgeResult<()> {
        let Some(face_idx) = self.mono_face_index() else {
            return Ok(());
        };
        let font = self.faces[face_idx].font.clone();
        let y = block.y + line_index as f64 * (f64::from(block.size_px) + block.line_gap);
        let offset = shadow_offset(block.size_px);

        let mut pen_x = block.x;
        let mut cell = [0u8; 4];
        for ch in line.chars() {
            let s: &str = ch.encode_utf8(&mut cell);
            let layout = self.layout(s, face_idx, block.size_px, 400, MRZ_INK);
            let glyph_w = f64::from(layout.width());
            let x = pen_x + (block.char_advance - glyph_w) / 2.0;
            draw_layout(
                ctx,
                &layout,
                &font,
                x + offset,
                y + offset,
                Some(vello_cpu::peniko::Color::from_rgba8(
                    MRZ_INK.r,
                    MRZ_INK.g,
                    MRZ_INK.b,
                    SHADOW_ALPHA,
                )),
            );
            draw_layout(ctx, &layout, &font, x, y, None);
            pen_x += block.char_advance;
        }
        Ok(())
    }

    fn layout(
        &mut self,
        text: &str,
        face_idx: usize,
        size_px: f32,
        weight: u16,
        brush: TextBrush,
    ) -> parley::Layout<TextBrush> {
        let family_name = self.faces[face_idx].family_name.clone();
        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(Cow::Owned(family_name)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::FontWeight(
            parley::style::FontWeight::new(f32::from(weight)),
        ));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrush> = builder.build(text);
        layout.break_all_lines(None);
        layout
    }

    /// Face for a requested family: exact (case-insensitive) match first,
    /// then substring, then the first registered face. `None` only when the
    /// library is empty.
    fn face_index_for(&self, family: &str) -> Option<usize> {
        if self.faces.is_empty() {
            return None;
        }
        let lowered = family.to_ascii_lowercase();
        let hit = self
            .faces
            .iter()
            .position(|f| f.family_name.eq_ignore_ascii_case(family))
            .or_else(|| {
                self.faces
                    .iter()
                    .position(|f| f.family_name.to_ascii_lowercase().contains(&lowered))
            });
        Some(hit.unwrap_or(0))
    }

    /// MRZ face: prefer a registered face that looks monospaced, else the
    /// first face.
    fn mono_face_index(&self) -> Option<usize> {
        if self.faces.is_empty() {
            return None;
        }
        let hit = self.faces.iter().position(|f| {
            let name = f.family_name.to_ascii_lowercase();
            name.contains("mono") || name.contains("ocr") || name.contains("courier")
        });
        Some(hit.unwrap_or(0))
    }
}

/// Format a record date (`DD MMM YYYY`) for the given calendar. `None` when
/// the value does not parse; callers draw the raw value instead.
pub fn format_date(value: &str, calendar: Calendar) -> Option<String> {
    let date = mrz::parse_record_date(value).ok()?;
    match calendar {
        Calendar::Verbatim => Some(value.to_string()),
        Calendar::Gregorian => Some(format!(
            "{:02} {} {}",
            date.day(),
            EN_MONTHS[date.month0() as usize],
            date.year()
        )),
        Calendar::ThaiBuddhist => Some(format!(
            "{} {} {}",
            date.day(),
            TH_MONTHS[date.month0() as usize],
            date.year() + 543
        )),
    }
}

fn draw_layout(
    ctx: &mut vello_cpu::RenderContext,
    layout: &parley::Layout<TextBrush>,
    font: &vello_cpu::peniko::FontData,
    x: f64,
    y: f64,
    paint_override: Option<vello_cpu::peniko::Color>,
) {
    ctx.set_transform(vello_cpu::kurbo::Affine::translate((x, y)));
    for line in layout.lines() {
        for item in line.items() {
            let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                continue;
            };

            let color = paint_override.unwrap_or_else(|| {
                let brush = run.style().brush;
                vello_cpu::peniko::Color::from_rgba8(brush.r, brush.g, brush.b, brush.a)
            });
            ctx.set_paint(color);

            let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                id: g.id,
                x: g.x,
                y: g.y,
            });
            ctx.glyph_run(font)
                .font_size(run.run().font_size())
                .fill_glyphs(glyphs);
        }
    }
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
}

fn shadow_color(color: [u8; 4]) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(color[0], color[1], color[2], SHADOW_ALPHA)
}

fn shadow_offset(size_px: f32) -> f64 {
    f64::from((size_px * 0.03).clamp(1.0, 4.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gregorian_formatting_uses_uppercase_english_months() {
        assert_eq!(
            format_date("3 feb 2001", Calendar::Gregorian).unwrap(),
            "03 FEB 2001"
        );
        assert_eq!(
            format_date("01 JAN 1990", Calendar::Gregorian).unwrap(),
            "01 JAN 1990"
        );
    }

    #[test]
    fn thai_buddhist_formatting_adds_543_years() {
        assert_eq!(
            format_date("15 JAN 1990", Calendar::ThaiBuddhist).unwrap(),
            "15 ม.ค. 2533"
        );
        assert_eq!(
            format_date("05 DEC 2020", Calendar::ThaiBuddhist).unwrap(),
            "5 ธ.ค. 2563"
        );
    }

    #[test]
    fn unparseable_dates_format_as_none() {
        assert!(format_date("someday", Calendar::Gregorian).is_none());
        assert!(format_date("1990-01-01", Calendar::ThaiBuddhist).is_none());
    }

    #[test]
    fn the_same_value_formats_for_both_calendars() {
        let value = "20 MAR 1985";
        let greg = format_date(value, Calendar::Gregorian).unwrap();
        let thai = format_date(value, Calendar::ThaiBuddhist).unwrap();
        assert_eq!(greg, "20 MAR 1985");
        assert_eq!(thai, "20 มี.ค. 2528");
    }

    #[test]
    fn empty_library_has_no_faces_and_skips_draws() {
        let engine = TextEngine::new(FontLibrary::empty()).unwrap();
        assert!(!engine.has_faces());
        assert!(engine.face_index_for("Sarabun").is_none());
        assert!(engine.mono_face_index().is_none());
    }

    #[test]
    fn shadow_offset_tracks_font_size_within_bounds() {
        assert_eq!(shadow_offset(10.0), 1.0);
        assert_eq!(shadow_offset(100.0), 3.0);
        assert_eq!(shadow_offset(400.0), 4.0);
    }
}
