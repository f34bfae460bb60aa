//! Per-document-type render configuration.
//!
//! Every template-specific constant lives here: canvas dimensions, the photo
//! slot, hologram tile positions, watermark shapes, the field placement
//! table, and the MRZ block geometry. Drawing code never hard-codes a
//! coordinate; it reads this table. Templates are plain serde values so the
//! built-in set can be overridden from JSON and verified against the
//! original positions.

use std::collections::BTreeMap;

use crate::{
    effects::PhotoEffectSpec,
    error::{DocforgeError, DocforgeResult},
    model::DocumentKind,
};

/// Output surface dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

/// Axis-aligned placement rectangle in canvas pixels.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SlotRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl SlotRect {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// How a photo is mapped onto its slot rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoFit {
    /// Aspect-fill: scale to cover the slot, centered, clipped.
    Fill,
    /// Draw at the photo's literal pixel size from the slot origin, clipped.
    Literal,
}

/// The photo region of a template.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct PhotoSlot {
    pub rect: SlotRect,
    pub fit: PhotoFit,
    /// Per-kind effect chain applied to the photo buffer before compositing.
    /// Order is part of the visual contract.
    #[serde(default)]
    pub effects: Vec<PhotoEffectSpec>,
    /// Optional faint duplicate of the photo (grayscale, darkened, low
    /// alpha), as printed near the data page gutter on some documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ghost: Option<SlotRect>,
}

/// One hologram tile: the shared hologram image drawn at an independent
/// position, scale, rotation and opacity.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HologramTile {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
    pub rotate_deg: f64,
    pub opacity: f32,
}

/// Procedurally drawn translucent watermark shapes.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum WatermarkSpec {
    /// Horizontal stripes filling `rect`, one per color, top to bottom.
    FlagStripes {
        rect: SlotRect,
        colors: Vec<[u8; 3]>,
        opacity: f32,
    },
    /// A circular badge: outer disc with a lighter inner ring, drawn under
    /// nested clips.
    CircleBadge {
        cx: f64,
        cy: f64,
        radius: f64,
        color: [u8; 3],
        opacity: f32,
    },
}

/// Horizontal text alignment relative to the placement x coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Date rendering mode for a placement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Calendar {
    /// Draw the field value as-is.
    #[default]
    Verbatim,
    /// `DD MMM YYYY`, uppercase English month.
    Gregorian,
    /// Thai month name with the Buddhist-era year (Gregorian + 543).
    ThaiBuddhist,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FontSpec {
    pub family: String,
    pub weight: u16,
    pub size_px: f32,
}

/// A static placement table entry: which field goes where, in what style.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct FieldPlacement {
    pub key: String,
    pub font: FontSpec,
    pub color: [u8; 4],
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub align: HAlign,
    #[serde(default)]
    pub calendar: Calendar,
}

/// Geometry of the two-line machine-readable zone.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MrzBlock {
    pub x: f64,
    pub y: f64,
    pub size_px: f32,
    /// Manual per-character advance; MRZ glyphs are never auto-spaced.
    pub char_advance: f64,
    pub line_gap: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BlurParams {
    pub radius: u32,
    pub sigma: f32,
}

/// Whole-surface post effects, applied after every draw step in the fixed
/// order: grain, vignette, warm overlay, blur.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PostEffects {
    pub grain_amplitude: f32,
    pub vignette_strength: f32,
    pub warm_tint: [u8; 3],
    pub warm_opacity: f32,
    pub blur: BlurParams,
}

/// The complete render configuration for one document kind.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct DocumentTemplate {
    pub kind: DocumentKind,
    pub canvas: Canvas,
    pub photo: PhotoSlot,
    #[serde(default)]
    pub holograms: Vec<HologramTile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark: Option<WatermarkSpec>,
    pub placements: Vec<FieldPlacement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mrz: Option<MrzBlock>,
    pub post: PostEffects,
}

impl DocumentTemplate {
    pub fn validate(&self) -> DocforgeResult<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(DocforgeError::invalid_input(format!(
                "{} template canvas must be non-empty",
                self.kind
            )));
        }

        let r = &self.photo.rect;
        if r.width <= 0.0 || r.height <= 0.0 {
            return Err(DocforgeError::invalid_input(format!(
                "{} photo slot must have positive size",
                self.kind
            )));
        }
        if r.x < 0.0
            || r.y < 0.0
            || r.x + r.width > f64::from(self.canvas.width)
            || r.y + r.height > f64::from(self.canvas.height)
        {
            return Err(DocforgeError::invalid_input(format!(
                "{} photo slot leaves the canvas",
                self.kind
            )));
        }

        let known = self.kind.field_keys();
        for placement in &self.placements {
            if !known.contains(&placement.key.as_str()) {
                return Err(DocforgeError::invalid_input(format!(
                    "{} placement references unknown field '{}'",
                    self.kind, placement.key
                )));
            }
            if !placement.font.size_px.is_finite() || placement.font.size_px <= 0.0 {
                return Err(DocforgeError::invalid_input(format!(
                    "{} placement '{}' has invalid font size",
                    self.kind, placement.key
                )));
            }
        }

        match (&self.mrz, self.kind.has_mrz()) {
            (None, true) => {
                return Err(DocforgeError::invalid_input(format!(
                    "{} template must define an MRZ block",
                    self.kind
                )));
            }
            (Some(_), false) => {
                return Err(DocforgeError::invalid_input(format!(
                    "{} template must not define an MRZ block",
                    self.kind
                )));
            }
            (Some(block), true) => {
                if block.char_advance <= 0.0 || block.size_px <= 0.0 {
                    return Err(DocforgeError::invalid_input(format!(
                        "{} MRZ block geometry is degenerate",
                        self.kind
                    )));
                }
            }
            (None, false) => {}
        }

        Ok(())
    }
}

/// A validated template per document kind.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TemplateSet {
    templates: BTreeMap<DocumentKind, DocumentTemplate>,
}

impl TemplateSet {
    /// The built-in templates for all four document kinds.
    pub fn builtin() -> Self {
        let mut templates = BTreeMap::new();
        for t in [id_card(), driving_license(), passport(), visa()] {
            templates.insert(t.kind, t);
        }
        Self { templates }
    }

    pub fn from_json_slice(bytes: &[u8]) -> DocforgeResult<Self> {
        let set: Self = serde_json::from_slice(bytes)
            .map_err(|e| DocforgeError::invalid_input(format!("template config: {e}")))?;
        set.validate()?;
        Ok(set)
    }

    pub fn insert(&mut self, template: DocumentTemplate) {
        self.templates.insert(template.kind, template);
    }

    pub fn get(&self, kind: DocumentKind) -> DocforgeResult<&DocumentTemplate> {
        self.templates.get(&kind).ok_or_else(|| {
            DocforgeError::invalid_input(format!("no template configured for {kind}"))
        })
    }

    pub fn validate(&self) -> DocforgeResult<()> {
        for (kind, template) in &self.templates {
            if *kind != template.kind {
                return Err(DocforgeError::invalid_input(format!(
                    "template keyed as {kind} declares kind {}",
                    template.kind
                )));
            }
            template.validate()?;
        }
        Ok(())
    }
}

const INK: [u8; 4] = [28, 32, 38, 255];
const NAVY: [u8; 4] = [16, 38, 110, 255];
const RED: [u8; 4] = [150, 28, 28, 255];
const THAI_FLAG: [[u8; 3]; 5] = [
    [165, 25, 49],
    [244, 244, 244],
    [45, 42, 74],
    [244, 244, 244],
    [165, 25, 49],
];

fn font(family: &str, weight: u16, size_px: f32) -> FontSpec {
    FontSpec {
        family: family.to_string(),
        weight,
        size_px,
    }
}

fn place(key: &str, f: FontSpec, color: [u8; 4], x: f64, y: f64) -> FieldPlacement {
    FieldPlacement {
        key: key.to_string(),
        font: f,
        color,
        x,
        y,
        align: HAlign::Left,
        calendar: Calendar::Verbatim,
    }
}

fn place_date(
    key: &str,
    f: FontSpec,
    color: [u8; 4],
    x: f64,
    y: f64,
    calendar: Calendar,
) -> FieldPlacement {
    FieldPlacement {
        calendar,
        ..place(key, f, color, x, y)
    }
}

fn id_card() -> DocumentTemplate {
    DocumentTemplate {
        kind: DocumentKind::IdCard,
        canvas: Canvas {
            width: 1200,
            height: 756,
        },
        photo: PhotoSlot {
            rect: SlotRect {
                x: 930.0,
                y: 330.0,
                width: 200.0,
                height: 240.0,
            },
            fit: PhotoFit::Fill,
            effects: vec![
                PhotoEffectSpec::GrayscaleBlend { ratio: 0.12 },
                PhotoEffectSpec::Grain { amplitude: 10.0 },
            ],
            ghost: None,
        },
        holograms: vec![
            HologramTile {
                x: 960.0,
                y: 360.0,
                scale: 0.5,
                rotate_deg: -18.0,
                opacity: 0.28,
            },
            HologramTile {
                x: 1020.0,
                y: 500.0,
                scale: 0.35,
                rotate_deg: 12.0,
                opacity: 0.22,
            },
            HologramTile {
                x: 940.0,
                y: 580.0,
                scale: 0.4,
                rotate_deg: 31.0,
                opacity: 0.18,
            },
        ],
        watermark: Some(WatermarkSpec::CircleBadge {
            cx: 600.0,
            cy: 378.0,
            radius: 300.0,
            color: [176, 188, 212],
            opacity: 0.08,
        }),
        placements: vec![
            place("id_number", font("Sarabun", 700, 44.0), NAVY, 430.0, 64.0),
            place("name_th", font("Sarabun", 700, 34.0), INK, 330.0, 150.0),
            place("given_names", font("Sarabun", 400, 30.0), INK, 360.0, 208.0),
            place("surname", font("Sarabun", 400, 30.0), INK, 360.0, 258.0),
            place_date(
                "birth_date",
                font("Sarabun", 400, 28.0),
                INK,
                360.0,
                312.0,
                Calendar::ThaiBuddhist,
            ),
            place_date(
                "birth_date",
                font("Sarabun", 400, 24.0),
                INK,
                360.0,
                350.0,
                Calendar::Gregorian,
            ),
            place("address", font("Sarabun", 400, 24.0), INK, 60.0, 560.0),
            place_date(
                "issue_date",
                font("Sarabun", 400, 22.0),
                INK,
                90.0,
                660.0,
                Calendar::ThaiBuddhist,
            ),
            place_date(
                "expiry_date",
                font("Sarabun", 400, 22.0),
                RED,
                560.0,
                660.0,
                Calendar::ThaiBuddhist,
            ),
        ],
        mrz: None,
        post: PostEffects {
            grain_amplitude: 6.0,
            vignette_strength: 0.18,
            warm_tint: [255, 236, 200],
            warm_opacity: 0.10,
            blur: BlurParams {
                radius: 1,
                sigma: 0.6,
            },
        },
    }
}

fn driving_license() -> DocumentTemplate {
    DocumentTemplate {
        kind: DocumentKind::DrivingLicense,
        canvas: Canvas {
            width: 1800,
            height: 1200,
        },
        photo: PhotoSlot {
            rect: SlotRect {
                x: 120.0,
                y: 420.0,
                width: 420.0,
                height: 520.0,
            },
            fit: PhotoFit::Literal,
            effects: vec![
                PhotoEffectSpec::GrayscaleBlend { ratio: 0.2 },
                PhotoEffectSpec::Vignette { strength: 0.25 },
            ],
            ghost: None,
        },
        holograms: vec![
            HologramTile {
                x: 200.0,
                y: 500.0,
                scale: 0.8,
                rotate_deg: -24.0,
                opacity: 0.25,
            },
            HologramTile {
                x: 330.0,
                y: 760.0,
                scale: 0.6,
                rotate_deg: 15.0,
                opacity: 0.2,
            },
        ],
        watermark: Some(WatermarkSpec::FlagStripes {
            rect: SlotRect {
                x: 0.0,
                y: 1040.0,
                width: 1800.0,
                height: 160.0,
            },
            colors: THAI_FLAG.to_vec(),
            opacity: 0.35,
        }),
        placements: vec![
            place(
                "license_number",
                font("Sarabun", 700, 64.0),
                NAVY,
                700.0,
                230.0,
            ),
            place("id_number", font("Sarabun", 400, 44.0), INK, 700.0, 340.0),
            place(
                "given_names",
                font("Sarabun", 400, 52.0),
                INK,
                700.0,
                450.0,
            ),
            place("surname", font("Sarabun", 400, 52.0), INK, 700.0, 540.0),
            place_date(
                "birth_date",
                font("Sarabun", 400, 44.0),
                INK,
                700.0,
                645.0,
                Calendar::Gregorian,
            ),
            place_date(
                "birth_date",
                font("Sarabun", 400, 44.0),
                INK,
                700.0,
                715.0,
                Calendar::ThaiBuddhist,
            ),
            place("province", font("Sarabun", 400, 40.0), INK, 700.0, 815.0),
            place_date(
                "issue_date",
                font("Sarabun", 400, 40.0),
                INK,
                700.0,
                915.0,
                Calendar::ThaiBuddhist,
            ),
            place_date(
                "expiry_date",
                font("Sarabun", 700, 40.0),
                RED,
                1250.0,
                915.0,
                Calendar::ThaiBuddhist,
            ),
        ],
        mrz: None,
        post: PostEffects {
            grain_amplitude: 5.0,
            vignette_strength: 0.12,
            warm_tint: [255, 238, 206],
            warm_opacity: 0.08,
            blur: BlurParams {
                radius: 1,
                sigma: 0.5,
            },
        },
    }
}

fn passport() -> DocumentTemplate {
    DocumentTemplate {
        kind: DocumentKind::Passport,
        canvas: Canvas {
            width: 3543,
            height: 2362,
        },
        photo: PhotoSlot {
            rect: SlotRect {
                x: 260.0,
                y: 540.0,
                width: 900.0,
                height: 1160.0,
            },
            fit: PhotoFit::Fill,
            effects: vec![
                PhotoEffectSpec::GrayscaleBlend { ratio: 0.1 },
                PhotoEffectSpec::Grain { amplitude: 8.0 },
            ],
            ghost: Some(SlotRect {
                x: 2980.0,
                y: 1280.0,
                width: 320.0,
                height: 410.0,
            }),
        },
        holograms: vec![
            HologramTile {
                x: 420.0,
                y: 700.0,
                scale: 1.2,
                rotate_deg: -30.0,
                opacity: 0.22,
            },
            HologramTile {
                x: 700.0,
                y: 1300.0,
                scale: 0.9,
                rotate_deg: 20.0,
                opacity: 0.18,
            },
            HologramTile {
                x: 380.0,
                y: 1520.0,
                scale: 0.7,
                rotate_deg: 45.0,
                opacity: 0.15,
            },
        ],
        watermark: Some(WatermarkSpec::CircleBadge {
            cx: 2480.0,
            cy: 1060.0,
            radius: 760.0,
            color: [168, 182, 214],
            opacity: 0.05,
        }),
        placements: vec![
            place(
                "passport_number",
                font("Sarabun", 700, 80.0),
                INK,
                3380.0,
                300.0,
            )
            .right(),
            place(
                "country_code",
                font("Sarabun", 400, 64.0),
                INK,
                1420.0,
                320.0,
            ),
            place("surname", font("Sarabun", 700, 72.0), INK, 1420.0, 540.0),
            place(
                "given_names",
                font("Sarabun", 400, 72.0),
                INK,
                1420.0,
                690.0,
            ),
            place(
                "nationality",
                font("Sarabun", 400, 60.0),
                INK,
                1420.0,
                850.0,
            ),
            place_date(
                "birth_date",
                font("Sarabun", 400, 60.0),
                INK,
                1420.0,
                1010.0,
                Calendar::Gregorian,
            ),
            place("sex", font("Sarabun", 400, 60.0), INK, 1420.0, 1170.0),
            place(
                "place_of_birth",
                font("Sarabun", 400, 60.0),
                INK,
                1420.0,
                1330.0,
            ),
            place_date(
                "issue_date",
                font("Sarabun", 400, 60.0),
                INK,
                1420.0,
                1490.0,
                Calendar::Gregorian,
            ),
            place_date(
                "expiry_date",
                font("Sarabun", 400, 60.0),
                INK,
                1420.0,
                1650.0,
                Calendar::Gregorian,
            ),
        ],
        mrz: Some(MrzBlock {
            x: 180.0,
            y: 1980.0,
            size_px: 84.0,
            char_advance: 72.0,
            line_gap: 44.0,
        }),
        post: PostEffects {
            grain_amplitude: 7.0,
            vignette_strength: 0.15,
            warm_tint: [255, 240, 205],
            warm_opacity: 0.12,
            blur: BlurParams {
                radius: 1,
                sigma: 0.6,
            },
        },
    }
}

fn visa() -> DocumentTemplate {
    DocumentTemplate {
        kind: DocumentKind::Visa,
        canvas: Canvas {
            width: 1770,
            height: 1181,
        },
        photo: PhotoSlot {
            rect: SlotRect {
                x: 1360.0,
                y: 300.0,
                width: 330.0,
                height: 420.0,
            },
            fit: PhotoFit::Literal,
            effects: vec![
                PhotoEffectSpec::GrayscaleBlend { ratio: 0.25 },
                PhotoEffectSpec::Grain { amplitude: 8.0 },
            ],
            ghost: None,
        },
        holograms: vec![HologramTile {
            x: 1400.0,
            y: 360.0,
            scale: 0.55,
            rotate_deg: -20.0,
            opacity: 0.24,
        }],
        watermark: Some(WatermarkSpec::FlagStripes {
            rect: SlotRect {
                x: 0.0,
                y: 0.0,
                width: 1770.0,
                height: 90.0,
            },
            colors: THAI_FLAG.to_vec(),
            opacity: 0.3,
        }),
        placements: vec![
            place(
                "visa_number",
                font("Sarabun", 700, 46.0),
                RED,
                120.0,
                190.0,
            ),
            place(
                "passport_number",
                font("Sarabun", 400, 40.0),
                INK,
                120.0,
                285.0,
            ),
            place("surname", font("Sarabun", 400, 44.0), INK, 120.0, 375.0),
            place(
                "given_names",
                font("Sarabun", 400, 44.0),
                INK,
                120.0,
                455.0,
            ),
            place(
                "nationality",
                font("Sarabun", 400, 40.0),
                INK,
                120.0,
                535.0,
            ),
            place_date(
                "birth_date",
                font("Sarabun", 400, 40.0),
                INK,
                120.0,
                615.0,
                Calendar::Gregorian,
            ),
            place("sex", font("Sarabun", 400, 40.0), INK, 620.0, 615.0),
            place("visa_class", font("Sarabun", 700, 40.0), INK, 120.0, 695.0),
            place(
                "place_of_issue",
                font("Sarabun", 400, 40.0),
                INK,
                120.0,
                775.0,
            ),
            place_date(
                "issue_date",
                font("Sarabun", 400, 36.0),
                INK,
                120.0,
                855.0,
                Calendar::Gregorian,
            ),
            place_date(
                "expiry_date",
                font("Sarabun", 700, 36.0),
                RED,
                620.0,
                855.0,
                Calendar::Gregorian,
            ),
        ],
        mrz: Some(MrzBlock {
            x: 90.0,
            y: 1000.0,
            size_px: 44.0,
            char_advance: 36.0,
            line_gap: 20.0,
        }),
        post: PostEffects {
            grain_amplitude: 5.0,
            vignette_strength: 0.1,
            warm_tint: [255, 238, 206],
            warm_opacity: 0.08,
            blur: BlurParams {
                radius: 1,
                sigma: 0.5,
            },
        },
    }
}

impl FieldPlacement {
    fn right(mut self) -> Self {
        self.align = HAlign::Right;
        self
    }
}
