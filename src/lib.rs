#![forbid(unsafe_code)]

pub mod assets;
pub mod checksum;
pub mod compose;
pub mod effects;
pub mod error;
pub mod generate;
pub mod model;
pub mod mrz;
pub mod template;
pub mod text;

pub use assets::{AssetSource, DecodedImage, FontLibrary, FsAssetSource, MemoryAssetSource, decode_image};
pub use compose::{Compositor, FrameRgba, RenderOptions, encode_png, to_png_data_url};
pub use error::{DocforgeError, DocforgeResult};
pub use generate::{GenOptions, RecordGenerator};
pub use model::{DocumentKind, DocumentRecord};
pub use template::{DocumentTemplate, FieldPlacement, TemplateSet};
