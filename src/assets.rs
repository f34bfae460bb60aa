//! Asset acquisition: image decode, the async asset source seam, and
//! explicit font loading.
//!
//! Template and photo decodes are the only suspension points in a render
//! pass; everything downstream is synchronous drawing. Fonts are an explicit
//! resource handed to the compositor at construction — there is no global
//! font registry side effect.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;

use crate::{
    error::{DocforgeError, DocforgeResult},
    model::DocumentKind,
};

/// A decoded image as premultiplied RGBA8.
#[derive(Clone, Debug)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba8_premul: Arc<Vec<u8>>,
}

pub fn decode_image(bytes: &[u8]) -> DocforgeResult<DecodedImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(DecodedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((u16::from(px[0]) * a + 127) / 255) as u8;
        px[1] = ((u16::from(px[1]) * a + 127) / 255) as u8;
        px[2] = ((u16::from(px[2]) * a + 127) / 255) as u8;
    }
}

/// Where template and hologram image bytes come from.
///
/// Both loads are I/O-bound and awaited by the compositor; implementations
/// should not block. A missing hologram is `Ok(None)` (tiles are skipped); a
/// missing template is an error the compositor absorbs into a placeholder
/// render.
pub trait AssetSource: Send + Sync {
    fn template_bytes(
        &self,
        kind: DocumentKind,
    ) -> impl Future<Output = DocforgeResult<Vec<u8>>> + Send;

    fn hologram_bytes(&self) -> impl Future<Output = DocforgeResult<Option<Vec<u8>>>> + Send;
}

/// Reads `<kind>.png` and optional `hologram.png` from a directory.
#[derive(Clone, Debug)]
pub struct FsAssetSource {
    root: PathBuf,
}

impl FsAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetSource for FsAssetSource {
    async fn template_bytes(&self, kind: DocumentKind) -> DocforgeResult<Vec<u8>> {
        let path = self.root.join(format!("{}.png", kind.slug()));
        tokio::fs::read(&path)
            .await
            .map_err(|e| DocforgeError::template_load(format!("read '{}': {e}", path.display())))
    }

    async fn hologram_bytes(&self) -> DocforgeResult<Option<Vec<u8>>> {
        let path = self.root.join("hologram.png");
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DocforgeError::template_load(format!(
                "read '{}': {e}",
                path.display()
            ))),
        }
    }
}

/// In-memory source for tests and embedding callers.
#[derive(Clone, Debug, Default)]
pub struct MemoryAssetSource {
    pub template: Option<Vec<u8>>,
    pub hologram: Option<Vec<u8>>,
}

impl AssetSource for MemoryAssetSource {
    async fn template_bytes(&self, kind: DocumentKind) -> DocforgeResult<Vec<u8>> {
        self.template.clone().ok_or_else(|| {
            DocforgeError::template_load(format!("no template bytes for {kind}"))
        })
    }

    async fn hologram_bytes(&self) -> DocforgeResult<Option<Vec<u8>>> {
        Ok(self.hologram.clone())
    }
}

/// Raw font faces to register with the text engine. Loading is an explicit
/// construction-time step so rendering has no implicit global dependency.
#[derive(Clone, Debug, Default)]
pub struct FontLibrary {
    faces: Vec<Vec<u8>>,
}

impl FontLibrary {
    /// A library with no faces; text draws are skipped, every other layer
    /// still renders.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(paths: &[impl AsRef<Path>]) -> DocforgeResult<Self> {
        let mut lib = Self::default();
        for path in paths {
            let path = path.as_ref();
            let bytes = std::fs::read(path)
                .with_context(|| format!("read font '{}'", path.display()))?;
            lib.push_bytes(bytes);
        }
        Ok(lib)
    }

    pub fn push_bytes(&mut self, bytes: Vec<u8>) -> &mut Self {
        self.faces.push(bytes);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn faces(&self) -> &[Vec<u8>] {
        &self.faces
    }
}
