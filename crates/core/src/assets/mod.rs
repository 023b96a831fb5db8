use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Result, VisualError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Image,
    Video,
}

/// Decoded media as seen by the engine: enough to lay it out and hand it
/// back to the canvas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaHandle {
    pub path: PathBuf,
    pub kind: MediaKind,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FontHandle {
    pub path: PathBuf,
    pub size: u32,
}

/// Dimensions reported by a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MediaInfo {
    pub width: u32,
    pub height: u32,
}

/// Backend that actually opens images, videos and fonts.
pub trait MediaDecoder: Send {
    fn load_image(&mut self, path: &Path) -> Result<MediaInfo>;

    fn load_video(&mut self, path: &Path) -> Result<MediaInfo>;

    fn load_font(&mut self, path: &Path, size: u32) -> Result<()>;
}

/// Decoder that only checks the file exists; dimensions are unknown (0x0)
/// until a real backend is plugged in.
#[derive(Debug, Default)]
pub struct ProbeDecoder;

impl ProbeDecoder {
    fn probe(path: &Path) -> Result<()> {
        let metadata = std::fs::metadata(path)
            .map_err(|err| VisualError::resource(path.display().to_string(), err.to_string()))?;
        if metadata.is_file() {
            Ok(())
        } else {
            Err(VisualError::resource(
                path.display().to_string(),
                "not a file",
            ))
        }
    }
}

impl MediaDecoder for ProbeDecoder {
    fn load_image(&mut self, path: &Path) -> Result<MediaInfo> {
        Self::probe(path).map(|_| MediaInfo::default())
    }

    fn load_video(&mut self, path: &Path) -> Result<MediaInfo> {
        Self::probe(path).map(|_| MediaInfo::default())
    }

    fn load_font(&mut self, path: &Path, _size: u32) -> Result<()> {
        Self::probe(path)
    }
}

/// Decoder serving a fixed catalog of known media, useful for headless
/// setups and tests.
#[derive(Debug, Default, Clone)]
pub struct CatalogDecoder {
    media: HashMap<PathBuf, MediaInfo>,
    fonts: Vec<PathBuf>,
}

impl CatalogDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_media(mut self, path: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        self.media.insert(path.into(), MediaInfo { width, height });
        self
    }

    pub fn with_font(mut self, path: impl Into<PathBuf>) -> Self {
        self.fonts.push(path.into());
        self
    }

    fn lookup(&self, path: &Path) -> Result<MediaInfo> {
        self.media
            .get(path)
            .copied()
            .ok_or_else(|| VisualError::resource(path.display().to_string(), "not in catalog"))
    }
}

impl MediaDecoder for CatalogDecoder {
    fn load_image(&mut self, path: &Path) -> Result<MediaInfo> {
        self.lookup(path)
    }

    fn load_video(&mut self, path: &Path) -> Result<MediaInfo> {
        self.lookup(path)
    }

    fn load_font(&mut self, path: &Path, _size: u32) -> Result<()> {
        if self.fonts.iter().any(|font| font == path) {
            Ok(())
        } else {
            Err(VisualError::resource(
                path.display().to_string(),
                "not in catalog",
            ))
        }
    }
}

/// Cache for all media referenced by scene objects. Objects sharing a file
/// share one decoded copy.
pub struct AssetStore {
    decoder: Box<dyn MediaDecoder>,
    images: HashMap<PathBuf, MediaHandle>,
    videos: HashMap<String, MediaHandle>,
    fonts: HashMap<(PathBuf, u32), FontHandle>,
}

impl AssetStore {
    pub fn new(decoder: Box<dyn MediaDecoder>) -> Self {
        Self {
            decoder,
            images: HashMap::new(),
            videos: HashMap::new(),
            fonts: HashMap::new(),
        }
    }

    pub fn image(&mut self, path: &Path) -> Result<MediaHandle> {
        if let Some(handle) = self.images.get(path) {
            return Ok(handle.clone());
        }
        let info = self.decoder.load_image(path)?;
        let handle = media_handle(path, MediaKind::Image, info);
        debug!(path = %path.display(), width = info.width, height = info.height, "loaded image");
        self.images.insert(path.to_path_buf(), handle.clone());
        Ok(handle)
    }

    /// Videos are keyed by their base name.
    pub fn video(&mut self, path: &Path) -> Result<MediaHandle> {
        let key = base_name(path);
        if let Some(handle) = self.videos.get(&key) {
            return Ok(handle.clone());
        }
        let info = self.decoder.load_video(path)?;
        let handle = media_handle(path, MediaKind::Video, info);
        debug!(video = %key, width = info.width, height = info.height, "loaded video");
        self.videos.insert(key, handle.clone());
        Ok(handle)
    }

    /// Closes a decoded video so its memory is returned.
    pub fn release_video(&mut self, path: &Path) -> bool {
        self.videos.remove(&base_name(path)).is_some()
    }

    pub fn font(&mut self, path: &Path, size: u32) -> Result<FontHandle> {
        let key = (path.to_path_buf(), size);
        if let Some(handle) = self.fonts.get(&key) {
            return Ok(handle.clone());
        }
        self.decoder.load_font(path, size)?;
        let handle = FontHandle {
            path: path.to_path_buf(),
            size,
        };
        debug!(font = %path.display(), size, "loaded font");
        self.fonts.insert(key, handle.clone());
        Ok(handle)
    }

    pub fn contains_image(&self, path: &Path) -> bool {
        self.images.contains_key(path)
    }

    pub fn contains_video(&self, path: &Path) -> bool {
        self.videos.contains_key(&base_name(path))
    }

    pub fn contains_font(&self, path: &Path, size: u32) -> bool {
        self.fonts.contains_key(&(path.to_path_buf(), size))
    }

    /// Drops every cached resource.
    pub fn clear(&mut self) {
        self.images.clear();
        self.videos.clear();
        self.fonts.clear();
    }
}

impl Default for AssetStore {
    fn default() -> Self {
        Self::new(Box::new(ProbeDecoder))
    }
}

impl fmt::Debug for AssetStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetStore")
            .field("images", &self.images.len())
            .field("videos", &self.videos.len())
            .field("fonts", &self.fonts.len())
            .finish()
    }
}

fn media_handle(path: &Path, kind: MediaKind, info: MediaInfo) -> MediaHandle {
    MediaHandle {
        path: path.to_path_buf(),
        kind,
        width: info.width,
        height: info.height,
    }
}

fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
