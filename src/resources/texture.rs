//! Texture loading and management

use crate::backend::*;
use crate::renderer::TEXTURE_GROUP;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbaImage};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TextureError {
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("{name} has {channels} channels; only 1, 3 or 4 are supported")]
    UnsupportedChannelCount { name: String, channels: u8 },
    #[error("{name} has no pixels")]
    Empty { name: String },
}

/// Decoded texture expanded to RGBA8
#[derive(Debug, Clone)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    /// Channel count of the source image
    pub channels: u8,
    pub data: Vec<u8>,
    pub name: String,
}

/// One level of a mipmap chain
#[derive(Debug, Clone)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl TextureData {
    /// Load texture from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TextureError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        let img = image::open(path).map_err(|source| TextureError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        let texture = Self::from_image(img, &name)?;

        log::info!(
            "Loaded texture {}: {}x{}, {} channels, {} mip levels",
            texture.name,
            texture.width,
            texture.height,
            texture.channels,
            texture.mip_level_count()
        );
        Ok(texture)
    }

    /// Load texture from encoded bytes
    pub fn from_bytes(bytes: &[u8], name: &str) -> Result<Self, TextureError> {
        let img = image::load_from_memory(bytes).map_err(|source| TextureError::Decode {
            path: PathBuf::from(name),
            source,
        })?;
        Self::from_image(img, name)
    }

    /// Expand an image to RGBA.
    ///
    /// Single-channel images behave like a red-only upload: `(r, 0, 0, 255)`.
    /// Two-channel images have no upload format and are rejected.
    pub fn from_image(img: DynamicImage, name: &str) -> Result<Self, TextureError> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(TextureError::Empty {
                name: name.to_string(),
            });
        }

        let channels = img.color().channel_count();
        let data = match channels {
            1 => img
                .to_luma8()
                .into_raw()
                .into_iter()
                .flat_map(|r| [r, 0, 0, 255])
                .collect(),
            3 | 4 => img.to_rgba8().into_raw(),
            _ => {
                return Err(TextureError::UnsupportedChannelCount {
                    name: name.to_string(),
                    channels,
                })
            }
        };

        Ok(Self {
            width,
            height,
            channels,
            data,
            name: name.to_string(),
        })
    }

    /// Number of levels in a full chain down to 1x1
    pub fn mip_level_count(&self) -> u32 {
        32 - self.width.max(self.height).leading_zeros()
    }

    /// Full mipmap chain, level 0 first
    pub fn mip_chain(&self) -> Vec<MipLevel> {
        let mut levels = vec![MipLevel {
            width: self.width,
            height: self.height,
            data: self.data.clone(),
        }];

        let Some(base) = RgbaImage::from_raw(self.width, self.height, self.data.clone()) else {
            return levels;
        };

        let (mut width, mut height) = (self.width, self.height);
        while width > 1 || height > 1 {
            width = (width / 2).max(1);
            height = (height / 2).max(1);
            let level = image::imageops::resize(&base, width, height, FilterType::Triangle);
            levels.push(MipLevel {
                width,
                height,
                data: level.into_raw(),
            });
        }
        levels
    }
}

/// GPU-side handles owned by a texture
#[derive(Debug, Clone, Copy)]
struct TextureResources {
    texture: TextureHandle,
    view: TextureViewHandle,
    sampler: SamplerHandle,
    bind_group: BindGroupHandle,
}

/// GPU texture with its sampler and bind group
#[derive(Debug)]
pub struct GpuTexture {
    resources: Option<TextureResources>,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub name: String,
}

impl GpuTexture {
    /// Upload every mip level and build the bind group for `layout`.
    ///
    /// Sampling is nearest-neighbor with repeat wrapping on both axes.
    pub fn create<B: GraphicsBackend>(
        backend: &mut B,
        data: &TextureData,
        layout: BindGroupLayoutHandle,
    ) -> BackendResult<Self> {
        let mips = data.mip_chain();
        let mip_levels = mips.len() as u32;

        let texture = backend.create_texture(&TextureDescriptor {
            label: Some(data.name.clone()),
            width: data.width,
            height: data.height,
            mip_levels,
            format: TextureFormat::Rgba8UnormSrgb,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
        })?;

        for (level, mip) in mips.iter().enumerate() {
            backend.write_texture(texture, level as u32, &mip.data, mip.width, mip.height);
        }

        let view = backend.create_texture_view(texture)?;
        let sampler = backend.create_sampler(&SamplerDescriptor {
            label: Some(format!("{} sampler", data.name)),
        })?;
        let bind_group = backend.create_bind_group(
            layout,
            &[
                (0, BindGroupEntry::Texture(view)),
                (1, BindGroupEntry::Sampler(sampler)),
            ],
        )?;

        Ok(Self {
            resources: Some(TextureResources {
                texture,
                view,
                sampler,
                bind_group,
            }),
            width: data.width,
            height: data.height,
            mip_levels,
            name: data.name.clone(),
        })
    }

    /// Make this the texture sampled by subsequent draws.
    pub fn bind<B: GraphicsBackend>(&self, backend: &mut B) {
        if let Some(resources) = &self.resources {
            backend.set_bind_group(TEXTURE_GROUP, resources.bind_group);
        }
    }

    pub fn is_released(&self) -> bool {
        self.resources.is_none()
    }

    /// Free the GPU resources. Later calls do nothing.
    pub fn release<B: GraphicsBackend>(&mut self, backend: &mut B) {
        if let Some(resources) = self.resources.take() {
            backend.destroy_bind_group(resources.bind_group);
            backend.destroy_sampler(resources.sampler);
            backend.destroy_texture_view(resources.view);
            backend.destroy_texture(resources.texture);
            log::debug!("Released texture {}", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::{DummyBackend, RecordedCommand};
    use image::{GrayAlphaImage, GrayImage, LumaA, Rgb, RgbImage};

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("figure_viewer_texture_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn two_channel_png_is_rejected() {
        let dir = temp_dir("two_channel");
        let path = dir.join("gray_alpha.png");
        GrayAlphaImage::from_pixel(4, 4, LumaA([10, 20])).save(&path).unwrap();

        let result = TextureData::from_file(&path);
        assert!(matches!(
            result,
            Err(TextureError::UnsupportedChannelCount { channels: 2, .. })
        ));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn single_channel_expands_to_red() {
        let img = GrayImage::from_raw(2, 1, vec![7, 200]).unwrap();
        let texture = TextureData::from_image(DynamicImage::ImageLuma8(img), "gray").unwrap();
        assert_eq!(texture.channels, 1);
        assert_eq!(texture.data, vec![7, 0, 0, 255, 200, 0, 0, 255]);
    }

    #[test]
    fn rgb_gets_opaque_alpha() {
        let img = RgbImage::from_pixel(1, 1, Rgb([1, 2, 3]));
        let texture = TextureData::from_image(DynamicImage::ImageRgb8(img), "rgb").unwrap();
        assert_eq!(texture.data, vec![1, 2, 3, 255]);
    }

    #[test]
    fn corrupt_file_is_a_decode_error() {
        let dir = temp_dir("corrupt");
        let path = dir.join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();

        assert!(matches!(
            TextureData::from_file(&path),
            Err(TextureError::Decode { .. })
        ));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn garbage_bytes_name_the_source() {
        let err = TextureData::from_bytes(b"\x00\x01", "inline.png").unwrap_err();
        assert!(err.to_string().contains("inline.png"));
    }

    #[test]
    fn mip_chain_reaches_one_pixel() {
        let img = RgbImage::from_pixel(8, 2, Rgb([255, 0, 0]));
        let texture = TextureData::from_image(DynamicImage::ImageRgb8(img), "strip").unwrap();

        let chain = texture.mip_chain();
        let sizes: Vec<_> = chain.iter().map(|m| (m.width, m.height)).collect();
        assert_eq!(sizes, vec![(8, 2), (4, 1), (2, 1), (1, 1)]);
        assert_eq!(texture.mip_level_count(), 4);
        assert!(chain.iter().all(|m| m.data.len() == (m.width * m.height * 4) as usize));
    }

    #[test]
    fn upload_writes_every_level_and_binds_group_two() {
        let mut backend = DummyBackend::default();
        let img = RgbImage::from_pixel(4, 4, Rgb([9, 9, 9]));
        let data = TextureData::from_image(DynamicImage::ImageRgb8(img), "skin").unwrap();
        let layout = backend.create_bind_group_layout(&[]).unwrap();

        let mut texture = GpuTexture::create(&mut backend, &data, layout).unwrap();
        let levels: Vec<_> = backend.texture_writes().iter().map(|w| w.1).collect();
        assert_eq!(levels, vec![0, 1, 2]);
        assert_eq!(texture.mip_levels, 3);

        texture.bind(&mut backend);
        assert!(matches!(
            backend.commands(),
            [RecordedCommand::SetBindGroup { index: TEXTURE_GROUP, .. }]
        ));

        texture.release(&mut backend);
        texture.release(&mut backend);
        assert!(texture.is_released());
        assert_eq!(backend.live_texture_count(), 0);
    }
}
