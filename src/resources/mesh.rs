//! Mesh assets loaded from Wavefront OBJ files
//!
//! Every face-vertex of the file becomes one interleaved vertex
//! `[px, py, pz, u, v, nx, ny, nz]`. Attributes the file does not provide are
//! zero-filled, so the stride is the same for every asset and matches
//! [`VertexLayout::buffer_layout`].

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::backend::*;
use crate::renderer::DRAW_GROUP;
use crate::resources::material::DiffuseMaterial;

#[derive(Error, Debug)]
pub enum MeshError {
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {name}: {source}")]
    Parse {
        name: String,
        #[source]
        source: tobj::LoadError,
    },
    #[error("{name} contains no triangles")]
    NoGeometry { name: String },
    #[error("{name} references {attribute} {index} but only {available} are defined")]
    AttributeOutOfRange {
        name: String,
        attribute: &'static str,
        index: usize,
        available: usize,
    },
}

/// Which optional attributes an asset provides.
///
/// Decided once per asset from its first face-vertex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VertexLayout {
    pub has_texcoords: bool,
    pub has_normals: bool,
}

impl VertexLayout {
    pub const FLOATS_PER_VERTEX: usize = 8;
    pub const TEXCOORD_OFFSET: usize = 3;
    pub const NORMAL_OFFSET: usize = 5;

    fn of(mesh: &tobj::Mesh) -> Self {
        Self {
            has_texcoords: !mesh.texcoord_indices.is_empty(),
            has_normals: !mesh.normal_indices.is_empty(),
        }
    }

    /// GPU layout: position at location 0, texcoord at 1, normal at 2.
    pub fn buffer_layout() -> VertexBufferLayout {
        let float = std::mem::size_of::<f32>() as u64;
        VertexBufferLayout {
            array_stride: Self::FLOATS_PER_VERTEX as u64 * float,
            attributes: vec![
                VertexAttribute {
                    location: 0,
                    format: VertexFormat::Float32x3,
                    offset: 0,
                },
                VertexAttribute {
                    location: 1,
                    format: VertexFormat::Float32x2,
                    offset: Self::TEXCOORD_OFFSET as u64 * float,
                },
                VertexAttribute {
                    location: 2,
                    format: VertexFormat::Float32x3,
                    offset: Self::NORMAL_OFFSET as u64 * float,
                },
            ],
        }
    }
}

/// CPU-side mesh flattened from an OBJ file
#[derive(Debug, Clone)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
    pub materials: Vec<DiffuseMaterial>,
    pub layout: VertexLayout,
}

impl MeshData {
    /// Load an OBJ file, resolving `mtllib` references against `material_dir`.
    pub fn load(path: &Path, material_dir: &Path) -> Result<Self, MeshError> {
        let file = File::open(path).map_err(|source| MeshError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path.display().to_string();
        let mesh = Self::parse(&name, &mut BufReader::new(file), material_dir)?;

        log::info!(
            "Loaded mesh {}: {} vertices, {} indices, {} materials",
            mesh.name,
            mesh.vertex_count(),
            mesh.indices.len(),
            mesh.materials.len()
        );
        Ok(mesh)
    }

    pub fn parse<R: BufRead>(
        name: &str,
        reader: &mut R,
        material_dir: &Path,
    ) -> Result<Self, MeshError> {
        Self::parse_with(name, reader, |library| {
            tobj::load_mtl(material_dir.join(library))
        })
    }

    /// Parse OBJ text with a caller-supplied material library loader.
    pub fn parse_with<R, ML>(name: &str, reader: &mut R, material_loader: ML) -> Result<Self, MeshError>
    where
        R: BufRead,
        ML: Fn(&Path) -> tobj::MTLLoadResult,
    {
        let options = tobj::LoadOptions {
            triangulate: false,
            single_index: false,
            ignore_points: true,
            ignore_lines: true,
            ..Default::default()
        };

        let (models, materials) = tobj::load_obj_buf(reader, &options, material_loader)
            .map_err(|source| MeshError::Parse {
                name: name.to_string(),
                source,
            })?;

        let mut materials: Vec<DiffuseMaterial> = match materials {
            Ok(materials) => materials.iter().map(DiffuseMaterial::from_obj).collect(),
            Err(e) => {
                log::warn!("{name}: material library unavailable ({e}), using default material");
                Vec::new()
            }
        };
        if materials.is_empty() {
            materials.push(DiffuseMaterial::default());
        }

        let (vertices, indices, layout) = flatten(name, &models)?;
        if indices.is_empty() {
            return Err(MeshError::NoGeometry {
                name: name.to_string(),
            });
        }

        Ok(Self {
            name: name.to_string(),
            vertices,
            indices,
            materials,
            layout,
        })
    }

    /// Floats per vertex
    pub fn stride(&self) -> usize {
        VertexLayout::FLOATS_PER_VERTEX
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / self.stride()
    }

    pub fn vertex(&self, index: usize) -> &[f32] {
        let start = index * self.stride();
        &self.vertices[start..start + self.stride()]
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

fn face_arities(mesh: &tobj::Mesh) -> Vec<usize> {
    // tobj leaves this empty when every face is a triangle
    if mesh.face_arities.is_empty() {
        vec![3; mesh.indices.len() / 3]
    } else {
        mesh.face_arities.iter().map(|&arity| arity as usize).collect()
    }
}

fn attribute<'a>(
    name: &str,
    attribute: &'static str,
    data: &'a [f32],
    index: u32,
    width: usize,
) -> Result<&'a [f32], MeshError> {
    let start = index as usize * width;
    data.get(start..start + width)
        .ok_or_else(|| MeshError::AttributeOutOfRange {
            name: name.to_string(),
            attribute,
            index: index as usize,
            available: data.len() / width,
        })
}

fn flatten(
    name: &str,
    models: &[tobj::Model],
) -> Result<(Vec<f32>, Vec<u32>, VertexLayout), MeshError> {
    let layout = models
        .iter()
        .find(|model| !model.mesh.indices.is_empty())
        .map(|model| VertexLayout::of(&model.mesh))
        .unwrap_or_default();

    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for model in models {
        let mesh = &model.mesh;
        if !mesh.indices.is_empty() && VertexLayout::of(mesh) != layout {
            log::warn!(
                "{name}: shape '{}' provides {:?}, stored as {:?}",
                model.name,
                VertexLayout::of(mesh),
                layout
            );
        }

        let mut corner = 0usize;
        for arity in face_arities(mesh) {
            let base = (vertices.len() / VertexLayout::FLOATS_PER_VERTEX) as u32;

            for c in corner..corner + arity {
                let position = *mesh.indices.get(c).ok_or_else(|| MeshError::AttributeOutOfRange {
                    name: name.to_string(),
                    attribute: "face vertex",
                    index: c,
                    available: mesh.indices.len(),
                })?;
                vertices.extend_from_slice(attribute(name, "position", &mesh.positions, position, 3)?);

                let texcoord = layout.has_texcoords.then(|| mesh.texcoord_indices.get(c)).flatten();
                match texcoord {
                    Some(&t) => vertices.extend_from_slice(attribute(name, "texcoord", &mesh.texcoords, t, 2)?),
                    None => vertices.extend_from_slice(&[0.0; 2]),
                }

                let normal = layout.has_normals.then(|| mesh.normal_indices.get(c)).flatten();
                match normal {
                    Some(&n) => vertices.extend_from_slice(attribute(name, "normal", &mesh.normals, n, 3)?),
                    None => vertices.extend_from_slice(&[0.0; 3]),
                }
            }

            // Fan over the face's own run of vertices
            for k in 1..arity.saturating_sub(1) as u32 {
                indices.extend_from_slice(&[base, base + k, base + k + 1]);
            }
            corner += arity;
        }
    }

    Ok((vertices, indices, layout))
}

/// A mesh resident on the GPU
#[derive(Debug)]
pub struct GpuMesh {
    name: String,
    buffers: Option<(BufferHandle, BufferHandle)>,
    index_count: u32,
    materials: Vec<DiffuseMaterial>,
}

impl GpuMesh {
    pub fn upload<B: GraphicsBackend>(backend: &mut B, mesh: &MeshData) -> BackendResult<Self> {
        let vertex_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{} vertices", mesh.name)),
                size: mesh.vertex_bytes().len() as u64,
                usage: BufferUsage::VERTEX,
            },
            mesh.vertex_bytes(),
        )?;

        let index_buffer = match backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{} indices", mesh.name)),
                size: mesh.index_bytes().len() as u64,
                usage: BufferUsage::INDEX,
            },
            mesh.index_bytes(),
        ) {
            Ok(buffer) => buffer,
            Err(e) => {
                backend.destroy_buffer(vertex_buffer);
                return Err(e);
            }
        };

        Ok(Self {
            name: mesh.name.clone(),
            buffers: Some((vertex_buffer, index_buffer)),
            index_count: mesh.indices.len() as u32,
            materials: mesh.materials.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn materials(&self) -> &[DiffuseMaterial] {
        &self.materials
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn is_released(&self) -> bool {
        self.buffers.is_none()
    }

    /// Issue one indexed draw of the whole mesh per material.
    ///
    /// `material_slots[i]` is the draw-uniform bind group carrying material `i`'s
    /// diffuse color. The vertex and index buffers are rebound before every draw.
    pub fn render<B: GraphicsBackend>(&self, backend: &mut B, material_slots: &[BindGroupHandle]) {
        let Some((vertex_buffer, index_buffer)) = self.buffers else {
            return;
        };

        for slot in material_slots.iter().take(self.materials.len()) {
            backend.set_bind_group(DRAW_GROUP, *slot);
            backend.set_vertex_buffer(0, vertex_buffer, 0);
            backend.set_index_buffer(index_buffer, 0);
            backend.draw_indexed(0..self.index_count, 0, 0..1);
        }
    }

    /// Free the GPU buffers. Later calls do nothing.
    pub fn release<B: GraphicsBackend>(&mut self, backend: &mut B) {
        if let Some((vertex_buffer, index_buffer)) = self.buffers.take() {
            backend.destroy_buffer(vertex_buffer);
            backend.destroy_buffer(index_buffer);
            log::debug!("Released mesh {}", self.name);
        }
    }
}
