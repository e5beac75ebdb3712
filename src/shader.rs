//! WGSL shader program loading
//!
//! Each stage is parsed and validated with naga before the pipeline is built.
//! Failures here are soft: they are logged and the program is marked unusable,
//! after which the renderer only clears the frame.

use std::fmt;
use std::path::Path;

use log::{error, info, warn};
use thiserror::Error;

/// Entry point of the vertex stage
pub const VERTEX_ENTRY: &str = "vs_main";
/// Entry point of the fragment stage
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Resources the renderer binds by name
pub const CONTRACT_UNIFORMS: [&str; 4] = ["camera", "draw", "figure_texture", "figure_sampler"];

#[derive(Error, Debug)]
pub enum ShaderError {
    #[error("failed to read shader '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("{stage} shader parse error: {message}")]
    Parse { stage: Stage, message: String },
    #[error("{stage} shader validation error: {message}")]
    Validation { stage: Stage, message: String },
    #[error("link error: {0}")]
    Link(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    fn entry_point(self) -> &'static str {
        match self {
            Stage::Vertex => VERTEX_ENTRY,
            Stage::Fragment => FRAGMENT_ENTRY,
        }
    }

    fn naga_stage(self) -> naga::ShaderStage {
        match self {
            Stage::Vertex => naga::ShaderStage::Vertex,
            Stage::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Vertex => f.write_str("vertex"),
            Stage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Parse and validate one stage
pub fn compile_stage(source: &str, stage: Stage) -> Result<naga::Module, ShaderError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::Parse {
        stage,
        message: e.emit_to_string(source),
    })?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|e| ShaderError::Validation {
            stage,
            message: e.to_string(),
        })?;

    Ok(module)
}

/// A vertex and fragment stage pair
#[derive(Debug)]
pub struct ShaderProgram {
    vertex_source: String,
    fragment_source: String,
    modules: Option<(naga::Module, naga::Module)>,
}

impl ShaderProgram {
    /// Read both stages from disk. Never fails; check [`ShaderProgram::is_usable`].
    pub fn load(vertex_path: &Path, fragment_path: &Path) -> Self {
        let sources = read_source(vertex_path)
            .and_then(|vertex| Ok((vertex, read_source(fragment_path)?)));

        match sources {
            Ok((vertex, fragment)) => Self::from_sources(vertex, fragment),
            Err(e) => {
                error!("{e}");
                Self {
                    vertex_source: String::new(),
                    fragment_source: String::new(),
                    modules: None,
                }
            }
        }
    }

    /// Compile and link the given sources, logging any failure
    pub fn from_sources(vertex_source: String, fragment_source: String) -> Self {
        let modules = match link(&vertex_source, &fragment_source) {
            Ok(modules) => {
                info!("Shader program linked");
                Some(modules)
            }
            Err(e) => {
                error!("{e}");
                None
            }
        };

        let program = Self {
            vertex_source,
            fragment_source,
            modules,
        };
        program.warn_missing_uniforms();
        program
    }

    pub fn is_usable(&self) -> bool {
        self.modules.is_some()
    }

    pub fn vertex_source(&self) -> &str {
        &self.vertex_source
    }

    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }

    /// `(group, binding)` of a named resource in either stage
    pub fn uniform_binding(&self, name: &str) -> Option<(u32, u32)> {
        let (vertex, fragment) = self.modules.as_ref()?;
        resource_binding(vertex, name).or_else(|| resource_binding(fragment, name))
    }

    fn warn_missing_uniforms(&self) {
        if !self.is_usable() {
            return;
        }
        for name in CONTRACT_UNIFORMS {
            if self.uniform_binding(name).is_none() {
                warn!("Shader program does not declare uniform '{name}'");
            }
        }
    }
}

fn read_source(path: &Path) -> Result<String, ShaderError> {
    std::fs::read_to_string(path).map_err(|source| ShaderError::Read {
        path: path.display().to_string(),
        source,
    })
}

fn link(vertex_source: &str, fragment_source: &str) -> Result<(naga::Module, naga::Module), ShaderError> {
    let vertex = compile_stage(vertex_source, Stage::Vertex)?;
    let fragment = compile_stage(fragment_source, Stage::Fragment)?;

    let vs = find_entry_point(&vertex, Stage::Vertex)?;
    let fs = find_entry_point(&fragment, Stage::Fragment)?;

    let outputs = vs
        .function
        .result
        .as_ref()
        .map(|result| locations(&vertex, result.ty, result.binding.as_ref()))
        .unwrap_or_default();
    for argument in &fs.function.arguments {
        for location in locations(&fragment, argument.ty, argument.binding.as_ref()) {
            if !outputs.contains(&location) {
                return Err(ShaderError::Link(format!(
                    "fragment input at location {location} is not written by the vertex stage"
                )));
            }
        }
    }

    Ok((vertex, fragment))
}

fn find_entry_point(module: &naga::Module, stage: Stage) -> Result<&naga::EntryPoint, ShaderError> {
    module
        .entry_points
        .iter()
        .find(|ep| ep.name == stage.entry_point() && ep.stage == stage.naga_stage())
        .ok_or_else(|| {
            ShaderError::Link(format!(
                "entry point '{}' not found for {stage} stage",
                stage.entry_point()
            ))
        })
}

/// User-defined `@location`s of a value, looking through structs
fn locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
) -> Vec<u32> {
    match binding {
        Some(naga::Binding::Location { location, .. }) => vec![*location],
        Some(naga::Binding::BuiltIn(_)) => Vec::new(),
        None => match &module.types[ty].inner {
            naga::TypeInner::Struct { members, .. } => members
                .iter()
                .flat_map(|member| locations(module, member.ty, member.binding.as_ref()))
                .collect(),
            _ => Vec::new(),
        },
    }
}

fn resource_binding(module: &naga::Module, name: &str) -> Option<(u32, u32)> {
    module
        .global_variables
        .iter()
        .find(|(_, var)| var.name.as_deref() == Some(name))
        .and_then(|(_, var)| var.binding.as_ref())
        .map(|binding| (binding.group, binding.binding))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r#"
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@group(0) @binding(0) var<uniform> camera: mat4x4<f32>;

@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(1) uv: vec2<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = camera * vec4<f32>(position, 1.0);
    out.uv = uv;
    return out;
}
"#;

    const FRAGMENT: &str = r#"
@group(2) @binding(0) var figure_texture: texture_2d<f32>;
@group(2) @binding(1) var figure_sampler: sampler;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(figure_texture, figure_sampler, uv);
}
"#;

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("figure_viewer_shader_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn valid_pair_links() {
        let program = ShaderProgram::from_sources(VERTEX.into(), FRAGMENT.into());
        assert!(program.is_usable());
        assert_eq!(program.uniform_binding("camera"), Some((0, 0)));
        assert_eq!(program.uniform_binding("figure_sampler"), Some((2, 1)));
        assert_eq!(program.uniform_binding("draw"), None);
    }

    #[test]
    fn syntax_error_is_soft() {
        let program = ShaderProgram::from_sources("fn vs_main( {".into(), FRAGMENT.into());
        assert!(!program.is_usable());
        assert_eq!(program.uniform_binding("camera"), None);
        assert!(matches!(
            compile_stage("fn vs_main( {", Stage::Vertex),
            Err(ShaderError::Parse { stage: Stage::Vertex, .. })
        ));
    }

    #[test]
    fn type_error_fails_validation() {
        let source = "@fragment fn fs_main() -> @location(0) vec4<f32> { let x: f32 = 1.0; return x; }";
        assert!(matches!(
            compile_stage(source, Stage::Fragment),
            Err(ShaderError::Parse { .. } | ShaderError::Validation { .. })
        ));
    }

    #[test]
    fn swapped_stages_fail_to_link() {
        let err = link(FRAGMENT, VERTEX).unwrap_err();
        assert!(matches!(err, ShaderError::Link(_)));
    }

    #[test]
    fn unwritten_varying_fails_to_link() {
        let fragment = FRAGMENT.replace("@location(0) uv", "@location(3) uv");
        assert!(matches!(link(VERTEX, &fragment), Err(ShaderError::Link(_))));
    }

    #[test]
    fn missing_file_is_soft() {
        let dir = temp_dir("missing");
        let program = ShaderProgram::load(&dir.join("nope.wgsl"), &dir.join("nope.wgsl"));
        assert!(!program.is_usable());
        assert!(program.vertex_source().is_empty());
    }

    #[test]
    fn loads_from_disk() {
        let dir = temp_dir("disk");
        std::fs::write(dir.join("vertex.wgsl"), VERTEX).unwrap();
        std::fs::write(dir.join("fragment.wgsl"), FRAGMENT).unwrap();

        let program = ShaderProgram::load(&dir.join("vertex.wgsl"), &dir.join("fragment.wgsl"));
        assert!(program.is_usable());
        assert_eq!(program.fragment_source(), FRAGMENT);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
