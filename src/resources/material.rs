//! Flat diffuse materials read from OBJ material libraries

use glam::Vec3;

/// A flat diffuse color applied on top of a part's texture
#[derive(Debug, Clone, PartialEq)]
pub struct DiffuseMaterial {
    pub name: String,
    pub diffuse: Vec3,
}

impl Default for DiffuseMaterial {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            diffuse: Vec3::ONE,
        }
    }
}

impl DiffuseMaterial {
    pub fn new(name: &str, diffuse: Vec3) -> Self {
        Self {
            name: name.to_string(),
            diffuse,
        }
    }

    /// A material without a `Kd` entry keeps the texture color unchanged.
    pub fn from_obj(material: &tobj::Material) -> Self {
        Self {
            name: material.name.clone(),
            diffuse: material.diffuse.map(Vec3::from_array).unwrap_or(Vec3::ONE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_diffuse_defaults_to_white() {
        let material = tobj::Material {
            name: "bare".to_string(),
            ..Default::default()
        };
        let converted = DiffuseMaterial::from_obj(&material);
        assert_eq!(converted.name, "bare");
        assert_eq!(converted.diffuse, Vec3::ONE);
    }

    #[test]
    fn diffuse_is_copied() {
        let material = tobj::Material {
            name: "skin".to_string(),
            diffuse: Some([0.8, 0.5, 0.25]),
            ..Default::default()
        };
        assert_eq!(
            DiffuseMaterial::from_obj(&material).diffuse,
            Vec3::new(0.8, 0.5, 0.25)
        );
    }
}
