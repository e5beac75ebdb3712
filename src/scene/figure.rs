//! The six-part figure and its per-frame assembly
//!
//! Every part is described once in a constant table (mesh file, skin, rest
//! offset, rest scale). [`SceneAssembler`] walks that table in draw order and
//! combines it with the current [`PoseParameters`].

use std::path::Path;

use glam::{Mat4, Vec3};

use super::{LimbOffset, PoseParameters};
use crate::error::ViewerResult;
use crate::resources::{MeshData, TextureData};

/// A rigid part of the figure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyPart {
    Head,
    Torso,
    LeftLeg,
    RightLeg,
    LeftArm,
    RightArm,
}

/// Which texture a part is drawn with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Skin {
    Head,
    Body,
}

impl Skin {
    pub const ALL: [Skin; 2] = [Skin::Head, Skin::Body];

    pub fn texture_path(self) -> &'static str {
        match self {
            Skin::Head => "texture/head.png",
            Skin::Body => "texture/torso.png",
        }
    }

    fn index(self) -> usize {
        match self {
            Skin::Head => 0,
            Skin::Body => 1,
        }
    }
}

/// Directory searched for material libraries referenced by the meshes
pub const MATERIAL_DIR: &str = "texture";

/// Constant description of one part
#[derive(Debug, Clone, Copy)]
pub struct PartRecord {
    pub part: BodyPart,
    pub mesh_path: &'static str,
    pub skin: Skin,
    pub base_translation: Vec3,
    pub base_scale: Vec3,
}

/// The figure, in draw order
pub const FIGURE: [PartRecord; 6] = [
    PartRecord {
        part: BodyPart::Head,
        mesh_path: "obj/head.obj",
        skin: Skin::Head,
        base_translation: Vec3::new(0.0, -1.7, 0.4),
        base_scale: Vec3::ONE,
    },
    PartRecord {
        part: BodyPart::Torso,
        mesh_path: "obj/torso.obj",
        skin: Skin::Body,
        base_translation: Vec3::ZERO,
        base_scale: Vec3::ONE,
    },
    PartRecord {
        part: BodyPart::LeftLeg,
        mesh_path: "obj/leg_left.obj",
        skin: Skin::Body,
        base_translation: Vec3::new(-1.5, 0.0, 0.0),
        base_scale: Vec3::ONE,
    },
    PartRecord {
        part: BodyPart::RightLeg,
        mesh_path: "obj/leg_right.obj",
        skin: Skin::Body,
        base_translation: Vec3::new(1.9, 0.0, 0.0),
        base_scale: Vec3::ONE,
    },
    PartRecord {
        part: BodyPart::LeftArm,
        mesh_path: "obj/arm_left.obj",
        skin: Skin::Body,
        base_translation: Vec3::new(-3.2, 0.0, 0.0),
        base_scale: Vec3::ONE,
    },
    PartRecord {
        part: BodyPart::RightArm,
        mesh_path: "obj/arm_right.obj",
        skin: Skin::Body,
        base_translation: Vec3::new(4.0, 0.0, 0.0),
        base_scale: Vec3::ONE,
    },
];

impl BodyPart {
    /// Fixed draw order
    pub const DRAW_ORDER: [BodyPart; 6] = [
        BodyPart::Head,
        BodyPart::Torso,
        BodyPart::LeftLeg,
        BodyPart::RightLeg,
        BodyPart::LeftArm,
        BodyPart::RightArm,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BodyPart::Head => "head",
            BodyPart::Torso => "torso",
            BodyPart::LeftLeg => "left-leg",
            BodyPart::RightLeg => "right-leg",
            BodyPart::LeftArm => "left-arm",
            BodyPart::RightArm => "right-arm",
        }
    }

    pub fn index(self) -> usize {
        match self {
            BodyPart::Head => 0,
            BodyPart::Torso => 1,
            BodyPart::LeftLeg => 2,
            BodyPart::RightLeg => 3,
            BodyPart::LeftArm => 4,
            BodyPart::RightArm => 5,
        }
    }

    pub fn record(self) -> &'static PartRecord {
        &FIGURE[self.index()]
    }

    /// Pose-driven offset of this part, `None` for parts that do not translate
    pub fn limb_offset(self, pose: &PoseParameters) -> Option<LimbOffset> {
        match self {
            BodyPart::Head | BodyPart::Torso => None,
            BodyPart::LeftLeg => Some(pose.left_leg),
            BodyPart::RightLeg => Some(pose.right_leg),
            BodyPart::LeftArm => Some(pose.left_arm),
            BodyPart::RightArm => Some(pose.right_arm),
        }
    }
}

/// Meshes and textures for the whole figure
///
/// `M` and `T` are the CPU types while loading and the GPU types afterwards.
#[derive(Debug)]
pub struct FigureAssets<M, T> {
    meshes: Vec<M>,
    textures: Vec<T>,
}

impl<M, T> FigureAssets<M, T> {
    /// Meshes in [`BodyPart::DRAW_ORDER`], textures in [`Skin::ALL`] order
    pub fn from_parts(meshes: [M; 6], textures: [T; 2]) -> Self {
        Self {
            meshes: meshes.into(),
            textures: textures.into(),
        }
    }

    /// Convert every asset, stopping at the first error
    pub fn try_map<M2, T2, E, C>(
        self,
        context: &mut C,
        mut map_mesh: impl FnMut(&mut C, BodyPart, M) -> Result<M2, E>,
        mut map_texture: impl FnMut(&mut C, Skin, T) -> Result<T2, E>,
    ) -> Result<FigureAssets<M2, T2>, E> {
        let meshes = BodyPart::DRAW_ORDER
            .into_iter()
            .zip(self.meshes)
            .map(|(part, mesh)| map_mesh(context, part, mesh))
            .collect::<Result<Vec<_>, E>>()?;
        let textures = Skin::ALL
            .into_iter()
            .zip(self.textures)
            .map(|(skin, texture)| map_texture(context, skin, texture))
            .collect::<Result<Vec<_>, E>>()?;
        Ok(FigureAssets { meshes, textures })
    }

    pub fn mesh(&self, part: BodyPart) -> &M {
        &self.meshes[part.index()]
    }

    pub fn texture(&self, skin: Skin) -> &T {
        &self.textures[skin.index()]
    }

    pub fn meshes(&self) -> &[M] {
        &self.meshes
    }

    pub fn meshes_mut(&mut self) -> &mut [M] {
        &mut self.meshes
    }

    pub fn textures_mut(&mut self) -> &mut [T] {
        &mut self.textures
    }
}

impl FigureAssets<MeshData, TextureData> {
    /// Load the six meshes and two textures below `root`.
    ///
    /// Any missing or malformed file is an error; there is no partial figure.
    pub fn load(root: &Path) -> ViewerResult<Self> {
        let material_dir = root.join(MATERIAL_DIR);

        let mut meshes = Vec::with_capacity(FIGURE.len());
        for record in &FIGURE {
            meshes.push(MeshData::load(&root.join(record.mesh_path), &material_dir)?);
        }

        let mut textures = Vec::with_capacity(Skin::ALL.len());
        for skin in Skin::ALL {
            textures.push(TextureData::from_file(root.join(skin.texture_path()))?);
        }

        Ok(Self { meshes, textures })
    }
}

/// Where and how to draw one part this frame
#[derive(Debug)]
pub struct PartPlacement<'a, M, T> {
    pub part: BodyPart,
    pub rotation: Mat4,
    pub translation: Vec3,
    pub scale: Mat4,
    pub mesh: &'a M,
    pub texture: &'a T,
}

/// Builds the per-frame placements for the figure
pub struct SceneAssembler<'a, M, T> {
    assets: &'a FigureAssets<M, T>,
}

impl<'a, M, T> SceneAssembler<'a, M, T> {
    pub fn new(assets: &'a FigureAssets<M, T>) -> Self {
        Self { assets }
    }

    /// One placement per part, in [`BodyPart::DRAW_ORDER`].
    ///
    /// Only the head rotates (about the X axis). Limbs are translated by
    /// `(0, lift, swing)` on top of their rest offset; the torso stays put.
    pub fn assemble(&self, pose: &PoseParameters) -> Vec<PartPlacement<'a, M, T>> {
        FIGURE
            .iter()
            .map(|record| {
                let rotation = match record.part {
                    BodyPart::Head => Mat4::from_rotation_x(pose.head_angle),
                    _ => Mat4::IDENTITY,
                };
                let offset = record
                    .part
                    .limb_offset(pose)
                    .map_or(Vec3::ZERO, |limb| Vec3::new(0.0, limb.lift, limb.swing));

                PartPlacement {
                    part: record.part,
                    rotation,
                    translation: record.base_translation + offset,
                    scale: Mat4::from_scale(record.base_scale),
                    mesh: self.assets.mesh(record.part),
                    texture: self.assets.texture(record.skin),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::pose;

    fn named_assets() -> FigureAssets<&'static str, &'static str> {
        FigureAssets::from_parts(
            ["head", "torso", "leg_left", "leg_right", "arm_left", "arm_right"],
            ["head.png", "torso.png"],
        )
    }

    #[test]
    fn table_is_in_draw_order() {
        for (record, part) in FIGURE.iter().zip(BodyPart::DRAW_ORDER) {
            assert_eq!(record.part, part);
            assert_eq!(part.record().part, part);
        }
    }

    #[test]
    fn placements_follow_draw_order_and_skins() {
        let assets = named_assets();
        let placements = SceneAssembler::new(&assets).assemble(&PoseParameters::NEUTRAL);

        let parts: Vec<_> = placements.iter().map(|p| p.part).collect();
        assert_eq!(parts, BodyPart::DRAW_ORDER);

        let meshes: Vec<_> = placements.iter().map(|p| *p.mesh).collect();
        assert_eq!(meshes, ["head", "torso", "leg_left", "leg_right", "arm_left", "arm_right"]);

        let textures: Vec<_> = placements.iter().map(|p| *p.texture).collect();
        assert_eq!(
            textures,
            ["head.png", "torso.png", "torso.png", "torso.png", "torso.png", "torso.png"]
        );
    }

    #[test]
    fn neutral_pose_uses_rest_offsets() {
        let assets = named_assets();
        let placements = SceneAssembler::new(&assets).assemble(&PoseParameters::NEUTRAL);

        for (placement, record) in placements.iter().zip(FIGURE.iter()) {
            assert_eq!(placement.rotation, Mat4::IDENTITY);
            assert_eq!(placement.translation, record.base_translation);
            assert_eq!(placement.scale, Mat4::IDENTITY);
        }
    }

    #[test]
    fn limbs_translate_and_head_rotates() {
        let assets = named_assets();
        let p = pose(0.3, true);
        let placements = SceneAssembler::new(&assets).assemble(&p);

        assert_eq!(placements[0].rotation, Mat4::from_rotation_x(p.head_angle));
        assert_eq!(placements[0].translation, Vec3::new(0.0, -1.7, 0.4));
        assert_eq!(placements[1].translation, Vec3::ZERO);
        assert_eq!(
            placements[2].translation,
            Vec3::new(-1.5, p.left_leg.lift, p.left_leg.swing)
        );
        assert_eq!(
            placements[5].translation,
            Vec3::new(4.0, p.right_arm.lift, p.right_arm.swing)
        );
        assert!(placements[1..].iter().all(|pl| pl.rotation == Mat4::IDENTITY));
        assert!(placements.iter().all(|pl| pl.scale == Mat4::IDENTITY));
    }

    #[test]
    fn try_map_stops_at_first_error() {
        let mut visited = Vec::new();
        let result: Result<FigureAssets<(), ()>, String> = named_assets().try_map(
            &mut visited,
            |visited, part, _| {
                visited.push(part);
                if part == BodyPart::LeftLeg {
                    Err("broken".to_string())
                } else {
                    Ok(())
                }
            },
            |_, _, _| Ok(()),
        );

        assert_eq!(result.unwrap_err(), "broken");
        assert_eq!(visited, [BodyPart::Head, BodyPart::Torso, BodyPart::LeftLeg]);
    }
}
