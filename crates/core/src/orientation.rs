use image::{imageops, GrayImage};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Inversion {
    None,
    Negate,
}

/// Clockwise quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rotation {
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mirror {
    None,
    Horizontal,
}

const INVERSIONS: [Inversion; 2] = [Inversion::None, Inversion::Negate];
const ROTATIONS: [Rotation; 4] = [
    Rotation::Deg0,
    Rotation::Deg90,
    Rotation::Deg180,
    Rotation::Deg270,
];
const MIRRORS: [Mirror; 2] = [Mirror::None, Mirror::Horizontal];

/// One element of inversion × rotation × mirror, applied as inversion ∘ rotation ∘ mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Orientation {
    pub inversion: Inversion,
    pub rotation: Rotation,
    pub mirror: Mirror,
}

impl Orientation {
    pub const IDENTITY: Orientation = Orientation {
        inversion: Inversion::None,
        rotation: Rotation::Deg0,
        mirror: Mirror::None,
    };

    /// All 16 combinations, inversion outermost and mirror innermost.
    pub fn all() -> impl Iterator<Item = Orientation> {
        INVERSIONS.into_iter().flat_map(|inversion| {
            ROTATIONS.into_iter().flat_map(move |rotation| {
                MIRRORS.into_iter().map(move |mirror| Orientation {
                    inversion,
                    rotation,
                    mirror,
                })
            })
        })
    }

    pub fn apply(&self, image: &GrayImage) -> GrayImage {
        let mirrored = match self.mirror {
            Mirror::None => image.clone(),
            Mirror::Horizontal => imageops::flip_horizontal(image),
        };

        let mut rotated = match self.rotation {
            Rotation::Deg0 => mirrored,
            Rotation::Deg90 => imageops::rotate90(&mirrored),
            Rotation::Deg180 => imageops::rotate180(&mirrored),
            Rotation::Deg270 => imageops::rotate270(&mirrored),
        };

        if self.inversion == Inversion::Negate {
            imageops::invert(&mut rotated);
        }
        rotated
    }
}

#[derive(Debug, Clone)]
pub struct TransformedImage {
    pub orientation: Orientation,
    pub image: GrayImage,
}

/// Transforms to run one search pass each.
///
/// Without `all_orientations` this is only the identity. Otherwise every orientation is applied
/// and results with byte-identical pixels collapse onto the first one enumerated.
pub fn expand(image: &GrayImage, all_orientations: bool) -> Vec<TransformedImage> {
    if !all_orientations {
        return vec![TransformedImage {
            orientation: Orientation::IDENTITY,
            image: image.clone(),
        }];
    }

    let mut seen = HashSet::new();
    let mut distinct = Vec::new();
    for orientation in Orientation::all() {
        let transformed = orientation.apply(image);
        if seen.insert(pixel_digest(&transformed)) {
            distinct.push(TransformedImage {
                orientation,
                image: transformed,
            });
        }
    }
    distinct
}

fn pixel_digest(image: &GrayImage) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(image.width().to_le_bytes());
    hasher.update(image.height().to_le_bytes());
    hasher.update(image.as_raw());
    hasher.finalize().to_vec()
}
