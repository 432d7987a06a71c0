use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown material name: '{0}'")]
pub struct UnknownMaterial(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Material {
    Undefined,
    Mask,
    Si,
    SiO2,
    Si3N4,
    SiN,
    SiON,
    SiC,
    PolySi,
    GaN,
    W,
    Al2O3,
    TiN,
    Cu,
    Polymer,
    Dielectric,
    Metal,
    Air,
    Gas,
}

impl Material {
    pub const ALL: [Material; 19] = [
        Material::Undefined,
        Material::Mask,
        Material::Si,
        Material::SiO2,
        Material::Si3N4,
        Material::SiN,
        Material::SiON,
        Material::SiC,
        Material::PolySi,
        Material::GaN,
        Material::W,
        Material::Al2O3,
        Material::TiN,
        Material::Cu,
        Material::Polymer,
        Material::Dielectric,
        Material::Metal,
        Material::Air,
        Material::Gas,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Material::Undefined => "Undefined",
            Material::Mask => "Mask",
            Material::Si => "Si",
            Material::SiO2 => "SiO2",
            Material::Si3N4 => "Si3N4",
            Material::SiN => "SiN",
            Material::SiON => "SiON",
            Material::SiC => "SiC",
            Material::PolySi => "PolySi",
            Material::GaN => "GaN",
            Material::W => "W",
            Material::Al2O3 => "Al2O3",
            Material::TiN => "TiN",
            Material::Cu => "Cu",
            Material::Polymer => "Polymer",
            Material::Dielectric => "Dielectric",
            Material::Metal => "Metal",
            Material::Air => "Air",
            Material::Gas => "GAS",
        }
    }

    /// Numeric id used in exported point tables.
    pub fn id(&self) -> i32 {
        match self {
            Material::Undefined => -1,
            other => Material::ALL
                .iter()
                .position(|m| m == other)
                .map(|p| p as i32 - 1)
                .unwrap_or(-1),
        }
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Material {
    type Err = UnknownMaterial;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Material::ALL
            .iter()
            .find(|m| m.name().eq_ignore_ascii_case(trimmed))
            .copied()
            .ok_or_else(|| UnknownMaterial(trimmed.to_string()))
    }
}

/// One material per level set, bottom layer first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterialMap {
    materials: Vec<Material>,
}

impl MaterialMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_next(&mut self, material: Material) {
        self.materials.push(material);
    }

    pub fn remove_top(&mut self) -> Option<Material> {
        self.materials.pop()
    }

    pub fn material_at(&self, layer: usize) -> Option<Material> {
        self.materials.get(layer).copied()
    }

    pub fn top(&self) -> Option<Material> {
        self.materials.last().copied()
    }

    pub fn contains(&self, material: Material) -> bool {
        self.materials.contains(&material)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Material> {
        self.materials.iter()
    }
}
