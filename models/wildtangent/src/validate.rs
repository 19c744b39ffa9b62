//! Referential checks layered on top of decoding. Decoders accept dangling references;
//! these passes report them without touching the document.

use thiserror::Error;

use crate::{
	material::{
		MaterialTable,
		TextureTable
	},
	model::Model,
	skinned::SkinnedModel
};

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ReferenceError {
	#[error("Material {material}: texture slot {slot} refers to missing texture {texture}")]
	TextureSlot {
		material: i32,
		slot: usize,
		texture: i32,
	},
	#[error("Mesh {mesh}, submesh {submesh}: refers to missing material {material}")]
	Material {
		mesh: usize,
		submesh: usize,
		material: i16,
	},
}

/// Reports every used texture slot whose ID is missing from `textures`
pub fn validate_materials(materials: &MaterialTable, textures: &TextureTable) -> Vec<ReferenceError> {
	let mut errors = vec![];

	for m in materials.values() {
		for (slot, texture) in m.texture_slots.iter().enumerate() {
			if *texture >= 0 && !textures.contains_key(texture) {
				errors.push(ReferenceError::TextureSlot {
					material: m.id,
					slot: slot,
					texture: *texture,
				});
			}
		}
	}

	errors
}

impl Model {
	/// Texture slots and submesh materials that do not resolve. Negative submesh
	/// materials mean "unassigned" and are accepted.
	pub fn validate(&self) -> Vec<ReferenceError> {
		let mut errors = validate_materials(&self.materials, &self.textures);

		let resolves = |m: i16| m < 0 || self.materials.contains_key(&i32::from(m));
		for (i, mesh) in self.meshes.iter().enumerate() {
			let second = mesh.uses_second_channel(self.is_scene());

			for (j, s) in mesh.submeshes.iter().enumerate() {
				let mut check = |material: i16| if !resolves(material) {
					errors.push(ReferenceError::Material {
						mesh: i,
						submesh: j,
						material: material,
					});
				};

				check(s.material);
				if second {
					check(s.alt_material);
				}
			}
		}

		if !errors.is_empty() {
			log::debug!("model has {} unresolved references", errors.len());
		}
		errors
	}
}

impl SkinnedModel {
	/// Texture slots that do not resolve
	pub fn validate(&self) -> Vec<ReferenceError> {
		validate_materials(&self.materials, &self.textures)
	}
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;

	use super::*;

	use crate::{
		material::Material,
		mesh::{
			Mesh,
			Submesh
		}
	};

	#[test]
	fn test_missing_texture_reported() {
		let mut model = Model::default();
		model.textures.insert(1, "ok.bmp".to_string());

		let mut broken = Material::new(4, "Broken");
		broken.texture_slots[0] = 7;
		broken.texture_slots[2] = 1;
		model.materials.insert(4, broken);
		model.materials.insert(5, Material::new(5, "Fine"));

		let mut data: Vec<u8> = vec![];
		model.write(&mut data).unwrap();

		// decoding does not care
		let read = Model::read(&mut Cursor::new(&data)).unwrap();
		assert_eq!(2, read.materials.len());
		assert_eq!("Broken", read.materials[&4].name);

		assert_eq!(vec![ReferenceError::TextureSlot {
			material: 4,
			slot: 0,
			texture: 7,
		}], read.validate());
	}

	#[test]
	fn test_submesh_material() {
		let mut model = Model::default();
		model.materials.insert(2, Material::new(2, "A"));
		model.meshes.push(Mesh {
			second_uv_channel: true,
			submeshes: vec![
				Submesh { material: 2, alt_material: 8, indices: vec![] },
				Submesh { material: -1, alt_material: 0, indices: vec![] },
				Submesh { material: 3, alt_material: 0, indices: vec![] },
			],
			..Mesh::default()
		});

		assert_eq!(vec![ReferenceError::Material { mesh: 0, submesh: 2, material: 3 }], model.validate());

		// alternate materials only count in scenes
		let scene = model.into_scene();
		assert_eq!(vec![
			ReferenceError::Material { mesh: 0, submesh: 0, material: 8 },
			ReferenceError::Material { mesh: 0, submesh: 1, material: 0 },
			ReferenceError::Material { mesh: 0, submesh: 2, material: 3 },
			ReferenceError::Material { mesh: 0, submesh: 2, material: 0 },
		], scene.validate());
	}

	#[test]
	fn test_skinned() {
		let mut sms = SkinnedModel::default();
		let mut m = Material::new(0, "Skin");
		m.texture_slots[6] = 3;
		sms.materials.insert(0, m);

		assert_eq!(vec![ReferenceError::TextureSlot { material: 0, slot: 6, texture: 3 }], sms.validate());

		sms.textures.insert(3, "skin.bmp".to_string());
		assert!(sms.validate().is_empty());
	}
}
