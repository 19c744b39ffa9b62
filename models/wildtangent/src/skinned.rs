//! SMS skinned characters. Read-only.

use byteorder::{
	LE,
	ReadBytesExt
};

use std::{
	fs,
	io::{
		Cursor,
		ErrorKind,
		Seek
	},
	path::Path
};

use ultraviolet::vec::{
	Vec2,
	Vec3
};

use rgk_core::io_ext::ReadBinExt;

use crate::{
	material::{
		MaterialTable,
		TextureTable
	},
	primitives::Matrix3,
	skeleton::Hierarchy
};

#[cfg(feature = "import")]
use crate::{
	import::WTImportError,
	material::{
		read_materials,
		read_textures
	},
	primitives::{
		OBJECT_NAME_LEN,
		SKINNED_MAGIC,
		read_count,
		read_end,
		read_magic,
		read_reference
	}
};

/// String pair of unknown purpose, kept as found
#[derive(Clone, Debug, PartialEq)]
pub struct TagPair {
	pub name: String,
	pub value: Option<String>,
}

/// Bookkeeping fields of an object. Several are offsets and lengths that only make sense
/// when the object is stored as a file of its own.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ObjectHeader {
	pub unknown: i32,
	pub flag: i32,
	pub vertex_count: i32,
	pub face_count: i32,
	pub write_after: i32,
	pub header_len: i32,
	pub face_list_len: i32,
	pub vertex_list_len: i32,
	pub file_size: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SkinnedFace {
	pub indices: [i32; 3],
	pub material: i32,
}

/// One bone's influence on a vertex
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SkinWeightLayer {
	pub bone: i32,
	/// Vertex position relative to the bone
	pub offset: Vec3,
	pub unknown_bytes: [u8; 2],
	pub unknown: f32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SkinnedVertex {
	pub layers: Vec<SkinWeightLayer>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SkinnedObject {
	pub name: String,
	pub header: ObjectHeader,
	pub faces: Vec<SkinnedFace>,
	/// One per vertex
	pub uvs: Vec<Vec2>,
	pub vertices: Vec<SkinnedVertex>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Bone {
	pub name: String,
	/// Index into the bone list, -1 for roots
	pub parent: i32,
	pub origin: Vec3,
	pub matrix: Matrix3,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SkinnedModel {
	/// Count of unknown purpose from the header
	pub unknown_count: i32,
	pub textures: TextureTable,
	pub materials: MaterialTable,
	pub tags: Vec<TagPair>,
	pub objects: Vec<SkinnedObject>,
	pub bones: Vec<Bone>,
}

impl SkinWeightLayer {
	#[cfg(feature = "import")]
	pub fn read<R>(buf: &mut R) -> Result<SkinWeightLayer, WTImportError>
	where
		R: ReadBytesExt,
	{
		Ok(SkinWeightLayer {
			bone: buf.read_i32::<LE>()?,
			offset: buf.read_vec3_le()?,
			unknown_bytes: [buf.read_u8()?, buf.read_u8()?],
			unknown: buf.read_f32::<LE>()?,
		})
	}
}

impl SkinnedObject {
	#[cfg(feature = "import")]
	pub fn read<R>(buf: &mut R) -> Result<SkinnedObject, WTImportError>
	where
		R: ReadBytesExt + Seek,
	{
		let offset = buf.stream_position()?;
		let name = buf.read_fixed_cstr(OBJECT_NAME_LEN).map_err(|e| match e.kind() {
			ErrorKind::InvalidData => WTImportError::ObjectName {
				offset: offset,
			},
			_ => e.into(),
		})?;

		let unknown = buf.read_i32::<LE>()?;
		let flag = buf.read_i32::<LE>()?;
		let vertex_count = read_count(buf)?;
		let face_count = read_count(buf)?;

		let header = ObjectHeader {
			unknown: unknown,
			flag: flag,
			vertex_count: vertex_count as i32,
			face_count: face_count as i32,
			write_after: buf.read_i32::<LE>()?,
			header_len: buf.read_i32::<LE>()?,
			face_list_len: buf.read_i32::<LE>()?,
			vertex_list_len: buf.read_i32::<LE>()?,
			file_size: buf.read_i32::<LE>()?,
		};

		let mut faces = vec![];
		for _ in 0..face_count {
			faces.push(SkinnedFace {
				indices: [buf.read_i32::<LE>()?, buf.read_i32::<LE>()?, buf.read_i32::<LE>()?],
				material: buf.read_i32::<LE>()?,
			});
		}

		let mut uvs = vec![];
		for _ in 0..vertex_count {
			uvs.push(buf.read_vec2_le()?);
		}

		let mut vertices = vec![];
		for _ in 0..vertex_count {
			let layer_count = read_count(buf)?;

			let mut layers = vec![];
			for _ in 0..layer_count {
				layers.push(SkinWeightLayer::read(buf)?);
			}
			vertices.push(SkinnedVertex {
				layers: layers,
			});
		}

		log::trace!("object '{}': {} faces, {} vertices", name, face_count, vertex_count);

		Ok(SkinnedObject {
			name: name,
			header: header,
			faces: faces,
			uvs: uvs,
			vertices: vertices,
		})
	}
}

impl Bone {
	#[cfg(feature = "import")]
	pub fn read<R>(buf: &mut R) -> Result<Bone, WTImportError>
	where
		R: ReadBytesExt,
	{
		Ok(Bone {
			name: buf.read_cstr()?,
			parent: buf.read_i32::<LE>()?,
			origin: buf.read_vec3_le()?,
			matrix: Matrix3::read_quantized(buf)?,
		})
	}
}

impl SkinnedModel {
	/// Parent chain resolver over this model's bones
	pub fn hierarchy(&self) -> Hierarchy<'_> {
		Hierarchy::new(&self.bones)
	}

	#[cfg(feature = "import")]
	pub fn open<P>(path: P) -> Result<SkinnedModel, WTImportError>
	where
		P: AsRef<Path>,
	{
		let mut data = Cursor::new(fs::read(path)?);
		SkinnedModel::read(&mut data)
	}

	#[cfg(feature = "import")]
	pub fn read<R>(buf: &mut R) -> Result<SkinnedModel, WTImportError>
	where
		R: ReadBytesExt + Seek,
	{
		SkinnedModel::read_body(buf).map_err(|e| e.locate(buf))
	}

	#[cfg(feature = "import")]
	fn read_body<R>(buf: &mut R) -> Result<SkinnedModel, WTImportError>
	where
		R: ReadBytesExt + Seek,
	{
		read_magic(buf, SKINNED_MAGIC)?;

		let object_count = read_count(buf)?;
		let unknown_count = buf.read_i32::<LE>()?;
		let tag_count = read_count(buf)?;
		let material_count = read_count(buf)?;
		let texture_count = read_count(buf)?;

		log::debug!("skinned model: {} objects, {} tags, {} materials, {} textures",
			object_count, tag_count, material_count, texture_count);

		let textures = read_textures(texture_count, buf)?;
		let materials = read_materials(material_count, buf)?;

		let mut tags = vec![];
		for _ in 0..tag_count {
			tags.push(TagPair {
				name: buf.read_cstr()?,
				value: read_reference(buf)?,
			});
		}

		let mut objects = vec![];
		for _ in 0..object_count {
			objects.push(SkinnedObject::read(buf)?);
		}

		let bone_count = read_count(buf)?;
		let mut bones = vec![];
		for _ in 0..bone_count {
			bones.push(Bone::read(buf)?);
		}

		log::debug!("skinned model: {} bones", bone_count);
		read_end(buf)?;

		Ok(SkinnedModel {
			unknown_count: unknown_count,
			textures: textures,
			materials: materials,
			tags: tags,
			objects: objects,
			bones: bones,
		})
	}
}

#[cfg(test)]
mod tests {
	use byteorder::{
		LE,
		WriteBytesExt
	};

	use std::io::Cursor;

	use ultraviolet::vec::{
		Vec2,
		Vec3
	};

	use super::*;

	use crate::material::{
		Material,
		write_textures
	};

	fn object_bytes(out: &mut Vec<u8>, name: &[u8], layer_counts: &[i32]) {
		let mut field = name.to_vec();
		field.resize(OBJECT_NAME_LEN, 0xCD);
		field[name.len()] = 0;
		out.extend_from_slice(&field);

		let vertex_count = layer_counts.len() as i32;
		for v in [7, 1, vertex_count, 1, 0, 100, 116, 200, 300].iter() {
			out.write_i32::<LE>(*v).unwrap();
		}

		for v in [0, 1, 2, 3].iter() {
			out.write_i32::<LE>(*v).unwrap();
		}
		for i in 0..vertex_count {
			out.write_f32::<LE>(i as f32).unwrap();
			out.write_f32::<LE>(0.5).unwrap();
		}
		for (i, count) in layer_counts.iter().enumerate() {
			out.write_i32::<LE>(*count).unwrap();
			for l in 0..*count {
				out.write_i32::<LE>(l).unwrap();
				out.write_f32::<LE>(i as f32).unwrap();
				out.write_f32::<LE>(0.0).unwrap();
				out.write_f32::<LE>(-1.0).unwrap();
				out.write_u8(0xAA).unwrap();
				out.write_u8(0x55).unwrap();
				out.write_f32::<LE>(0.25).unwrap();
			}
		}
	}

	fn bone_bytes(out: &mut Vec<u8>, name: &[u8], parent: i32, origin: [f32; 3]) {
		out.extend_from_slice(name);
		out.push(0);
		out.write_i32::<LE>(parent).unwrap();
		for f in origin.iter() {
			out.write_f32::<LE>(*f).unwrap();
		}
		for v in [32767i16, 0, 0, 0, 32767, 0, 0, 0, 32767].iter() {
			out.write_i16::<LE>(*v).unwrap();
		}
	}

	fn sample() -> Vec<u8> {
		let mut out: Vec<u8> = vec![];
		out.extend_from_slice(b"V2.0\x00\x00\x00\x00\x00");
		for v in [2, 42, 2, 1, 1].iter() {
			out.write_i32::<LE>(*v).unwrap();
		}

		let mut textures = TextureTable::new();
		textures.insert(0, "skin.bmp".to_string());
		write_textures(&textures, &mut out).unwrap();
		let mut m = Material::new(3, "Skin");
		m.texture_slots[0] = 0;
		m.write(&mut out).unwrap();

		out.extend_from_slice(b"head\x00\x01\x00hat\x00");
		out.extend_from_slice(b"hand\x00\x00\x00");

		object_bytes(&mut out, b"Body", &[1, 3, 0]);
		object_bytes(&mut out, b"Sword", &[2]);

		out.write_i32::<LE>(3).unwrap();
		bone_bytes(&mut out, b"root", -1, [0.0, 0.0, 0.0]);
		bone_bytes(&mut out, b"spine", 0, [1.0, 0.0, 0.0]);
		bone_bytes(&mut out, b"head", 1, [0.0, 1.0, 0.0]);
		out
	}

	#[test]
	fn test_decode() {
		let data = sample();
		let sms = SkinnedModel::read(&mut Cursor::new(&data)).unwrap();

		assert_eq!(42, sms.unknown_count);
		assert_eq!("skin.bmp", sms.textures[&0]);
		assert_eq!("Skin", sms.materials[&3].name);
		assert_eq!(vec![
			TagPair { name: "head".to_string(), value: Some("hat".to_string()) },
			TagPair { name: "hand".to_string(), value: None },
		], sms.tags);

		assert_eq!(2, sms.objects.len());
		let body = &sms.objects[0];
		assert_eq!("Body", body.name);
		assert_eq!(ObjectHeader {
			unknown: 7,
			flag: 1,
			vertex_count: 3,
			face_count: 1,
			write_after: 0,
			header_len: 100,
			face_list_len: 116,
			vertex_list_len: 200,
			file_size: 300,
		}, body.header);
		assert_eq!(vec![SkinnedFace { indices: [0, 1, 2], material: 3 }], body.faces);
		assert_eq!(Vec2::new(2.0, 0.5), body.uvs[2]);

		assert_eq!(3, sms.bones.len());
		assert_eq!(1, sms.bones[2].parent);
		assert_eq!(Matrix3::identity(), sms.bones[0].matrix);
		assert_eq!(Vec3::new(1.0, 1.0, 0.0), sms.hierarchy().absolute_origin(2).unwrap());
	}

	#[test]
	fn test_variable_layers() {
		let sms = SkinnedModel::read(&mut Cursor::new(&sample())).unwrap();

		let counts: Vec<usize> = sms.objects[0].vertices.iter().map(|v| v.layers.len()).collect();
		assert_eq!(vec![1, 3, 0], counts);
		assert_eq!(SkinWeightLayer {
			bone: 2,
			offset: Vec3::new(1.0, 0.0, -1.0),
			unknown_bytes: [0xAA, 0x55],
			unknown: 0.25,
		}, sms.objects[0].vertices[1].layers[2]);
		assert_eq!(2, sms.objects[1].vertices[0].layers.len());
		assert_eq!("Sword", sms.objects[1].name);
	}

	#[test]
	fn test_name_field() {
		// a name filling the whole field leaves no room for the terminator
		let mut data: Vec<u8> = vec![];
		object_bytes(&mut data, &[b'x'; 63], &[]);
		assert_eq!(63, SkinnedObject::read(&mut Cursor::new(&data)).unwrap().name.len());

		data[63] = b'x';
		assert!(matches!(SkinnedObject::read(&mut Cursor::new(&data)),
			Err(WTImportError::ObjectName { offset: 0 })));
	}

	#[test]
	fn test_bad_magic() {
		let mut data = sample();
		data[0..4].copy_from_slice(b"V1.0");
		assert!(matches!(SkinnedModel::read(&mut Cursor::new(&data)),
			Err(WTImportError::Magic { found: 0x302E3156, offset: 0, .. })));

		let mut data = sample();
		data[4] = 0xFF;
		assert!(matches!(SkinnedModel::read(&mut Cursor::new(&data)),
			Err(WTImportError::Terminator { value: 0xFF, offset: 4 })));
	}

	#[test]
	fn test_trailing_bytes() {
		let mut data = sample();
		let len = data.len() as u64;
		data.extend_from_slice(b"extra");

		assert!(matches!(SkinnedModel::read(&mut Cursor::new(&data)),
			Err(WTImportError::TrailingData { offset, remaining: 5 }) if offset == len));
	}

	#[test]
	fn test_truncated() {
		let data = sample();
		let cut = &data[..data.len() - 1];
		assert!(matches!(SkinnedModel::read(&mut Cursor::new(cut)),
			Err(WTImportError::Truncated { .. })));
	}
}
