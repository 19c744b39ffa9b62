//! MDL/SCN container. Both variants share one layout; scenes prepend a block of six floats
//! and store a second UV channel per mesh.

use byteorder::{
	LE,
	ReadBytesExt,
	WriteBytesExt
};

use std::{
	fs::{
		self,
		File
	},
	io::{
		BufWriter,
		Cursor,
		ErrorKind,
		Seek,
		SeekFrom,
		Write
	},
	path::Path
};

use crate::{
	material::{
		MaterialTable,
		TextureTable
	},
	mesh::{
		Helper,
		Light,
		Mesh,
		Spline
	},
	primitives::{
		MODEL_VERSION,
		SCENE_HEADER_LEN,
		SCENE_MARKER_OFFSET
	}
};

#[cfg(feature = "export")]
use crate::{
	export::WTExportError,
	material::{
		write_materials,
		write_textures
	},
	primitives::write_count
};

#[cfg(feature = "import")]
use crate::{
	import::WTImportError,
	material::{
		read_materials,
		read_textures
	},
	primitives::read_count
};

/// Opaque floats opening a scene, preserved verbatim
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneHeader {
	pub values: [f32; SCENE_HEADER_LEN],
}

impl Default for SceneHeader {
	/// Values the original tools write when saving a scene
	fn default() -> SceneHeader {
		SceneHeader {
			values: [1.0, 1.0, 1.0, 0.02745098, 0.02745098, 0.02745098],
		}
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Model {
	/// Present for scenes (SCN), absent for plain models (MDL)
	pub scene: Option<SceneHeader>,
	pub textures: TextureTable,
	pub materials: MaterialTable,
	pub meshes: Vec<Mesh>,
	pub lights: Vec<Light>,
	pub helpers: Vec<Helper>,
	pub splines: Vec<Spline>,
}

impl Model {
	pub fn is_scene(&self) -> bool {
		self.scene.is_some()
	}

	/// Switches to the scene variant, keeping an existing header or adding the default one
	pub fn into_scene(mut self) -> Model {
		self.scene.get_or_insert_with(SceneHeader::default);
		self
	}

	/// Switches to the model variant, dropping what models cannot store:
	/// the scene header, second UV channels and alternate materials
	pub fn into_model(mut self) -> Model {
		self.scene = None;
		for mesh in self.meshes.iter_mut() {
			mesh.second_uv_channel = false;
			if let Some(uvs) = mesh.uvs.as_mut() {
				uvs.second_indices.clear();
			}
			for s in mesh.submeshes.iter_mut() {
				s.alt_material = 0;
			}
		}
		self
	}

	/// Reads the whole file into memory and decodes it
	#[cfg(feature = "import")]
	pub fn open<P>(path: P) -> Result<Model, WTImportError>
	where
		P: AsRef<Path>,
	{
		let mut data = Cursor::new(fs::read(path)?);
		Model::read(&mut data)
	}

	#[cfg(feature = "export")]
	pub fn save<P>(&self, path: P) -> Result<(), WTExportError>
	where
		P: AsRef<Path>,
	{
		let mut out = BufWriter::new(File::create(path)?);
		self.write(&mut out)?;
		out.flush()?;

		Ok(())
	}

	/// Tells scenes from models: a scene has the version float at [`SCENE_MARKER_OFFSET`],
	/// a model at the start. Leaves the stream at the version float.
	#[cfg(feature = "import")]
	fn detect_scene<R>(buf: &mut R, start: u64) -> Result<bool, WTImportError>
	where
		R: ReadBytesExt + Seek,
	{
		buf.seek(SeekFrom::Start(start + SCENE_MARKER_OFFSET))?;
		let scene = match buf.read_f32::<LE>() {
			Ok(v) => v == MODEL_VERSION,
			// too short to hold a scene header
			Err(e) if e.kind() == ErrorKind::UnexpectedEof => false,
			Err(e) => return Err(e.into()),
		};

		buf.seek(SeekFrom::Start(start))?;
		Ok(scene)
	}

	/// Decodes a model or scene starting at the current stream position
	#[cfg(feature = "import")]
	pub fn read<R>(buf: &mut R) -> Result<Model, WTImportError>
	where
		R: ReadBytesExt + Seek,
	{
		Model::read_body(buf).map_err(|e| e.locate(buf))
	}

	#[cfg(feature = "import")]
	fn read_body<R>(buf: &mut R) -> Result<Model, WTImportError>
	where
		R: ReadBytesExt + Seek,
	{
		let start = buf.stream_position()?;

		let scene = match Model::detect_scene(buf, start)? {
			true => {
				let mut values = [0.0; SCENE_HEADER_LEN];
				for v in values.iter_mut() {
					*v = buf.read_f32::<LE>()?;
				}
				Some(SceneHeader {
					values: values,
				})
			},
			false => None,
		};
		let is_scene = scene.is_some();

		let offset = buf.stream_position()?;
		let version = buf.read_f32::<LE>()?;
		if version != MODEL_VERSION {
			return Err(WTImportError::Version {
				found: version,
				offset: offset,
			});
		}

		let mesh_count = read_count(buf)?;
		let light_count = read_count(buf)?;
		let helper_count = read_count(buf)?;
		let spline_count = read_count(buf)?;
		let material_count = read_count(buf)?;
		let texture_count = read_count(buf)?;

		log::debug!("{}: {} meshes, {} lights, {} helpers, {} splines, {} materials, {} textures",
			if is_scene { "scene" } else { "model" },
			mesh_count, light_count, helper_count, spline_count, material_count, texture_count);

		let textures = read_textures(texture_count, buf)?;
		let materials = read_materials(material_count, buf)?;

		let mut meshes = vec![];
		for _ in 0..mesh_count {
			meshes.push(Mesh::read(buf, is_scene)?);
		}

		let mut lights = vec![];
		for _ in 0..light_count {
			lights.push(Light::read(buf)?);
		}

		let mut helpers = vec![];
		for _ in 0..helper_count {
			helpers.push(Helper::read(buf)?);
		}

		let mut splines = vec![];
		for _ in 0..spline_count {
			splines.push(Spline::read(buf)?);
		}

		log::debug!("decoded {} bytes", buf.stream_position()? - start);

		Ok(Model {
			scene: scene,
			textures: textures,
			materials: materials,
			meshes: meshes,
			lights: lights,
			helpers: helpers,
			splines: splines,
		})
	}

	/// Encodes the document. Textures and materials are written in ascending ID order.
	#[cfg(feature = "export")]
	pub fn write<W>(&self, buf: &mut W) -> Result<(), WTExportError>
	where
		W: WriteBytesExt,
	{
		if let Some(header) = &self.scene {
			for v in header.values.iter() {
				buf.write_f32::<LE>(*v)?;
			}
		}

		buf.write_f32::<LE>(MODEL_VERSION)?;
		write_count(buf, self.meshes.len(), || "meshes".to_string())?;
		write_count(buf, self.lights.len(), || "lights".to_string())?;
		write_count(buf, self.helpers.len(), || "helpers".to_string())?;
		write_count(buf, self.splines.len(), || "splines".to_string())?;
		write_count(buf, self.materials.len(), || "materials".to_string())?;
		write_count(buf, self.textures.len(), || "textures".to_string())?;

		write_textures(&self.textures, buf)?;
		write_materials(&self.materials, buf)?;

		for (i, mesh) in self.meshes.iter().enumerate() {
			mesh.write(buf, i, self.is_scene())?;
		}
		for light in self.lights.iter() {
			light.write(buf)?;
		}
		for helper in self.helpers.iter() {
			helper.write(buf)?;
		}
		for spline in self.splines.iter() {
			spline.write(buf)?;
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;

	use ultraviolet::vec::{
		Vec2,
		Vec3
	};

	use super::*;

	use crate::{
		material::Material,
		mesh::{
			LightType,
			NormalStream,
			SubSpline,
			Submesh,
			UvChannels
		},
		primitives::{
			Color48,
			Matrix3
		}
	};

	fn sample() -> Model {
		let mut textures = TextureTable::new();
		textures.insert(9, "grass.bmp".to_string());
		textures.insert(2, "rock.bmp".to_string());

		let mut rock = Material::new(5, "Rock");
		rock.texture_slots[0] = 2;
		let mut grass = Material::new(1, "Grass");
		grass.texture_slots[0] = 9;
		grass.color_key = Some(Color48::new(0, 0, 0));

		let mut materials = MaterialTable::new();
		materials.insert(5, rock);
		materials.insert(1, grass);

		let quad = Mesh {
			position: Vec3::new(10.0, 0.0, -4.0),
			second_uv_channel: true,
			position_indices: vec![0, 1, 2, 3],
			vertices: vec![Vec3::zero(), Vec3::unit_x(), Vec3::new(1.0, 0.0, 1.0), Vec3::unit_z()],
			uvs: Some(UvChannels {
				indices: vec![0, 1, 2, 3],
				second_indices: vec![0, 0, 0, 0],
				values: vec![Vec2::zero(), Vec2::unit_x(), Vec2::one(), Vec2::unit_y()],
			}),
			normals: Some(NormalStream::from_vectors(vec![0, 0, 0, 0], &[Vec3::unit_z()])),
			colors: vec![],
			submeshes: vec![
				Submesh {
					material: 5,
					alt_material: 1,
					indices: vec![0, 1, 2],
				},
				Submesh {
					material: 1,
					alt_material: 1,
					indices: vec![0, 2, 3],
				},
			],
		};

		Model {
			scene: None,
			textures: textures,
			materials: materials,
			meshes: vec![quad],
			lights: vec![Light {
				name: "lamp".to_string(),
				light_type: LightType::Spot,
				position: Vec3::unit_y(),
				matrix: Matrix3::identity(),
				color: Vec3::one(),
				unknown: 0.5,
				reference: None,
			}],
			helpers: vec![Helper {
				name: "spawn".to_string(),
				position: Vec3::zero(),
				matrix: Matrix3::identity(),
				reference: Some("player.mdl".to_string()),
			}],
			splines: vec![Spline {
				name: "rail".to_string(),
				position: Vec3::zero(),
				subsplines: vec![SubSpline {
					closed: false,
					points: vec![Vec3::zero(), Vec3::unit_x()],
				}],
				reference: None,
			}],
		}
	}

	fn encode(model: &Model) -> Vec<u8> {
		let mut out: Vec<u8> = vec![];
		model.write(&mut out).unwrap();
		out
	}

	#[test]
	fn test_model_roundtrip() {
		let model = sample().into_model();
		let data = encode(&model);

		let read = Model::read(&mut Cursor::new(&data)).unwrap();
		assert!(!read.is_scene());
		assert_eq!(model, read);

		// byte exact once decoded
		assert_eq!(data, encode(&read));
	}

	#[test]
	fn test_scene_roundtrip() {
		let scene = sample().into_scene();
		let data = encode(&scene);
		assert_eq!(&1.0f32.to_le_bytes()[..], &data[0..4]);
		assert_eq!(&0.02745098f32.to_le_bytes()[..], &data[20..24]);

		let read = Model::read(&mut Cursor::new(&data)).unwrap();
		assert_eq!(Some(SceneHeader::default()), read.scene);
		assert_eq!(vec![0, 0, 0, 0], read.meshes[0].uvs.as_ref().unwrap().second_indices);
		assert_eq!(scene, read);
	}

	#[test]
	fn test_scene_detection() {
		// 1.0 at both 0 and 24: the scene check wins
		let data = encode(&Model::default().into_scene());
		assert_eq!(&data[0..4], &data[24..28]);
		assert!(Model::read(&mut Cursor::new(&data)).unwrap().is_scene());

		// 1.0 only at 0; offset 24 holds the texture count
		let data = encode(&sample().into_model());
		assert_eq!(&2i32.to_le_bytes()[..], &data[24..28]);
		assert!(!Model::read(&mut Cursor::new(&data)).unwrap().is_scene());

		// shorter than a scene header
		let data = 1.0f32.to_le_bytes();
		assert!(Model::read(&mut Cursor::new(&data)).is_err());
	}

	#[test]
	fn test_version_rejected() {
		let mut data = encode(&Model::default());
		data[0..4].copy_from_slice(&2.0f32.to_le_bytes());

		match Model::read(&mut Cursor::new(&data)) {
			Err(WTImportError::Version { found, offset: 0 }) => assert_eq!(2.0, found),
			r => panic!("unexpected {:?}", r),
		}
	}

	#[test]
	fn test_canonical_order() {
		let data = encode(&sample().into_model());
		// textures start right after the version and six counts
		assert_eq!(&b"rock.bmp\x00\x02\x00\x00\x00grass.bmp\x00"[..], &data[28..51]);

		let read = Model::read(&mut Cursor::new(&data)).unwrap();
		assert_eq!(vec![1, 5], read.materials.keys().copied().collect::<Vec<i32>>());
		assert_eq!("Grass", read.materials[&1].name);
	}

	#[test]
	fn test_duplicate_texture() {
		let mut model = Model::default();
		model.textures.insert(3, "a.bmp".to_string());
		model.textures.insert(4, "b.bmp".to_string());

		let mut data = encode(&model);
		let len = data.len();
		data[len - 4] = 3;

		assert!(matches!(Model::read(&mut Cursor::new(&data)), Err(WTImportError::DuplicateTexture(3))));
	}

	#[test]
	fn test_truncated() {
		let data = encode(&sample().into_model());
		let cut = &data[..data.len() - 5];

		match Model::read(&mut Cursor::new(cut)) {
			Err(WTImportError::Truncated { offset }) => assert_eq!(cut.len() as u64, offset),
			r => panic!("unexpected {:?}", r),
		}
	}

	#[test]
	fn test_variant_switch() {
		let scene = sample().into_scene();
		assert!(scene.is_scene());
		assert!(scene.meshes[0].second_uv_channel);

		let model = scene.into_model();
		assert!(!model.is_scene());
		assert!(!model.meshes[0].second_uv_channel);
		assert!(model.meshes[0].uvs.as_ref().unwrap().second_indices.is_empty());
		assert_eq!(0, model.meshes[0].submeshes[1].alt_material);

		// second channel data is not stored in models
		let data = encode(&sample().into_model());
		let scene_data = encode(&sample().into_scene());
		assert_eq!(data.len() + 24 + 2 + 16 + 4, scene_data.len());
	}
}
