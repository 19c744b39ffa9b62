//! Per-object records of the MDL/SCN container: meshes and the scene decorations
//! (lights, helpers and splines) placed next to them

use byteorder::{
	LE,
	ReadBytesExt,
	WriteBytesExt
};

use std::io::Seek;

use ultraviolet::vec::{
	Vec2,
	Vec3
};

use rgk_core::io_ext::{
	ReadBinExt,
	WriteBinExt
};

use crate::primitives::{
	Color48,
	Matrix3,
	PackedNormal
};

#[cfg(feature = "export")]
use crate::{
	export::WTExportError,
	primitives::{
		write_count,
		write_count16,
		write_indices,
		write_reference,
		write_text
	}
};

#[cfg(feature = "import")]
use crate::{
	import::WTImportError,
	primitives::{
		offset_of,
		read_bool16,
		read_bool8,
		read_count,
		read_indices,
		read_reference
	}
};

/// UV coordinates with their per face-vertex index streams
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UvChannels {
	pub indices: Vec<i32>,
	/// Only stored by scene meshes with a second UV channel, empty otherwise
	pub second_indices: Vec<i32>,
	pub values: Vec<Vec2>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalStream {
	pub indices: Vec<i32>,
	pub values: Vec<PackedNormal>,
}

impl NormalStream {
	/// Packs unit vectors, losing up to one quantization step per angle
	pub fn from_vectors(indices: Vec<i32>, normals: &[Vec3]) -> NormalStream {
		NormalStream {
			indices: indices,
			values: normals.iter().map(|n| PackedNormal::encode(*n)).collect(),
		}
	}

	/// Unpacked normals, in the Y-up frame
	pub fn vectors(&self) -> Vec<Vec3> {
		self.values.iter().map(|n| n.decode()).collect()
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Submesh {
	/// Material ID, negative when unassigned
	pub material: i16,
	/// Material used with the second UV channel
	pub alt_material: i16,
	/// Triangle list indexing the face-vertex streams
	pub indices: Vec<i32>,
}

impl Submesh {
	pub fn triangle_count(&self) -> usize {
		self.indices.len() / 3
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
	pub position: Vec3,
	pub second_uv_channel: bool,
	/// One entry per face-vertex; its length is the length of every other index stream
	pub position_indices: Vec<i32>,
	pub vertices: Vec<Vec3>,
	pub uvs: Option<UvChannels>,
	pub normals: Option<NormalStream>,
	/// Stored densely rather than through an index stream
	pub colors: Vec<Color48>,
	pub submeshes: Vec<Submesh>,
}

impl Mesh {
	/// Whether the second UV stream and alternate materials are stored in the given variant
	pub fn uses_second_channel(&self, scene: bool) -> bool {
		scene && self.second_uv_channel
	}

	pub fn triangle_count(&self) -> usize {
		self.submeshes.iter().map(|s| s.triangle_count()).sum()
	}

	/// Face-vertex total over all submeshes, as stored ahead of the submesh list
	pub fn index_count(&self) -> usize {
		self.submeshes.iter().map(|s| s.indices.len()).sum()
	}

	#[cfg(feature = "import")]
	pub fn read<R>(buf: &mut R, scene: bool) -> Result<Mesh, WTImportError>
	where
		R: ReadBytesExt + Seek,
	{
		let position = buf.read_vec3_le()?;
		let second_uv_channel = match scene {
			true => read_bool16(buf)?,
			false => false,
		};
		let second = scene && second_uv_channel;

		let index_count = read_count(buf)?;
		let position_indices = read_indices(index_count, buf)?;

		let vertex_count = read_count(buf)?;
		let mut vertices = vec![];
		for _ in 0..vertex_count {
			vertices.push(buf.read_vec3_le()?);
		}

		let uvs = match read_bool16(buf)? {
			true => {
				let mut indices = vec![];
				let mut second_indices = vec![];
				for _ in 0..index_count {
					indices.push(buf.read_i32::<LE>()?);
					if second {
						second_indices.push(buf.read_i32::<LE>()?);
					}
				}

				let uv_count = read_count(buf)?;
				let mut values = vec![];
				for _ in 0..uv_count {
					values.push(buf.read_vec2_le()?);
				}

				Some(UvChannels {
					indices: indices,
					second_indices: second_indices,
					values: values,
				})
			},
			false => None,
		};

		let normals = match read_bool16(buf)? {
			true => {
				let indices = read_indices(index_count, buf)?;

				let normal_count = read_count(buf)?;
				let mut values = vec![];
				for _ in 0..normal_count {
					values.push(PackedNormal::read(buf)?);
				}

				Some(NormalStream {
					indices: indices,
					values: values,
				})
			},
			false => None,
		};

		let color_count = read_count(buf)?;
		let mut colors = vec![];
		for _ in 0..color_count {
			colors.push(Color48::read(buf)?);
		}

		// recomputed on write
		let _total_indices = buf.read_i32::<LE>()?;

		let submesh_count = read_count(buf)?;
		let mut submeshes = vec![];
		for _ in 0..submesh_count {
			let material = buf.read_i16::<LE>()?;
			let alt_material = match second {
				true => buf.read_i16::<LE>()?,
				false => 0,
			};

			let triangles = read_count(buf)?;
			let indices = read_indices(triangles * 3, buf)?;

			submeshes.push(Submesh {
				material: material,
				alt_material: alt_material,
				indices: indices,
			});
		}

		log::trace!("mesh: {} face-vertices, {} vertices, {} submeshes, uvs {}, normals {}, second channel {}",
			index_count, vertex_count, submesh_count, uvs.is_some(), normals.is_some(), second);

		Ok(Mesh {
			position: position,
			second_uv_channel: second_uv_channel,
			position_indices: position_indices,
			vertices: vertices,
			uvs: uvs,
			normals: normals,
			colors: colors,
			submeshes: submeshes,
		})
	}

	/// Checks that every index stream can be written without a count of its own
	#[cfg(feature = "export")]
	fn check_streams(&self, index: usize, scene: bool) -> Result<(), WTExportError> {
		let expected = self.position_indices.len();
		let check = |found: usize, stream: &str| match found == expected {
			true => Ok(()),
			false => Err(WTExportError::StreamLength {
				path: format!("mesh {}.{}", index, stream),
				expected: expected,
				found: found,
			}),
		};

		if let Some(uvs) = &self.uvs {
			check(uvs.indices.len(), "uv indices")?;
			if self.uses_second_channel(scene) {
				check(uvs.second_indices.len(), "second uv indices")?;
			}
		}
		if let Some(normals) = &self.normals {
			check(normals.indices.len(), "normal indices")?;
		}

		for (i, s) in self.submeshes.iter().enumerate() {
			if s.indices.len() % 3 != 0 {
				return Err(WTExportError::Triangles {
					path: format!("mesh {}.submesh {}.indices", index, i),
					len: s.indices.len(),
				});
			}
		}

		Ok(())
	}

	/// Writes the mesh. `index` is its position in the container, used to report failures.
	#[cfg(feature = "export")]
	pub fn write<W>(&self, buf: &mut W, index: usize, scene: bool) -> Result<(), WTExportError>
	where
		W: WriteBytesExt,
	{
		self.check_streams(index, scene)?;
		let second = self.uses_second_channel(scene);

		buf.write_vec3_le(self.position)?;
		if scene {
			buf.write_u16::<LE>(self.second_uv_channel as u16)?;
		}

		write_count(buf, self.position_indices.len(), || format!("mesh {}.position indices", index))?;
		write_indices(buf, &self.position_indices)?;

		write_count(buf, self.vertices.len(), || format!("mesh {}.vertices", index))?;
		for v in self.vertices.iter() {
			buf.write_vec3_le(*v)?;
		}

		buf.write_u16::<LE>(self.uvs.is_some() as u16)?;
		if let Some(uvs) = &self.uvs {
			for (i, uv) in uvs.indices.iter().enumerate() {
				buf.write_i32::<LE>(*uv)?;
				if second {
					buf.write_i32::<LE>(uvs.second_indices[i])?;
				}
			}

			write_count(buf, uvs.values.len(), || format!("mesh {}.uvs", index))?;
			for uv in uvs.values.iter() {
				buf.write_vec2_le(*uv)?;
			}
		}

		buf.write_u16::<LE>(self.normals.is_some() as u16)?;
		if let Some(normals) = &self.normals {
			write_indices(buf, &normals.indices)?;

			write_count(buf, normals.values.len(), || format!("mesh {}.normals", index))?;
			for n in normals.values.iter() {
				n.write(buf)?;
			}
		}

		write_count(buf, self.colors.len(), || format!("mesh {}.colors", index))?;
		for c in self.colors.iter() {
			c.write(buf)?;
		}

		write_count(buf, self.index_count(), || format!("mesh {}.indices", index))?;
		write_count(buf, self.submeshes.len(), || format!("mesh {}.submeshes", index))?;
		for (i, s) in self.submeshes.iter().enumerate() {
			buf.write_i16::<LE>(s.material)?;
			if second {
				buf.write_i16::<LE>(s.alt_material)?;
			}

			write_count(buf, s.triangle_count(), || format!("mesh {}.submesh {}.triangles", index, i))?;
			write_indices(buf, &s.indices)?;
		}

		Ok(())
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u16)]
pub enum LightType {
	Omni = 0,
	Spot,
	Unknown2,
	Unknown3,
	Directional,
}

impl LightType {
	pub fn from_u16(value: u16) -> Option<LightType> {
		match value {
			0 => Some(LightType::Omni),
			1 => Some(LightType::Spot),
			2 => Some(LightType::Unknown2),
			3 => Some(LightType::Unknown3),
			4 => Some(LightType::Directional),
			_ => None,
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct Light {
	pub name: String,
	pub light_type: LightType,
	pub position: Vec3,
	pub matrix: Matrix3,
	/// Floating point RGB
	pub color: Vec3,
	pub unknown: f32,
	/// Name of an instanced asset
	pub reference: Option<String>,
}

impl Light {
	#[cfg(feature = "import")]
	pub fn read<R>(buf: &mut R) -> Result<Light, WTImportError>
	where
		R: ReadBytesExt + Seek,
	{
		let name = buf.read_cstr()?;

		let value = buf.read_u16::<LE>()?;
		let light_type = match LightType::from_u16(value) {
			Some(t) => t,
			None => return Err(WTImportError::LightType {
				value: value,
				offset: offset_of(buf, 2),
			}),
		};

		Ok(Light {
			name: name,
			light_type: light_type,
			position: buf.read_vec3_le()?,
			matrix: Matrix3::read(buf)?,
			color: buf.read_vec3_le()?,
			unknown: buf.read_f32::<LE>()?,
			reference: read_reference(buf)?,
		})
	}

	#[cfg(feature = "export")]
	pub fn write<W>(&self, buf: &mut W) -> Result<(), WTExportError>
	where
		W: WriteBytesExt,
	{
		write_text(buf, &self.name, || format!("light '{}'.name", self.name))?;
		buf.write_u16::<LE>(self.light_type as u16)?;
		buf.write_vec3_le(self.position)?;
		self.matrix.write(buf)?;
		buf.write_vec3_le(self.color)?;
		buf.write_f32::<LE>(self.unknown)?;
		write_reference(buf, self.reference.as_deref(), || format!("light '{}'.reference", self.name))
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct Helper {
	pub name: String,
	pub position: Vec3,
	pub matrix: Matrix3,
	pub reference: Option<String>,
}

impl Helper {
	#[cfg(feature = "import")]
	pub fn read<R>(buf: &mut R) -> Result<Helper, WTImportError>
	where
		R: ReadBytesExt + Seek,
	{
		Ok(Helper {
			name: buf.read_cstr()?,
			position: buf.read_vec3_le()?,
			matrix: Matrix3::read(buf)?,
			reference: read_reference(buf)?,
		})
	}

	#[cfg(feature = "export")]
	pub fn write<W>(&self, buf: &mut W) -> Result<(), WTExportError>
	where
		W: WriteBytesExt,
	{
		write_text(buf, &self.name, || format!("helper '{}'.name", self.name))?;
		buf.write_vec3_le(self.position)?;
		self.matrix.write(buf)?;
		write_reference(buf, self.reference.as_deref(), || format!("helper '{}'.reference", self.name))
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubSpline {
	pub closed: bool,
	pub points: Vec<Vec3>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Spline {
	pub name: String,
	pub position: Vec3,
	pub subsplines: Vec<SubSpline>,
	pub reference: Option<String>,
}

impl Spline {
	#[cfg(feature = "import")]
	pub fn read<R>(buf: &mut R) -> Result<Spline, WTImportError>
	where
		R: ReadBytesExt + Seek,
	{
		let name = buf.read_cstr()?;
		let position = buf.read_vec3_le()?;

		let count = buf.read_u16::<LE>()?;
		let mut subsplines = vec![];
		for _ in 0..count {
			let points = buf.read_u16::<LE>()?;
			let closed = read_bool8(buf)?;

			let mut sub = SubSpline {
				closed: closed,
				points: vec![],
			};
			for _ in 0..points {
				sub.points.push(buf.read_vec3_le()?);
			}
			subsplines.push(sub);
		}

		Ok(Spline {
			name: name,
			position: position,
			subsplines: subsplines,
			reference: read_reference(buf)?,
		})
	}

	#[cfg(feature = "export")]
	pub fn write<W>(&self, buf: &mut W) -> Result<(), WTExportError>
	where
		W: WriteBytesExt,
	{
		write_text(buf, &self.name, || format!("spline '{}'.name", self.name))?;
		buf.write_vec3_le(self.position)?;

		write_count16(buf, self.subsplines.len(), || format!("spline '{}'.subsplines", self.name))?;
		for (i, sub) in self.subsplines.iter().enumerate() {
			write_count16(buf, sub.points.len(), || format!("spline '{}'.subspline {}.points", self.name, i))?;
			buf.write_u8(sub.closed as u8)?;
			for p in sub.points.iter() {
				buf.write_vec3_le(*p)?;
			}
		}

		write_reference(buf, self.reference.as_deref(), || format!("spline '{}'.reference", self.name))
	}
}
