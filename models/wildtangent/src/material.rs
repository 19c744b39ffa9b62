use bitflags::bitflags;

use byteorder::{
	LE,
	ReadBytesExt,
	WriteBytesExt
};

use std::{
	collections::BTreeMap,
	io::Seek
};

use rgk_core::io_ext::ReadBinExt;

use crate::primitives::{
	Color48,
	TEXTURE_SLOTS
};

#[cfg(feature = "export")]
use crate::{
	export::WTExportError,
	primitives::write_text
};

#[cfg(feature = "import")]
use crate::{
	import::WTImportError,
	primitives::read_bool32
};

/// Texture file names keyed by the IDs the asset pipeline assigned them
pub type TextureTable = BTreeMap<i32, String>;
pub type MaterialTable = BTreeMap<i32, Material>;

bitflags! {
	pub struct MaterialFlags: u8 {
		const DOUBLE_SIDED = 1;
		const COLLIDEABLE = 2;
		const VISIBLE = 4;
	}
}

/// Known meanings of the texture slots; slots 4 to 6 are unidentified
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(usize)]
pub enum TextureSlot {
	Diffuse = 0,
	Alpha,
	Reflective,
	/// Emissive, or possibly an additive blend
	Emissive,
}

/// Linear UV scrolling
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UvSpin {
	pub u: f32,
	pub v: f32,
}

/// Frequency based UV scrolling
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrequencySpin {
	pub horizontal: i16,
	pub vertical: i16,
	pub time: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
	pub name: String,
	pub id: i32,
	pub flags: MaterialFlags,
	pub data_id: i32,
	pub color_key: Option<Color48>,
	pub uv_spin: Option<UvSpin>,
	pub frequency_spin: Option<FrequencySpin>,
	pub uv_spin2: Option<UvSpin>,
	pub frequency_spin2: Option<FrequencySpin>,
	pub render_last: i32,
	pub render_first: i32,
	pub colors: [Color48; 4],
	pub unknown: [f32; 2],
	/// Texture IDs, -1 when unused
	pub texture_slots: [i32; TEXTURE_SLOTS],
}

impl Material {
	/// Creates a visible, untextured material
	pub fn new(id: i32, name: &str) -> Material {
		Material {
			name: name.to_string(),
			id: id,
			flags: MaterialFlags::VISIBLE,
			data_id: 0,
			color_key: None,
			uv_spin: None,
			frequency_spin: None,
			uv_spin2: None,
			frequency_spin2: None,
			render_last: 0,
			render_first: 0,
			colors: [Color48::default(); 4],
			unknown: [0.0; 2],
			texture_slots: [-1; TEXTURE_SLOTS],
		}
	}

	/// Looks up the file name bound to a known slot
	pub fn texture<'a>(&self, slot: TextureSlot, textures: &'a TextureTable) -> Option<&'a str> {
		let id = self.texture_slots[slot as usize];
		if id < 0 {
			return None;
		}

		textures.get(&id).map(|s| s.as_str())
	}

	/// Lists every slot as `(slot, texture ID, file name)`.
	/// The name is `None` for unused slots and for IDs missing from `textures`.
	pub fn slot_names<'a>(&self, textures: &'a TextureTable) -> Vec<(usize, i32, Option<&'a str>)> {
		self.texture_slots.iter().enumerate().map(|(slot, id)| {
			(slot, *id, textures.get(id).map(|s| s.as_str()))
		}).collect()
	}

	/// Path used to report encoding failures
	#[cfg(feature = "export")]
	fn path(&self, field: &str) -> String {
		format!("material {} '{}'.{}", self.id, self.name, field)
	}

	#[cfg(feature = "import")]
	pub fn read<R>(buf: &mut R) -> Result<Material, WTImportError>
	where
		R: ReadBytesExt + Seek,
	{
		let name = buf.read_cstr()?;
		let id = buf.read_i32::<LE>()?;

		let mut flags = MaterialFlags::empty();
		flags.set(MaterialFlags::DOUBLE_SIDED, read_bool32(buf)?);
		flags.set(MaterialFlags::COLLIDEABLE, read_bool32(buf)?);
		flags.set(MaterialFlags::VISIBLE, read_bool32(buf)?);

		let data_id = buf.read_i32::<LE>()?;

		let color_key = match read_bool32(buf)? {
			true => Some(Color48::read(buf)?),
			false => None,
		};
		let uv_spin = UvSpin::read_opt(buf)?;
		let frequency_spin = FrequencySpin::read_opt(buf)?;
		let uv_spin2 = UvSpin::read_opt(buf)?;
		let frequency_spin2 = FrequencySpin::read_opt(buf)?;

		let render_last = buf.read_i32::<LE>()?;
		let render_first = buf.read_i32::<LE>()?;

		let mut colors = [Color48::default(); 4];
		for c in colors.iter_mut() {
			*c = Color48::read(buf)?;
		}

		let unknown = [buf.read_f32::<LE>()?, buf.read_f32::<LE>()?];

		let mut slots = [-1; TEXTURE_SLOTS];
		for s in slots.iter_mut() {
			*s = buf.read_i32::<LE>()?;
		}

		log::trace!("material {} '{}', slots {:?}", id, name, slots);

		Ok(Material {
			name: name,
			id: id,
			flags: flags,
			data_id: data_id,
			color_key: color_key,
			uv_spin: uv_spin,
			frequency_spin: frequency_spin,
			uv_spin2: uv_spin2,
			frequency_spin2: frequency_spin2,
			render_last: render_last,
			render_first: render_first,
			colors: colors,
			unknown: unknown,
			texture_slots: slots,
		})
	}

	#[cfg(feature = "export")]
	pub fn write<W>(&self, buf: &mut W) -> Result<(), WTExportError>
	where
		W: WriteBytesExt,
	{
		write_text(buf, &self.name, || self.path("name"))?;
		buf.write_i32::<LE>(self.id)?;
		buf.write_u32::<LE>(self.flags.contains(MaterialFlags::DOUBLE_SIDED) as u32)?;
		buf.write_u32::<LE>(self.flags.contains(MaterialFlags::COLLIDEABLE) as u32)?;
		buf.write_u32::<LE>(self.flags.contains(MaterialFlags::VISIBLE) as u32)?;
		buf.write_i32::<LE>(self.data_id)?;

		buf.write_u32::<LE>(self.color_key.is_some() as u32)?;
		if let Some(key) = self.color_key {
			key.write(buf)?;
		}

		UvSpin::write_opt(self.uv_spin, buf)?;
		FrequencySpin::write_opt(self.frequency_spin, buf)?;
		UvSpin::write_opt(self.uv_spin2, buf)?;
		FrequencySpin::write_opt(self.frequency_spin2, buf)?;

		buf.write_i32::<LE>(self.render_last)?;
		buf.write_i32::<LE>(self.render_first)?;

		for c in self.colors.iter() {
			c.write(buf)?;
		}

		buf.write_f32::<LE>(self.unknown[0])?;
		buf.write_f32::<LE>(self.unknown[1])?;

		for s in self.texture_slots.iter() {
			buf.write_i32::<LE>(*s)?;
		}

		Ok(())
	}
}

impl UvSpin {
	#[cfg(feature = "import")]
	fn read_opt<R>(buf: &mut R) -> Result<Option<UvSpin>, WTImportError>
	where
		R: ReadBytesExt + Seek,
	{
		if !read_bool32(buf)? {
			return Ok(None);
		}

		Ok(Some(UvSpin {
			u: buf.read_f32::<LE>()?,
			v: buf.read_f32::<LE>()?,
		}))
	}

	#[cfg(feature = "export")]
	fn write_opt<W>(spin: Option<UvSpin>, buf: &mut W) -> Result<(), WTExportError>
	where
		W: WriteBytesExt,
	{
		buf.write_u32::<LE>(spin.is_some() as u32)?;
		if let Some(s) = spin {
			buf.write_f32::<LE>(s.u)?;
			buf.write_f32::<LE>(s.v)?;
		}

		Ok(())
	}
}

impl FrequencySpin {
	#[cfg(feature = "import")]
	fn read_opt<R>(buf: &mut R) -> Result<Option<FrequencySpin>, WTImportError>
	where
		R: ReadBytesExt + Seek,
	{
		if !read_bool32(buf)? {
			return Ok(None);
		}

		Ok(Some(FrequencySpin {
			horizontal: buf.read_i16::<LE>()?,
			vertical: buf.read_i16::<LE>()?,
			time: buf.read_f32::<LE>()?,
		}))
	}

	#[cfg(feature = "export")]
	fn write_opt<W>(spin: Option<FrequencySpin>, buf: &mut W) -> Result<(), WTExportError>
	where
		W: WriteBytesExt,
	{
		buf.write_u32::<LE>(spin.is_some() as u32)?;
		if let Some(s) = spin {
			buf.write_i16::<LE>(s.horizontal)?;
			buf.write_i16::<LE>(s.vertical)?;
			buf.write_f32::<LE>(s.time)?;
		}

		Ok(())
	}
}

/// Reads `count` (file name, ID) pairs
#[cfg(feature = "import")]
pub fn read_textures<R>(count: usize, buf: &mut R) -> Result<TextureTable, WTImportError>
where
	R: ReadBytesExt,
{
	let mut textures = TextureTable::new();
	for _ in 0..count {
		let name = buf.read_cstr()?;
		let id = buf.read_i32::<LE>()?;

		if textures.insert(id, name).is_some() {
			return Err(WTImportError::DuplicateTexture(id));
		}
	}

	Ok(textures)
}

#[cfg(feature = "import")]
pub fn read_materials<R>(count: usize, buf: &mut R) -> Result<MaterialTable, WTImportError>
where
	R: ReadBytesExt + Seek,
{
	let mut materials = MaterialTable::new();
	for _ in 0..count {
		let material = Material::read(buf)?;
		let id = material.id;

		if materials.insert(id, material).is_some() {
			return Err(WTImportError::DuplicateMaterial(id));
		}
	}

	Ok(materials)
}

/// Writes the table in ascending ID order
#[cfg(feature = "export")]
pub fn write_textures<W>(textures: &TextureTable, buf: &mut W) -> Result<(), WTExportError>
where
	W: WriteBytesExt,
{
	for (id, name) in textures.iter() {
		write_text(buf, name, || format!("texture {}.name", id))?;
		buf.write_i32::<LE>(*id)?;
	}

	Ok(())
}

/// Writes the table in ascending ID order. Each key must match its record's ID, since only
/// the ID is stored.
#[cfg(feature = "export")]
pub fn write_materials<W>(materials: &MaterialTable, buf: &mut W) -> Result<(), WTExportError>
where
	W: WriteBytesExt,
{
	for (key, material) in materials.iter() {
		if *key != material.id {
			return Err(WTExportError::TableKey {
				path: format!("material {} '{}'", material.id, material.name),
				key: *key,
				id: material.id,
			});
		}

		material.write(buf)?;
	}

	Ok(())
}
