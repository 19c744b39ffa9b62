//! Building blocks shared by all three containers

use byteorder::{
	LE,
	ReadBytesExt,
	WriteBytesExt
};

use std::{
	f64::consts::TAU,
	io::{
		Seek,
		SeekFrom
	}
};

use ultraviolet::vec::Vec3;

use rgk_core::{
	io_ext::{
		ReadBinExt,
		WriteBinExt
	},
	rtag4
};

#[cfg(feature = "export")]
use crate::export::WTExportError;
#[cfg(feature = "import")]
use crate::import::WTImportError;

/// Version float opening every MDL/SCN body
pub const MODEL_VERSION: f32 = 1.0;
/// Where the version float sits when a scene header precedes it
pub const SCENE_MARKER_OFFSET: u64 = 24;
/// Floats in the scene header block
pub const SCENE_HEADER_LEN: usize = 6;

pub const SKINNED_MAGIC: u32 = rtag4!(b"V2.0");
pub const ANIMATION_MAGIC: u32 = rtag4!(b"V1.0");

/// Divisor mapping quantized rotation components onto [-1, 1]
pub const ROTATION_SCALE: f32 = 32767.0;

pub const RAD_TO_DEG: f32 = 57.29578;
/// Degrees per quantization step of a packed normal angle (360 / 255)
pub const NORMAL_STEP_DEGREES: f32 = 1.411764752387544784530887019841;
/// Radians to normal angle steps (180 / pi * 255 / 360)
pub const NORMAL_ENCODE_SCALE: f64 = 57.29578 * 0.70833331;

pub const TEXTURE_SLOTS: usize = 7;
/// Width of the name field opening each skinned object
pub const OBJECT_NAME_LEN: usize = 64;

/// 16 bits per channel RGB color
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Color48 {
	pub red: u16,
	pub green: u16,
	pub blue: u16,
}

impl Color48 {
	pub fn new(red: u16, green: u16, blue: u16) -> Color48 {
		Color48 {
			red: red,
			green: green,
			blue: blue,
		}
	}

	#[cfg(feature = "import")]
	pub fn read<R>(buf: &mut R) -> Result<Color48, WTImportError>
	where
		R: ReadBytesExt,
	{
		Ok(Color48 {
			red: buf.read_u16::<LE>()?,
			green: buf.read_u16::<LE>()?,
			blue: buf.read_u16::<LE>()?,
		})
	}

	#[cfg(feature = "export")]
	pub fn write<W>(&self, buf: &mut W) -> Result<(), WTExportError>
	where
		W: WriteBytesExt,
	{
		buf.write_u16::<LE>(self.red)?;
		buf.write_u16::<LE>(self.green)?;
		buf.write_u16::<LE>(self.blue)?;

		Ok(())
	}
}

/// Row-major 3x3 matrix
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Matrix3 {
	pub rows: [Vec3; 3],
}

impl Matrix3 {
	pub fn identity() -> Matrix3 {
		Matrix3 {
			rows: [Vec3::unit_x(), Vec3::unit_y(), Vec3::unit_z()],
		}
	}

	/// Reads three rows of full precision floats
	#[cfg(feature = "import")]
	pub fn read<R>(buf: &mut R) -> Result<Matrix3, WTImportError>
	where
		R: ReadBytesExt,
	{
		Ok(Matrix3 {
			rows: [buf.read_vec3_le()?, buf.read_vec3_le()?, buf.read_vec3_le()?],
		})
	}

	/// Reads three rows of signed 16 bit components, as used by bones and animation tracks
	#[cfg(feature = "import")]
	pub fn read_quantized<R>(buf: &mut R) -> Result<Matrix3, WTImportError>
	where
		R: ReadBytesExt,
	{
		let mut rows = [Vec3::zero(); 3];
		for row in rows.iter_mut() {
			*row = Vec3::new(
				dequantize_rotation(buf.read_i16::<LE>()?),
				dequantize_rotation(buf.read_i16::<LE>()?),
				dequantize_rotation(buf.read_i16::<LE>()?)
			);
		}

		Ok(Matrix3 {
			rows: rows,
		})
	}

	#[cfg(feature = "export")]
	pub fn write<W>(&self, buf: &mut W) -> Result<(), WTExportError>
	where
		W: WriteBytesExt,
	{
		for row in self.rows.iter() {
			buf.write_vec3_le(*row)?;
		}

		Ok(())
	}

	#[cfg(feature = "export")]
	pub fn write_quantized<W>(&self, buf: &mut W) -> Result<(), WTExportError>
	where
		W: WriteBytesExt,
	{
		for row in self.rows.iter() {
			buf.write_i16::<LE>(quantize_rotation(row.x))?;
			buf.write_i16::<LE>(quantize_rotation(row.y))?;
			buf.write_i16::<LE>(quantize_rotation(row.z))?;
		}

		Ok(())
	}
}

pub fn dequantize_rotation(value: i16) -> f32 {
	f32::from(value) / ROTATION_SCALE
}

/// Rounds to the nearest step, clamping to [-1, 1] first
pub fn quantize_rotation(value: f32) -> i16 {
	(value.clamp(-1.0, 1.0) * ROTATION_SCALE).round() as i16
}

/// Normal packed into two angles of 256 steps each
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct PackedNormal {
	pub colatitude: u8,
	pub azimuth: u8,
}

impl PackedNormal {
	/// Packs `n` as (acos(z), atan2(y, x)). Negative azimuths wrap around to [180, 360).
	pub fn encode(n: Vec3) -> PackedNormal {
		let colatitude = f64::from(n.z).clamp(-1.0, 1.0).acos();
		let azimuth = f64::from(n.y).atan2(f64::from(n.x));

		PackedNormal {
			colatitude: quantize_angle(colatitude),
			azimuth: quantize_angle(azimuth),
		}
	}

	/// Unpacks into the renderer's Y-up frame: the colatitude axis becomes Y, so
	/// `decode(encode(v))` approximates `(v.x, v.z, v.y)`
	pub fn decode(self) -> Vec3 {
		let colatitude = f32::from(self.colatitude) * NORMAL_STEP_DEGREES / RAD_TO_DEG;
		let azimuth = f32::from(self.azimuth) * NORMAL_STEP_DEGREES / RAD_TO_DEG;
		let ring = colatitude.sin();

		Vec3::new(ring * azimuth.cos(), colatitude.cos(), ring * azimuth.sin())
	}

	#[cfg(feature = "import")]
	pub fn read<R>(buf: &mut R) -> Result<PackedNormal, WTImportError>
	where
		R: ReadBytesExt,
	{
		Ok(PackedNormal {
			colatitude: buf.read_u8()?,
			azimuth: buf.read_u8()?,
		})
	}

	#[cfg(feature = "export")]
	pub fn write<W>(&self, buf: &mut W) -> Result<(), WTExportError>
	where
		W: WriteBytesExt,
	{
		buf.write_u8(self.colatitude)?;
		buf.write_u8(self.azimuth)?;

		Ok(())
	}
}

fn quantize_angle(radians: f64) -> u8 {
	// a full turn is 255 steps, so wrap before quantizing rather than modulo 256 after
	(radians.rem_euclid(TAU) * NORMAL_ENCODE_SCALE).round() as u8
}

/// Position of a value of `width` bytes that has just been read
#[cfg(feature = "import")]
pub(crate) fn offset_of<S>(buf: &mut S, width: u64) -> u64
where
	S: Seek,
{
	buf.stream_position().map(|p| p.saturating_sub(width)).unwrap_or(0)
}

#[cfg(feature = "import")]
pub(crate) fn read_bool8<R>(buf: &mut R) -> Result<bool, WTImportError>
where
	R: ReadBytesExt + Seek,
{
	match buf.read_u8()? {
		0 => Ok(false),
		1 => Ok(true),
		v => Err(WTImportError::Flag {
			value: u32::from(v),
			offset: offset_of(buf, 1),
		}),
	}
}

#[cfg(feature = "import")]
pub(crate) fn read_bool16<R>(buf: &mut R) -> Result<bool, WTImportError>
where
	R: ReadBytesExt + Seek,
{
	match buf.read_u16::<LE>()? {
		0 => Ok(false),
		1 => Ok(true),
		v => Err(WTImportError::Flag {
			value: u32::from(v),
			offset: offset_of(buf, 2),
		}),
	}
}

#[cfg(feature = "import")]
pub(crate) fn read_bool32<R>(buf: &mut R) -> Result<bool, WTImportError>
where
	R: ReadBytesExt + Seek,
{
	match buf.read_u32::<LE>()? {
		0 => Ok(false),
		1 => Ok(true),
		v => Err(WTImportError::Flag {
			value: v,
			offset: offset_of(buf, 4),
		}),
	}
}

/// Checks a container's 4 byte magic and the null byte after it, then skips 4 bytes of padding
#[cfg(feature = "import")]
pub(crate) fn read_magic<R>(buf: &mut R, expected: u32) -> Result<(), WTImportError>
where
	R: ReadBytesExt + Seek,
{
	let found = buf.read_u32::<LE>()?;
	if found != expected {
		return Err(WTImportError::Magic {
			expected: expected,
			found: found,
			offset: offset_of(buf, 4),
		});
	}

	let terminator = buf.read_u8()?;
	if terminator != 0 {
		return Err(WTImportError::Terminator {
			value: terminator,
			offset: offset_of(buf, 1),
		});
	}

	let mut padding = [0; 4];
	buf.read_exact(&mut padding)?;

	Ok(())
}

/// Fails if anything is left after the last record. Leaves the stream where it was.
#[cfg(feature = "import")]
pub(crate) fn read_end<S>(buf: &mut S) -> Result<(), WTImportError>
where
	S: Seek,
{
	let offset = buf.stream_position()?;
	let end = buf.seek(SeekFrom::End(0))?;
	buf.seek(SeekFrom::Start(offset))?;

	if end > offset {
		return Err(WTImportError::TrailingData {
			offset: offset,
			remaining: end - offset,
		});
	}

	Ok(())
}

/// Reads a signed 32 bit element count
#[cfg(feature = "import")]
pub(crate) fn read_count<R>(buf: &mut R) -> Result<usize, WTImportError>
where
	R: ReadBytesExt + Seek,
{
	let count = buf.read_i32::<LE>()?;
	if count < 0 {
		return Err(WTImportError::Count {
			value: count,
			offset: offset_of(buf, 4),
		});
	}

	Ok(count as usize)
}

#[cfg(feature = "import")]
pub(crate) fn read_indices<R>(count: usize, buf: &mut R) -> Result<Vec<i32>, WTImportError>
where
	R: ReadBytesExt,
{
	let mut indices = vec![];
	for _ in 0..count {
		indices.push(buf.read_i32::<LE>()?);
	}

	Ok(indices)
}

/// Reads a string gated by a 16 bit presence flag
#[cfg(feature = "import")]
pub(crate) fn read_reference<R>(buf: &mut R) -> Result<Option<String>, WTImportError>
where
	R: ReadBytesExt + Seek,
{
	if read_bool16(buf)? {
		Ok(Some(buf.read_cstr()?))
	} else {
		Ok(None)
	}
}

#[cfg(feature = "export")]
pub(crate) fn write_text<W, F>(buf: &mut W, s: &str, path: F) -> Result<(), WTExportError>
where
	W: WriteBytesExt,
	F: FnOnce() -> String,
{
	if let Some(chr) = s.chars().find(|c| u32::from(*c) > 0xFF) {
		return Err(WTExportError::Text {
			path: path(),
			chr: chr,
		});
	}

	buf.write_cstr(s)?;
	Ok(())
}

#[cfg(feature = "export")]
pub(crate) fn write_reference<W, F>(buf: &mut W, reference: Option<&str>, path: F)
	-> Result<(), WTExportError>
where
	W: WriteBytesExt,
	F: FnOnce() -> String,
{
	match reference {
		Some(s) => {
			buf.write_u16::<LE>(1)?;
			write_text(buf, s, path)
		},
		None => {
			buf.write_u16::<LE>(0)?;
			Ok(())
		},
	}
}

#[cfg(feature = "export")]
pub(crate) fn write_count<W, F>(buf: &mut W, count: usize, path: F) -> Result<(), WTExportError>
where
	W: WriteBytesExt,
	F: FnOnce() -> String,
{
	match i32::try_from(count) {
		Ok(c) => Ok(buf.write_i32::<LE>(c)?),
		Err(_) => Err(WTExportError::Count {
			path: path(),
			count: count,
			limit: i32::MAX as usize,
		}),
	}
}

#[cfg(feature = "export")]
pub(crate) fn write_count16<W, F>(buf: &mut W, count: usize, path: F) -> Result<(), WTExportError>
where
	W: WriteBytesExt,
	F: FnOnce() -> String,
{
	match u16::try_from(count) {
		Ok(c) => Ok(buf.write_u16::<LE>(c)?),
		Err(_) => Err(WTExportError::Count {
			path: path(),
			count: count,
			limit: u16::MAX as usize,
		}),
	}
}

#[cfg(feature = "export")]
pub(crate) fn write_indices<W>(buf: &mut W, indices: &[i32]) -> Result<(), WTExportError>
where
	W: WriteBytesExt,
{
	for i in indices.iter() {
		buf.write_i32::<LE>(*i)?;
	}

	Ok(())
}
