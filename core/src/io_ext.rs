use std::io::{
	Error,
	ErrorKind,
	Read,
	Result,
	Write
};

use ultraviolet::vec::{
	Vec2,
	Vec3
};

pub trait ReadBinExt: Read {
	/// Reads a null-terminated string
	#[inline]
	fn read_cstr(&mut self) -> Result<String> {
		let mut s = String::new();
		let mut buf = [1; 1];

		while buf[0] != 0 {
			self.read_exact(&mut buf)?;
			if buf[0] != 0 {
				s.push(buf[0] as char);
			}
		}

		Ok(s)
	}

	/// Reads a null-terminated string stored in a field of `len` bytes.
	/// Everything after the terminator is padding and gets discarded.
	fn read_fixed_cstr(&mut self, len: usize) -> Result<String> {
		let mut field = vec![0; len];
		self.read_exact(&mut field)?;

		match field.iter().position(|b| *b == 0) {
			Some(end) => Ok(field[..end].iter().map(|b| *b as char).collect()),
			None => Err(Error::new(ErrorKind::InvalidData,
				format!("no terminator within {} byte string field", len))),
		}
	}

	/// Reads a little endian 2D vector
	#[inline]
	fn read_vec2_le(&mut self) -> Result<Vec2> {
		let mut x = [0; 4];
		let mut y = x;

		self.read_exact(&mut x)?;
		self.read_exact(&mut y)?;

		Ok(Vec2::new(f32::from_le_bytes(x), f32::from_le_bytes(y)))
	}

	/// Reads a little endian 3D vector
	#[inline]
	fn read_vec3_le(&mut self) -> Result<Vec3> {
		let mut x = [0; 4];
		let mut y = x;
		let mut z = y;

		self.read_exact(&mut x)?;
		self.read_exact(&mut y)?;
		self.read_exact(&mut z)?;

		Ok(Vec3::new(f32::from_le_bytes(x), f32::from_le_bytes(y), f32::from_le_bytes(z)))
	}
}

impl<R> ReadBinExt for R
where
	R: Read + ?Sized,
{
}

pub trait WriteBinExt: Write {
	/// Writes a null-terminated string, one byte per character.
	/// Fails with [`ErrorKind::InvalidInput`] on characters above U+00FF.
	fn write_cstr(&mut self, s: &str) -> Result<()> {
		let mut bytes = Vec::with_capacity(s.len() + 1);

		for c in s.chars() {
			match u8::try_from(c) {
				Ok(b) => bytes.push(b),
				Err(_) => return Err(Error::new(ErrorKind::InvalidInput,
					format!("character {:?} does not fit in a single byte", c))),
			}
		}
		bytes.push(0);

		self.write_all(&bytes)
	}

	/// Writes a little endian 2D vector
	#[inline]
	fn write_vec2_le(&mut self, v: Vec2) -> Result<()> {
		self.write_all(&v.x.to_le_bytes())?;
		self.write_all(&v.y.to_le_bytes())
	}

	/// Writes a little endian 3D vector
	#[inline]
	fn write_vec3_le(&mut self, v: Vec3) -> Result<()> {
		self.write_all(&v.x.to_le_bytes())?;
		self.write_all(&v.y.to_le_bytes())?;
		self.write_all(&v.z.to_le_bytes())
	}
}

impl<W> WriteBinExt for W
where
	W: Write + ?Sized,
{
}
