//! SMA animation tracks. Read-only.

use byteorder::{
	LE,
	ReadBytesExt
};

use std::{
	fs,
	io::{
		Cursor,
		Seek
	},
	path::Path
};

use ultraviolet::vec::Vec3;

use rgk_core::io_ext::ReadBinExt;

use crate::primitives::Matrix3;

#[cfg(feature = "import")]
use crate::{
	import::WTImportError,
	primitives::{
		ANIMATION_MAGIC,
		read_count,
		read_end,
		read_magic
	}
};

/// Keyframe of a tag or bone
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
	pub origin: Vec3,
	pub rotation: Matrix3,
}

impl Transform {
	#[cfg(feature = "import")]
	pub fn read<R>(buf: &mut R) -> Result<Transform, WTImportError>
	where
		R: ReadBytesExt,
	{
		Ok(Transform {
			origin: buf.read_vec3_le()?,
			rotation: Matrix3::read_quantized(buf)?,
		})
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Animation {
	/// Two header values of unknown purpose
	pub unknown: [i32; 2],
	pub tags: Vec<String>,
	/// Indexed `[tag][frame]`
	pub tag_transforms: Vec<Vec<Transform>>,
	/// One opaque value per frame
	pub frame_data: Vec<i32>,
	pub bones: Vec<String>,
	/// Indexed `[frame][bone]`
	pub frame_transforms: Vec<Vec<Transform>>,
}

impl Animation {
	pub fn frame_count(&self) -> usize {
		self.frame_data.len()
	}

	pub fn bone_transform(&self, frame: usize, bone: usize) -> Option<&Transform> {
		self.frame_transforms.get(frame).and_then(|f| f.get(bone))
	}

	#[cfg(feature = "import")]
	pub fn open<P>(path: P) -> Result<Animation, WTImportError>
	where
		P: AsRef<Path>,
	{
		let mut data = Cursor::new(fs::read(path)?);
		Animation::read(&mut data)
	}

	#[cfg(feature = "import")]
	pub fn read<R>(buf: &mut R) -> Result<Animation, WTImportError>
	where
		R: ReadBytesExt + Seek,
	{
		Animation::read_body(buf).map_err(|e| e.locate(buf))
	}

	#[cfg(feature = "import")]
	fn read_body<R>(buf: &mut R) -> Result<Animation, WTImportError>
	where
		R: ReadBytesExt + Seek,
	{
		read_magic(buf, ANIMATION_MAGIC)?;

		let unknown = [buf.read_i32::<LE>()?, buf.read_i32::<LE>()?];
		let tag_count = read_count(buf)?;
		let frame_count = read_count(buf)?;

		log::debug!("animation: {} tags, {} frames", tag_count, frame_count);

		let mut tags = vec![];
		for _ in 0..tag_count {
			tags.push(buf.read_cstr()?);
		}

		let mut tag_transforms = vec![];
		for _ in 0..tag_count {
			let mut track = vec![];
			for _ in 0..frame_count {
				track.push(Transform::read(buf)?);
			}
			tag_transforms.push(track);
		}

		let mut frame_data = vec![];
		for _ in 0..frame_count {
			frame_data.push(buf.read_i32::<LE>()?);
		}

		let bone_count = read_count(buf)?;
		let mut bones = vec![];
		for _ in 0..bone_count {
			bones.push(buf.read_cstr()?);
		}

		log::debug!("animation: {} bones", bone_count);

		let mut frame_transforms = vec![];
		for _ in 0..frame_count {
			let mut pose = vec![];
			for _ in 0..bone_count {
				pose.push(Transform::read(buf)?);
			}
			frame_transforms.push(pose);
		}

		read_end(buf)?;

		Ok(Animation {
			unknown: unknown,
			tags: tags,
			tag_transforms: tag_transforms,
			frame_data: frame_data,
			bones: bones,
			frame_transforms: frame_transforms,
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

	use ultraviolet::vec::Vec3;

	use super::*;

	fn transform(out: &mut Vec<u8>, x: f32) {
		for f in [x, 0.0, 0.0].iter() {
			out.write_f32::<LE>(*f).unwrap();
		}
		for v in [32767i16, 0, 0, 0, 0, -32767, 0, 32767, 0].iter() {
			out.write_i16::<LE>(*v).unwrap();
		}
	}

	/// One tag, three frames, two bones
	fn sample() -> Vec<u8> {
		let mut out: Vec<u8> = vec![];
		out.extend_from_slice(b"V1.0\x00\x00\x00\x00\x00");
		for v in [5, 6, 1, 3].iter() {
			out.write_i32::<LE>(*v).unwrap();
		}

		out.extend_from_slice(b"weapon\x00");
		for f in 0..3 {
			transform(&mut out, f as f32);
		}
		for v in [10, 20, 30].iter() {
			out.write_i32::<LE>(*v).unwrap();
		}

		out.write_i32::<LE>(2).unwrap();
		out.extend_from_slice(b"hip\x00leg\x00");
		for f in 0..3 {
			for b in 0..2 {
				transform(&mut out, (f * 10 + b) as f32);
			}
		}
		out
	}

	#[test]
	fn test_shape() {
		let anim = Animation::read(&mut Cursor::new(&sample())).unwrap();

		assert_eq!([5, 6], anim.unknown);
		assert_eq!(vec!["weapon".to_string()], anim.tags);
		assert_eq!(anim.tags.len(), anim.tag_transforms.len());
		assert!(anim.tag_transforms.iter().all(|t| t.len() == anim.frame_count()));

		assert_eq!(vec![10, 20, 30], anim.frame_data);
		assert_eq!(vec!["hip".to_string(), "leg".to_string()], anim.bones);
		assert_eq!(3, anim.frame_transforms.len());
		assert!(anim.frame_transforms.iter().all(|f| f.len() == anim.bones.len()));

		assert_eq!(Vec3::new(2.0, 0.0, 0.0), anim.tag_transforms[0][2].origin);
		let t = anim.bone_transform(2, 1).unwrap();
		assert_eq!(Vec3::new(21.0, 0.0, 0.0), t.origin);
		assert_eq!(Vec3::new(0.0, 0.0, -1.0), t.rotation.rows[1]);
		assert_eq!(None, anim.bone_transform(3, 0));
	}

	#[test]
	fn test_bad_magic() {
		let mut data = sample();
		data[0..4].copy_from_slice(b"V2.0");
		assert!(matches!(Animation::read(&mut Cursor::new(&data)),
			Err(WTImportError::Magic { expected: 0x302E3156, offset: 0, .. })));
	}

	#[test]
	fn test_trailing_bytes() {
		let mut data = sample();
		let len = data.len() as u64;
		data.extend_from_slice(&[0; 8]);

		match Animation::read(&mut Cursor::new(&data)) {
			Err(WTImportError::TrailingData { offset, remaining }) => {
				assert_eq!(len, offset);
				assert_eq!(8, remaining);
			},
			r => panic!("unexpected {:?}", r),
		}
	}

	#[test]
	fn test_truncated() {
		let data = sample();
		// inside the last bone transform
		let cut = &data[..data.len() - 7];
		match Animation::read(&mut Cursor::new(cut)) {
			Err(WTImportError::Truncated { offset }) => assert_eq!(cut.len() as u64, offset),
			r => panic!("unexpected {:?}", r),
		}

		// a bone count promising more poses than stored
		let mut data = sample();
		data[134..138].copy_from_slice(&3i32.to_le_bytes());
		assert!(matches!(Animation::read(&mut Cursor::new(&data)), Err(WTImportError::Truncated { .. })));
	}
}
