//! WildTangent Game Studios asset formats.
//!
//! Three unrelated little endian containers are supported:
//!
//! * MDL/SCN: static models and scenes ([`Model`]), readable and writable
//! * SMS: skinned characters ([`SkinnedModel`]), read-only
//! * SMA: skeletal animation tracks ([`Animation`]), read-only
//!
//! Models can be exported to Wavefront OBJ/MTL ([`obj`]) and COLLADA ([`dae`]).

pub mod anim;
#[cfg(feature = "export")]
pub mod dae;
pub mod material;
pub mod mesh;
pub mod model;
#[cfg(feature = "export")]
pub mod obj;
pub mod primitives;
pub mod skeleton;
pub mod skinned;
pub mod validate;

pub use anim::Animation;
pub use model::Model;
pub use skinned::SkinnedModel;

#[cfg(feature = "import")]
pub mod import {
	use std::io::{
		self,
		ErrorKind,
		Seek
	};

	use thiserror::Error;

	#[derive(Debug, Error)]
	pub enum WTImportError {
		#[error("Negative element count at offset {offset:#x}: {value}")]
		Count {
			value: i32,
			offset: u64,
		},
		#[error("Duplicate material ID: {0}")]
		DuplicateMaterial(i32),
		#[error("Duplicate texture ID: {0}")]
		DuplicateTexture(i32),
		#[error("Flag at offset {offset:#x} is neither 0 nor 1: {value}")]
		Flag {
			value: u32,
			offset: u64,
		},
		#[error("I/O error")]
		IO {
			#[from]
			source: io::Error,
		},
		#[error("Unknown light type at offset {offset:#x}: {value}")]
		LightType {
			value: u16,
			offset: u64,
		},
		#[error("Bad header magic at offset {offset:#x}: expected {expected:#010X}, got {found:#010X}")]
		Magic {
			expected: u32,
			found: u32,
			offset: u64,
		},
		#[error("Object name at offset {offset:#x} has no terminator within its 64 byte field")]
		ObjectName {
			offset: u64,
		},
		#[error("Header magic at offset {offset:#x} is followed by {value:#04X} instead of a null byte")]
		Terminator {
			value: u8,
			offset: u64,
		},
		#[error("Stream ends early at offset {offset:#x}")]
		Truncated {
			offset: u64,
		},
		#[error("{remaining} unread bytes after the last record, starting at offset {offset:#x}")]
		TrailingData {
			offset: u64,
			remaining: u64,
		},
		#[error("Expected version 1.0 at offset {offset:#x}, got {found}. Either not a MDL/SCN file, or wrong version")]
		Version {
			found: f32,
			offset: u64,
		},
	}

	impl WTImportError {
		/// Converts an early end of stream into [`WTImportError::Truncated`], tagged with the
		/// position the stream stopped at
		pub(crate) fn locate<S>(self, buf: &mut S) -> WTImportError
		where
			S: Seek,
		{
			match self {
				WTImportError::IO { source } if source.kind() == ErrorKind::UnexpectedEof => {
					WTImportError::Truncated {
						offset: buf.stream_position().unwrap_or(0),
					}
				},
				e => e,
			}
		}
	}
}

#[cfg(feature = "export")]
pub mod export {
	use std::io;
	use thiserror::Error;

	/// Encoding failure. `path` names the offending record and field, e.g. `mesh 2.uv indices`
	#[derive(Debug, Error)]
	pub enum WTExportError {
		#[error("{path}: {count} entries exceed the on-disk limit of {limit}")]
		Count {
			path: String,
			count: usize,
			limit: usize,
		},
		#[error("{path}: index {index} is out of range")]
		Index {
			path: String,
			index: i64,
		},
		#[error("I/O error")]
		IO {
			#[from]
			source: io::Error,
		},
		#[error("{path}: has {found} entries, expected {expected}")]
		StreamLength {
			path: String,
			expected: usize,
			found: usize,
		},
		#[error("{path}: stored under key {key}, but its own ID is {id}")]
		TableKey {
			path: String,
			key: i32,
			id: i32,
		},
		#[error("{path}: character {chr:?} does not fit in a single byte")]
		Text {
			path: String,
			chr: char,
		},
		#[error("{path}: {len} indices do not form whole triangles")]
		Triangles {
			path: String,
			len: usize,
		},
		#[error("XML output failed")]
		Xml {
			#[from]
			source: xml::writer::Error,
		},
	}
}
