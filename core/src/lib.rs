#[cfg(feature = "io_ext")]
pub mod io_ext;

/// Converts a 4-byte string into a 32-bit little endian integer.
/// Byte strings longer than 4 bytes are truncated.
#[macro_export]
macro_rules! rtag4 {
	($b4: literal) => {
		u32::from_le_bytes([$b4[0], $b4[1], $b4[2], $b4[3]])
	}
}

#[cfg(test)]
mod tests {
	#[test]
	fn test_rtag4() {
		assert_eq!(0x302E3256, rtag4!(b"V2.0"));
		assert_eq!(0x64636261, rtag4!(b"abcdef"));
	}
}
