//! Wavefront OBJ/MTL export of static models. Lights, helpers and vertex colors have no
//! OBJ counterpart and are left out.
//!
//! X is mirrored on the way out, and triangle winding is reversed to match.

use std::{
	fs::File,
	io::{
		BufWriter,
		Write
	},
	path::{
		Path,
		PathBuf
	}
};

use crate::{
	export::WTExportError,
	mesh::Mesh,
	model::Model
};

/// Texture slots written to the MTL file, with their keywords
const MTL_SLOTS: [(&str, usize); 3] = [("map_Kd", 0), ("map_d", 1), ("map_Ke", 3)];

#[derive(Clone, Debug)]
pub struct ObjExportCfg {
	/// Uniform scale applied to positions
	pub scale: f32,
	/// Join texture names onto `source_dir`
	pub absolute_paths: bool,
	pub source_dir: PathBuf,
	/// Only export meshes with a second UV channel, through that channel and the
	/// alternate submesh materials
	pub second_uv_only: bool,
}

impl Default for ObjExportCfg {
	fn default() -> ObjExportCfg {
		ObjExportCfg {
			scale: 0.01,
			absolute_paths: false,
			source_dir: PathBuf::new(),
			second_uv_only: false,
		}
	}
}

fn texture_path(cfg: &ObjExportCfg, name: &str) -> String {
	match cfg.absolute_paths {
		true => cfg.source_dir.join(name).display().to_string(),
		false => name.to_string(),
	}
}

/// Writes one `newmtl` block per material, in ascending ID order
pub fn write_mtl<W>(model: &Model, buf: &mut W, cfg: &ObjExportCfg) -> Result<(), WTExportError>
where
	W: Write,
{
	for m in model.materials.values() {
		writeln!(buf, "newmtl {}", m.name)?;

		for (keyword, slot) in MTL_SLOTS.iter() {
			let id = m.texture_slots[*slot];
			if id < 0 {
				continue;
			}

			match model.textures.get(&id) {
				Some(name) => writeln!(buf, "{} {}", keyword, texture_path(cfg, name))?,
				None => log::warn!("material {} '{}': slot {} refers to missing texture {}", m.id, m.name, slot, id),
			}
		}

		writeln!(buf)?;
	}

	Ok(())
}

/// Running totals of the elements written so far; OBJ indices are global and 1-based
#[derive(Default)]
struct Offsets {
	vertices: i64,
	uvs: i64,
	normals: i64,
}

/// Looks up an entry of an index stream, reporting failures against `path`
pub(crate) fn stream_entry<F>(stream: &[i32], index: i32, path: F) -> Result<i64, WTExportError>
where
	F: FnOnce() -> String,
{
	usize::try_from(index).ok()
		.and_then(|i| stream.get(i))
		.map(|v| i64::from(*v))
		.ok_or_else(|| WTExportError::Index {
			path: path(),
			index: i64::from(index),
		})
}

fn write_mesh<W>(model: &Model, index: usize, mesh: &Mesh, buf: &mut W, offsets: &mut Offsets, cfg: &ObjExportCfg)
	-> Result<(), WTExportError>
where
	W: Write,
{
	let s = cfg.scale;
	let p = mesh.position * s;

	for v in mesh.vertices.iter() {
		let v = *v * s;
		writeln!(buf, "v {} {} {}", -(v.x + p.x), v.y + p.y, v.z + p.z)?;
	}

	if let Some(uvs) = &mesh.uvs {
		for uv in uvs.values.iter() {
			writeln!(buf, "vt {} {}", uv.x, uv.y)?;
		}
	}

	let normals = mesh.normals.as_ref().map(|n| n.vectors()).unwrap_or_default();
	for n in normals.iter() {
		writeln!(buf, "vn {} {} {}", -n.x, n.y, n.z)?;
	}

	writeln!(buf, "o Submesh{}", index)?;

	let uv_stream = mesh.uvs.as_ref().map(|uvs| match cfg.second_uv_only {
		true => &uvs.second_indices,
		false => &uvs.indices,
	});

	for (i, submesh) in mesh.submeshes.iter().enumerate() {
		let path = || format!("mesh {}.submesh {}.indices", index, i);

		let material = match cfg.second_uv_only {
			true => submesh.alt_material,
			false => submesh.material,
		};
		let name = match model.materials.get(&i32::from(material)) {
			Some(m) if material >= 0 => m.name.as_str(),
			_ => {
				if material >= 0 {
					log::warn!("mesh {}, submesh {}: missing material {}", index, i, material);
				}
				"nomaterial"
			},
		};
		writeln!(buf, "usemtl {}", name)?;

		let corner = |k: i32| -> Result<String, WTExportError> {
			let mut out = format!("{}", stream_entry(&mesh.position_indices, k, path)? + 1 + offsets.vertices);

			match uv_stream {
				Some(stream) => out.push_str(&format!("/{}", stream_entry(stream, k, path)? + 1 + offsets.uvs)),
				None => out.push('/'),
			}
			if let Some(n) = &mesh.normals {
				out.push_str(&format!("/{}", stream_entry(&n.indices, k, path)? + 1 + offsets.normals));
			}

			Ok(out)
		};

		for tri in submesh.indices.chunks_exact(3) {
			writeln!(buf, "f {} {} {}", corner(tri[2])?, corner(tri[1])?, corner(tri[0])?)?;
		}
	}

	offsets.vertices += mesh.vertices.len() as i64;
	offsets.uvs += mesh.uvs.as_ref().map(|uvs| uvs.values.len()).unwrap_or(0) as i64;
	offsets.normals += normals.len() as i64;

	Ok(())
}

/// Writes the geometry. `mtllib` names the companion MTL file.
pub fn write_obj<W>(model: &Model, buf: &mut W, mtllib: &str, cfg: &ObjExportCfg) -> Result<(), WTExportError>
where
	W: Write,
{
	writeln!(buf, "mtllib {}", mtllib)?;

	let mut offsets = Offsets::default();
	for (i, mesh) in model.meshes.iter().enumerate() {
		if cfg.second_uv_only && !mesh.second_uv_channel {
			log::debug!("mesh {}: no second UV channel, skipped", i);
			continue;
		}

		write_mesh(model, i, mesh, buf, &mut offsets, cfg)?;
	}

	let s = cfg.scale;
	for spline in model.splines.iter() {
		writeln!(buf, "o {}", spline.name)?;

		let origin = spline.position;
		for sub in spline.subsplines.iter() {
			for p in sub.points.iter() {
				writeln!(buf, "v {} {} {}",
					p.x * -s + origin.x * -s, p.y * s + origin.y * s, p.z * s + origin.z * s)?;
			}

			let first = offsets.vertices + 1;
			for i in 1..sub.points.len() as i64 {
				writeln!(buf, "l {} {}", first + i - 1, first + i)?;
			}
			if sub.closed {
				writeln!(buf, "l {} {}", first, first + sub.points.len() as i64 - 1)?;
			}

			offsets.vertices += sub.points.len() as i64;
		}
	}

	Ok(())
}

/// Writes `path` and an MTL file next to it, sharing its stem
pub fn export<P>(model: &Model, path: P, cfg: &ObjExportCfg) -> Result<(), WTExportError>
where
	P: AsRef<Path>,
{
	let path = path.as_ref();
	let mtl_path = path.with_extension("mtl");
	let mtllib = mtl_path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();

	let mut obj = BufWriter::new(File::create(path)?);
	write_obj(model, &mut obj, &mtllib, cfg)?;
	obj.flush()?;

	let mut mtl = BufWriter::new(File::create(&mtl_path)?);
	write_mtl(model, &mut mtl, cfg)?;
	mtl.flush()?;

	log::debug!("wrote {} and {}", path.display(), mtl_path.display());
	Ok(())
}

#[cfg(test)]
mod tests {
	use ultraviolet::vec::{
		Vec2,
		Vec3
	};

	use super::*;

	use crate::{
		material::Material,
		mesh::{
			NormalStream,
			Spline,
			SubSpline,
			Submesh,
			UvChannels
		}
	};

	fn sample() -> Model {
		let mut model = Model::default();
		model.textures.insert(1, "wood.bmp".to_string());

		let mut wood = Material::new(3, "Wood");
		wood.texture_slots[0] = 1;
		wood.texture_slots[1] = 9;
		model.materials.insert(3, wood);

		model.meshes.push(Mesh {
			position: Vec3::new(1.0, 0.0, 0.0),
			second_uv_channel: true,
			position_indices: vec![0, 1, 2],
			vertices: vec![Vec3::zero(), Vec3::unit_x(), Vec3::unit_z()],
			uvs: Some(UvChannels {
				indices: vec![0, 1, 2],
				second_indices: vec![2, 2, 2],
				values: vec![Vec2::zero(), Vec2::unit_x(), Vec2::unit_y()],
			}),
			normals: None,
			colors: vec![],
			submeshes: vec![
				Submesh { material: 3, alt_material: 3, indices: vec![0, 1, 2] },
				Submesh { material: 7, alt_material: 3, indices: vec![2, 1, 0] },
			],
		});
		model.meshes.push(Mesh {
			position_indices: vec![0, 1, 2],
			vertices: vec![Vec3::unit_x(), Vec3::new(2.0, 0.0, 0.0), Vec3::one()],
			submeshes: vec![Submesh { material: -1, alt_material: 0, indices: vec![0, 1, 2] }],
			..Mesh::default()
		});

		model.splines.push(Spline {
			name: "rail".to_string(),
			position: Vec3::unit_x(),
			subsplines: vec![SubSpline {
				closed: true,
				points: vec![Vec3::zero(), Vec3::unit_x(), Vec3::new(1.0, 0.0, 1.0)],
			}],
			reference: None,
		});

		model.into_scene()
	}

	fn cfg() -> ObjExportCfg {
		ObjExportCfg {
			scale: 2.0,
			..ObjExportCfg::default()
		}
	}

	fn obj_text(model: &Model, cfg: &ObjExportCfg) -> String {
		let mut out: Vec<u8> = vec![];
		write_obj(model, &mut out, "scene.mtl", cfg).unwrap();
		String::from_utf8(out).unwrap()
	}

	#[test]
	fn test_obj() {
		let expected = "\
mtllib scene.mtl
v -2 0 0
v -4 0 0
v -2 0 2
vt 0 0
vt 1 0
vt 0 1
o Submesh0
usemtl Wood
f 3/3 2/2 1/1
usemtl nomaterial
f 1/1 2/2 3/3
v -2 0 0
v -4 0 0
v -2 2 2
o Submesh1
usemtl nomaterial
f 6/ 5/ 4/
o rail
v -2 0 0
v -4 0 0
v -4 0 2
l 7 8
l 8 9
l 7 9
";
		assert_eq!(expected, obj_text(&sample(), &cfg()));
	}

	#[test]
	fn test_second_uv_only() {
		let cfg = ObjExportCfg {
			second_uv_only: true,
			..cfg()
		};
		let text = obj_text(&sample(), &cfg);

		assert!(!text.contains("o Submesh1"));
		assert!(!text.contains("nomaterial"));
		assert_eq!(2, text.matches("usemtl Wood").count());
		assert!(text.contains("f 3/3 2/3 1/3\n"));
		// the spline follows the only exported mesh
		assert!(text.contains("l 4 5\n"));
	}

	#[test]
	fn test_normals() {
		let mut model = sample();
		model.meshes.truncate(1);
		model.splines.clear();
		model.meshes[0].normals = Some(NormalStream::from_vectors(vec![0, 0, 1], &[Vec3::unit_z(), Vec3::unit_x()]));

		let text = obj_text(&model, &cfg());
		assert!(text.contains("f 3/3/2 2/2/1 1/1/1\n"));

		let vn: Vec<Vec<f32>> = text.lines()
			.filter(|l| l.starts_with("vn "))
			.map(|l| l[3..].split(' ').map(|v| v.parse().unwrap()).collect())
			.collect();
		assert_eq!(2, vn.len());
		// packed (0, 0) unpacks to +Y
		assert_eq!(vec![0.0, 1.0, 0.0], vn[0]);
		// +X unpacks near +X, mirrored
		assert!((vn[1][0] + 1.0).abs() < 0.01);
	}

	#[test]
	fn test_mtl() {
		let mut out: Vec<u8> = vec![];
		write_mtl(&sample(), &mut out, &cfg()).unwrap();
		assert_eq!("newmtl Wood\nmap_Kd wood.bmp\n\n", String::from_utf8(out).unwrap());

		let cfg = ObjExportCfg {
			absolute_paths: true,
			source_dir: PathBuf::from("assets"),
			..cfg()
		};
		let mut out: Vec<u8> = vec![];
		write_mtl(&sample(), &mut out, &cfg).unwrap();
		let expected = format!("map_Kd {}\n", Path::new("assets").join("wood.bmp").display());
		assert!(String::from_utf8(out).unwrap().contains(&expected));
	}

	#[test]
	fn test_bad_index() {
		let mut model = sample();
		model.meshes[0].submeshes[0].indices = vec![0, 1, 5];

		let mut out: Vec<u8> = vec![];
		match write_obj(&model, &mut out, "x.mtl", &cfg()) {
			Err(WTExportError::Index { path, index: 5 }) => assert_eq!("mesh 0.submesh 0.indices", path),
			r => panic!("unexpected {:?}", r),
		}
	}
}
