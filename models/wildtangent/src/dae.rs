//! COLLADA 1.4.1 export of static models and scenes. Unlike OBJ, this keeps object transforms,
//! lights, helpers, vertex colors and the second UV channel. Splines are left out.
//!
//! Geometry is written in model space; each node's matrix carries the position, the scale and
//! the mirrored X axis.

use std::{
	collections::BTreeSet,
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

use ultraviolet::vec::Vec3;

use xml::writer::{
	EmitterConfig,
	EventWriter,
	XmlEvent
};

use crate::{
	export::WTExportError,
	material::{
		Material,
		TextureSlot
	},
	mesh::{
		LightType,
		Mesh
	},
	model::Model,
	obj::stream_entry,
	primitives::Matrix3
};

const COLLADA_NS: &str = "http://www.collada.org/2005/11/COLLADASchema";
const COLLADA_VERSION: &str = "1.4.1";

/// Vertex colors are stored on a 0-255 scale
const COLOR_SCALE: f32 = 255.0;

#[derive(Clone, Debug)]
pub struct DaeExportCfg {
	/// Uniform scale applied through the node matrices. X is additionally mirrored.
	pub scale: f32,
	/// Reference images by `file:///` URIs under `source_dir`
	pub absolute_paths: bool,
	pub source_dir: PathBuf,
}

impl Default for DaeExportCfg {
	fn default() -> DaeExportCfg {
		DaeExportCfg {
			scale: 0.01,
			absolute_paths: false,
			source_dir: PathBuf::new(),
		}
	}
}

impl DaeExportCfg {
	fn axis_scale(&self) -> Vec3 {
		Vec3::new(-self.scale, self.scale, self.scale)
	}
}

/// Turns a name into an XML ID: anything but ASCII letters, digits and `-` becomes `_`
pub fn clean_id(name: &str) -> String {
	name.chars()
		.map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
		.collect()
}

fn float_list<I>(values: I) -> String
where
	I: IntoIterator<Item = f32>,
{
	values.into_iter().map(|v| v.to_string()).collect::<Vec<String>>().join(" ")
}

fn start<W>(xml: &mut EventWriter<W>, name: &str, attrs: &[(&str, &str)]) -> Result<(), WTExportError>
where
	W: Write,
{
	let mut element = XmlEvent::start_element(name);
	for (key, value) in attrs.iter() {
		element = element.attr(*key, value);
	}

	xml.write(element)?;
	Ok(())
}

fn end<W>(xml: &mut EventWriter<W>) -> Result<(), WTExportError>
where
	W: Write,
{
	xml.write(XmlEvent::end_element())?;
	Ok(())
}

/// An element holding only text
fn leaf<W>(xml: &mut EventWriter<W>, name: &str, attrs: &[(&str, &str)], text: &str) -> Result<(), WTExportError>
where
	W: Write,
{
	start(xml, name, attrs)?;
	xml.write(XmlEvent::characters(text))?;
	end(xml)
}

fn empty<W>(xml: &mut EventWriter<W>, name: &str, attrs: &[(&str, &str)]) -> Result<(), WTExportError>
where
	W: Write,
{
	start(xml, name, attrs)?;
	end(xml)
}

/// A `<source>` of `stride` floats per element, one `param` per entry of `params`
fn source<W>(xml: &mut EventWriter<W>, id: &str, name: Option<&str>, params: &[&str], values: &[f32])
	-> Result<(), WTExportError>
where
	W: Write,
{
	let array_id = format!("{}-array", id);
	let count = (values.len() / params.len()).to_string();
	let stride = params.len().to_string();

	match name {
		Some(name) => start(xml, "source", &[("id", id), ("name", name)])?,
		None => start(xml, "source", &[("id", id)])?,
	}
	leaf(xml, "float_array", &[("id", &array_id), ("count", &values.len().to_string())],
		&float_list(values.iter().copied()))?;

	start(xml, "technique_common", &[])?;
	start(xml, "accessor", &[("source", &format!("#{}", array_id)), ("count", &count), ("stride", &stride)])?;
	for p in params.iter() {
		empty(xml, "param", &[("name", *p), ("type", "float")])?;
	}
	end(xml)?;
	end(xml)?;

	end(xml)
}

/// Row-major 4x4 transform: `matrix` scaled along its diagonal, then translated
fn node_matrix(matrix: &Matrix3, position: Vec3, scale: Vec3) -> String {
	let r = &matrix.rows;
	float_list([
		r[0].x * scale.x, r[0].y, r[0].z, position.x * scale.x,
		r[1].x, r[1].y * scale.y, r[1].z, position.y * scale.y,
		r[2].x, r[2].y, r[2].z * scale.z, position.z * scale.z,
		0.0, 0.0, 0.0, 1.0,
	])
}

/// The submesh's material, when it is assigned and exists
fn submesh_material(model: &Model, material: i16) -> Option<&Material> {
	match material >= 0 {
		true => model.materials.get(&i32::from(material)),
		false => None,
	}
}

fn image_path(cfg: &DaeExportCfg, name: &str) -> String {
	match cfg.absolute_paths {
		true => {
			let full = cfg.source_dir.join(name).display().to_string().replace('\\', "/").replace(' ', "%20");
			format!("file:///{}", full.trim_start_matches('/'))
		},
		false => name.to_string(),
	}
}

fn write_effects<W>(xml: &mut EventWriter<W>, model: &Model) -> Result<(), WTExportError>
where
	W: Write,
{
	start(xml, "library_effects", &[])?;

	for m in model.materials.values() {
		start(xml, "effect", &[("id", &format!("{}-effect", clean_id(&m.name)))])?;
		start(xml, "profile_COMMON", &[])?;

		let mut declared = BTreeSet::new();
		for (_, _, texture) in m.slot_names(&model.textures) {
			let texture = match texture {
				Some(t) => clean_id(t),
				None => continue,
			};
			if !declared.insert(texture.clone()) {
				continue;
			}

			start(xml, "newparam", &[("sid", &format!("{}-surface", texture))])?;
			start(xml, "surface", &[("type", "2D")])?;
			leaf(xml, "init_from", &[], &texture)?;
			end(xml)?;
			end(xml)?;

			start(xml, "newparam", &[("sid", &format!("{}-sampler", texture))])?;
			start(xml, "sampler2D", &[])?;
			leaf(xml, "source", &[], &format!("{}-surface", texture))?;
			end(xml)?;
			end(xml)?;
		}

		start(xml, "technique", &[("sid", "common")])?;
		start(xml, "lambert", &[])?;

		let channels = [
			("diffuse", TextureSlot::Diffuse, Some("1 1 1 1")),
			("reflective", TextureSlot::Reflective, None),
			("emission", TextureSlot::Emissive, None),
		];
		for &(sid, slot, fallback) in channels.iter() {
			match (m.texture(slot, &model.textures), fallback) {
				(Some(texture), _) => {
					start(xml, sid, &[])?;
					empty(xml, "texture", &[
						("texture", &format!("{}-sampler", clean_id(texture))),
						("texcoord", "UVMap"),
					])?;
					end(xml)?;
				},
				(None, Some(color)) => {
					start(xml, sid, &[])?;
					leaf(xml, "color", &[("sid", sid)], color)?;
					end(xml)?;
				},
				(None, None) => (),
			}
		}

		start(xml, "index_of_refraction", &[])?;
		leaf(xml, "float", &[("sid", "ior")], "1.45")?;
		end(xml)?;

		end(xml)?;
		end(xml)?;
		end(xml)?;
		end(xml)?;
	}

	end(xml)
}

fn write_materials<W>(xml: &mut EventWriter<W>, model: &Model) -> Result<(), WTExportError>
where
	W: Write,
{
	start(xml, "library_materials", &[])?;
	for m in model.materials.values() {
		let id = clean_id(&m.name);
		start(xml, "material", &[("id", &format!("{}-material", id)), ("name", &m.name)])?;
		empty(xml, "instance_effect", &[("url", &format!("#{}-effect", id))])?;
		end(xml)?;
	}
	end(xml)
}

fn write_images<W>(xml: &mut EventWriter<W>, model: &Model, cfg: &DaeExportCfg) -> Result<(), WTExportError>
where
	W: Write,
{
	if model.textures.is_empty() {
		return Ok(());
	}

	start(xml, "library_images", &[])?;
	for name in model.textures.values() {
		let id = clean_id(name);
		start(xml, "image", &[("id", &id), ("name", &id)])?;
		leaf(xml, "init_from", &[], &image_path(cfg, name))?;
		end(xml)?;
	}
	end(xml)
}

fn write_lights<W>(xml: &mut EventWriter<W>, model: &Model) -> Result<(), WTExportError>
where
	W: Write,
{
	if model.lights.is_empty() {
		return Ok(());
	}

	start(xml, "library_lights", &[])?;
	for light in model.lights.iter() {
		let kind = match light.light_type {
			LightType::Directional => "directional",
			LightType::Spot => "spot",
			LightType::Omni => "point",
			t => {
				log::warn!("light '{}': no COLLADA counterpart for {:?}, written as a point light", light.name, t);
				"point"
			},
		};

		start(xml, "light", &[("id", &format!("{}-light", clean_id(&light.name))), ("name", &light.name)])?;
		start(xml, "technique_common", &[])?;
		start(xml, kind, &[])?;
		leaf(xml, "color", &[("sid", "color")], &float_list([light.color.x, light.color.y, light.color.z]))?;
		end(xml)?;
		end(xml)?;
		end(xml)?;
	}
	end(xml)
}

fn write_geometry<W>(xml: &mut EventWriter<W>, model: &Model, index: usize, mesh: &Mesh) -> Result<(), WTExportError>
where
	W: Write,
{
	let name = format!("Submesh{}", index);
	let id = format!("{}-mesh", name);

	let normals = mesh.normals.as_ref().map(|n| n.vectors()).unwrap_or_default();
	let second = mesh.uses_second_channel(model.is_scene());
	let colored = !mesh.colors.is_empty();

	start(xml, "geometry", &[("id", &id), ("name", &name)])?;
	start(xml, "mesh", &[])?;

	let positions: Vec<f32> = mesh.vertices.iter().flat_map(|v| [v.x, v.y, v.z]).collect();
	source(xml, &format!("{}-positions", id), None, &["X", "Y", "Z"], &positions)?;

	if mesh.normals.is_some() {
		let values: Vec<f32> = normals.iter().flat_map(|n| [n.x, n.y, n.z]).collect();
		source(xml, &format!("{}-normals", id), None, &["X", "Y", "Z"], &values)?;
	}
	if let Some(uvs) = &mesh.uvs {
		let values: Vec<f32> = uvs.values.iter().flat_map(|uv| [uv.x, uv.y]).collect();
		source(xml, &format!("{}-map-0", id), None, &["S", "T"], &values)?;
		if second {
			// both channels share the coordinates, only the index streams differ
			source(xml, &format!("{}-map-1", id), None, &["S", "T"], &values)?;
		}
	}
	if colored {
		let values: Vec<f32> = mesh.colors.iter()
			.flat_map(|c| [c.red, c.green, c.blue])
			.map(|c| f32::from(c) / COLOR_SCALE)
			.collect();
		source(xml, &format!("{}-colors", id), Some("colors"), &["R", "G", "B"], &values)?;
	}

	start(xml, "vertices", &[("id", &format!("{}-vertices", id))])?;
	empty(xml, "input", &[("semantic", "POSITION"), ("source", &format!("#{}-positions", id))])?;
	end(xml)?;

	for (i, submesh) in mesh.submeshes.iter().enumerate() {
		let path = || format!("mesh {}.submesh {}.indices", index, i);

		let count = submesh.triangle_count().to_string();
		match submesh_material(model, submesh.material) {
			Some(m) => start(xml, "triangles", &[("material", &format!("{}-material", clean_id(&m.name))), ("count", &count)])?,
			None => start(xml, "triangles", &[("count", &count)])?,
		}

		let mut offset = 0;
		let mut input = |semantic: &str, source: String, set: Option<&str>| -> Result<(), WTExportError> {
			let source = format!("#{}", source);
			let at = offset.to_string();
			offset += 1;
			match set {
				Some(set) => empty(xml, "input", &[("semantic", semantic), ("source", &source), ("offset", &at), ("set", set)]),
				None => empty(xml, "input", &[("semantic", semantic), ("source", &source), ("offset", &at)]),
			}
		};

		input("VERTEX", format!("{}-vertices", id), None)?;
		if mesh.normals.is_some() {
			input("NORMAL", format!("{}-normals", id), None)?;
		}
		if mesh.uvs.is_some() {
			input("TEXCOORD", format!("{}-map-0", id), Some("0"))?;
			if second {
				input("TEXCOORD", format!("{}-map-1", id), Some("1"))?;
			}
		}
		if colored {
			input("COLOR", format!("{}-colors", id), Some("0"))?;
		}

		let mut p = vec![];
		for k in submesh.indices.iter().copied() {
			p.push(stream_entry(&mesh.position_indices, k, path)?);
			if let Some(n) = &mesh.normals {
				p.push(stream_entry(&n.indices, k, path)?);
			}
			if let Some(uvs) = &mesh.uvs {
				p.push(stream_entry(&uvs.indices, k, path)?);
				if second {
					p.push(stream_entry(&uvs.second_indices, k, path)?);
				}
			}
			if colored {
				// colors are dense, one per face-vertex
				p.push(i64::from(k));
			}
		}
		leaf(xml, "p", &[], &p.iter().map(|i| i.to_string()).collect::<Vec<String>>().join(" "))?;

		end(xml)?;
	}

	end(xml)?;
	end(xml)
}

fn write_scene<W>(xml: &mut EventWriter<W>, model: &Model, cfg: &DaeExportCfg) -> Result<(), WTExportError>
where
	W: Write,
{
	let scale = cfg.axis_scale();

	start(xml, "library_visual_scenes", &[])?;
	start(xml, "visual_scene", &[("id", "Scene"), ("name", "Scene")])?;

	for light in model.lights.iter() {
		let id = clean_id(&light.name);
		start(xml, "node", &[("id", &id), ("name", &light.name), ("type", "NODE")])?;
		leaf(xml, "matrix", &[("sid", "transform")], &node_matrix(&light.matrix, light.position, scale))?;
		empty(xml, "instance_light", &[("url", &format!("#{}-light", id))])?;
		end(xml)?;
	}

	for helper in model.helpers.iter() {
		start(xml, "node", &[("id", &clean_id(&helper.name)), ("name", &helper.name), ("type", "NODE")])?;
		leaf(xml, "matrix", &[("sid", "transform")], &node_matrix(&helper.matrix, helper.position, scale))?;
		end(xml)?;
	}

	for (i, mesh) in model.meshes.iter().enumerate() {
		let name = format!("Submesh{}", i);
		start(xml, "node", &[("id", &name), ("name", &name), ("type", "NODE")])?;
		leaf(xml, "matrix", &[("sid", "transform")], &node_matrix(&Matrix3::identity(), mesh.position, scale))?;

		start(xml, "instance_geometry", &[("url", &format!("#{}-mesh", name)), ("name", &name)])?;
		start(xml, "bind_material", &[])?;
		start(xml, "technique_common", &[])?;

		let mut bound = BTreeSet::new();
		for submesh in mesh.submeshes.iter() {
			let m = match submesh_material(model, submesh.material) {
				Some(m) => m,
				None => continue,
			};
			if !bound.insert(m.id) {
				continue;
			}

			let target = format!("{}-material", clean_id(&m.name));
			start(xml, "instance_material", &[("symbol", &target), ("target", &format!("#{}", target))])?;
			if mesh.uvs.is_some() {
				empty(xml, "bind_vertex_input", &[("semantic", "UVMap"), ("input_semantic", "TEXCOORD"), ("input_set", "0")])?;
				if mesh.uses_second_channel(model.is_scene()) {
					empty(xml, "bind_vertex_input", &[("semantic", "UVMap2"), ("input_semantic", "TEXCOORD"), ("input_set", "1")])?;
				}
			}
			end(xml)?;
		}

		end(xml)?;
		end(xml)?;
		end(xml)?;
		end(xml)?;
	}

	end(xml)?;
	end(xml)?;

	start(xml, "scene", &[])?;
	empty(xml, "instance_visual_scene", &[("url", "#Scene")])?;
	end(xml)
}

/// Writes the whole document
pub fn write_dae<W>(model: &Model, buf: &mut W, cfg: &DaeExportCfg) -> Result<(), WTExportError>
where
	W: Write,
{
	let mut xml = EmitterConfig::new()
		.perform_indent(true)
		.indent_string("\t")
		.create_writer(buf);

	xml.write(XmlEvent::start_element("COLLADA").default_ns(COLLADA_NS).attr("version", COLLADA_VERSION))?;

	start(&mut xml, "asset", &[])?;
	empty(&mut xml, "unit", &[("name", "meter"), ("meter", "1")])?;
	leaf(&mut xml, "up_axis", &[], "Y_UP")?;
	end(&mut xml)?;

	write_effects(&mut xml, model)?;
	write_materials(&mut xml, model)?;
	write_images(&mut xml, model, cfg)?;
	write_lights(&mut xml, model)?;

	start(&mut xml, "library_geometries", &[])?;
	for (i, mesh) in model.meshes.iter().enumerate() {
		log::trace!("mesh {}: {} submeshes", i, mesh.submeshes.len());
		write_geometry(&mut xml, model, i, mesh)?;
	}
	end(&mut xml)?;

	write_scene(&mut xml, model, cfg)?;

	end(&mut xml)
}

pub fn export<P>(model: &Model, path: P, cfg: &DaeExportCfg) -> Result<(), WTExportError>
where
	P: AsRef<Path>,
{
	let path = path.as_ref();

	let mut out = BufWriter::new(File::create(path)?);
	write_dae(model, &mut out, cfg)?;
	out.flush()?;

	log::debug!("wrote {}", path.display());
	Ok(())
}
