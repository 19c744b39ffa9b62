use clap::{
	Parser,
	ValueEnum
};

use std::{
	fs,
	io,
	path::{
		Path,
		PathBuf
	},
	process::ExitCode
};

use thiserror::Error;

use rgk_models_wildtangent::{
	Animation,
	Model,
	SkinnedModel,
	export::WTExportError,
	import::WTImportError,
	dae::{
		self,
		DaeExportCfg
	},
	obj::{
		self,
		ObjExportCfg
	}
};

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
enum Format {
	/// COLLADA, keeping transforms, lights, helpers and vertex colors
	Dae,
	/// Wavefront OBJ/MTL
	Obj,
	/// Pretty-printed document
	Dump,
	/// Re-encoded as a model
	Mdl,
	/// Re-encoded as a scene
	Scn,
}

impl Format {
	fn extension(self) -> &'static str {
		match self {
			Format::Dae => "dae",
			Format::Obj => "obj",
			Format::Dump => "txt",
			Format::Mdl => "mdl",
			Format::Scn => "scn",
		}
	}
}

#[derive(Parser)]
#[command(name = "wt2obj")]
#[command(about = "Converter for WildTangent Game Studios MDL/SCN models, SMS skins and SMA animations")]
#[command(version)]
struct Cli {
	/// Input file (.mdl, .scn, .sms or .sma)
	input: PathBuf,

	/// Output format
	#[arg(short, long, value_enum, default_value_t = Format::Dae)]
	format: Format,

	/// Output file, defaults to the input's name in the working directory.
	/// Dumps are printed unless this is given.
	#[arg(short, long)]
	output: Option<PathBuf>,

	/// Export scale
	#[arg(short, long, default_value_t = 0.01)]
	scale: f32,

	/// Write texture paths joined onto the input's directory
	#[arg(long, visible_alias = "abspaths")]
	absolute_paths: bool,

	/// OBJ only: export meshes with a second UV channel, through that channel
	#[arg(long)]
	uv2: bool,
}

#[derive(Debug, Error)]
enum CliError {
	#[error("Export failed")]
	Export {
		#[from]
		source: WTExportError,
	},
	#[error("Import failed")]
	Import {
		#[from]
		source: WTImportError,
	},
	#[error("Cannot convert a {0} file to {1:?}, only dump is supported")]
	Unsupported(&'static str, Format),
	#[error("Unknown file extension: {0}")]
	Extension(String),
	#[error("Cannot write {}", .path.display())]
	Write {
		path: PathBuf,
		source: io::Error,
	},
}

#[derive(Debug)]
enum Document {
	Model(Model),
	Skinned(SkinnedModel),
	Animation(Animation),
}

fn load(path: &Path) -> Result<Document, CliError> {
	let ext = path.extension()
		.map(|e| e.to_string_lossy().to_ascii_lowercase())
		.unwrap_or_default();

	match ext.as_str() {
		"mdl" | "scn" => Ok(Document::Model(Model::open(path)?)),
		"sms" => Ok(Document::Skinned(SkinnedModel::open(path)?)),
		"sma" => Ok(Document::Animation(Animation::open(path)?)),
		_ => Err(CliError::Extension(ext)),
	}
}

fn list_materials(model: &Model) {
	for m in model.materials.values() {
		log::info!("material {} '{}'", m.id, m.name);
		for (slot, id, name) in m.slot_names(&model.textures) {
			if id >= 0 {
				log::info!("  slot {}: {} {}", slot, id, name.unwrap_or("(missing)"));
			}
		}
	}

	for e in model.validate() {
		log::warn!("{}", e);
	}
}

/// Pretty-prints the document to `output`, or to stdout
fn dump(document: &Document, output: Option<&Path>) -> Result<(), CliError> {
	let text = format!("{:#?}", document);

	match output {
		Some(path) => fs::write(path, text).map_err(|e| CliError::Write {
			path: path.to_path_buf(),
			source: e,
		}),
		None => {
			println!("{}", text);
			Ok(())
		},
	}
}

fn run(cli: Cli) -> Result<(), CliError> {
	let document = load(&cli.input)?;

	let model = match (document, cli.format) {
		(document, Format::Dump) => return dump(&document, cli.output.as_deref()),
		(Document::Model(m), _) => m,
		(Document::Skinned(_), f) => return Err(CliError::Unsupported("SMS", f)),
		(Document::Animation(_), f) => return Err(CliError::Unsupported("SMA", f)),
	};

	let output = cli.output.clone().unwrap_or_else(|| {
		let stem = cli.input.file_stem().map(PathBuf::from).unwrap_or_default();
		stem.with_extension(cli.format.extension())
	});

	list_materials(&model);
	log::info!("converting {} to {}", cli.input.display(), output.display());

	let source_dir = cli.input.parent().map(PathBuf::from).unwrap_or_default();
	match cli.format {
		Format::Dae => {
			let cfg = DaeExportCfg {
				scale: cli.scale,
				absolute_paths: cli.absolute_paths,
				source_dir: source_dir,
			};
			dae::export(&model, &output, &cfg)?;
		},
		Format::Obj => {
			let cfg = ObjExportCfg {
				scale: cli.scale,
				absolute_paths: cli.absolute_paths,
				source_dir: source_dir,
				second_uv_only: cli.uv2,
			};
			obj::export(&model, &output, &cfg)?;
		},
		Format::Mdl => model.into_model().save(&output)?,
		Format::Scn => model.into_scene().save(&output)?,
		Format::Dump => (),
	}

	Ok(())
}

fn main() -> ExitCode {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	match run(Cli::parse()) {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			let mut msg = e.to_string();
			let mut source = std::error::Error::source(&e);
			while let Some(s) = source {
				msg.push_str(&format!(": {}", s));
				source = s.source();
			}
			log::error!("{}", msg);
			ExitCode::FAILURE
		},
	}
}
