use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::ParallelProgressIterator;
use rayon::prelude::*;
use rootcause::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use c2gview::data::text_blob;
use c2gview::data::wrappers::mmap::MmapFile;
use c2gview::data::{Base64Text, MeshSource, load_mesh};
use c2gview::export::gltf_export;
use c2gview::models::c2g::{DecodeOptions, Mesh, Revision};
use c2gview::models::writer;

/// Inspect, convert and export c2g mesh containers
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Header revision of the input files
    #[arg(long, value_enum, default_value_t = RevisionArg::C, global = true)]
    revision: RevisionArg,

    /// Inputs are base64 text blobs instead of raw binary
    #[arg(long, global = true)]
    base64: bool,

    /// Reject files with bytes after the index block
    #[arg(long, global = true)]
    strict: bool,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides this.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a header summary for each file
    Info {
        /// Files or glob patterns
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Print the header and the decoded arrays
    Dump {
        file: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Convert a binary file to a wrapped base64 text blob
    Encode {
        file: PathBuf,
        /// Defaults to the input path with `.txt` appended
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Convert a base64 text blob back to binary
    Decode {
        file: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Re-encode a revision A or B file as revision C
    Upgrade {
        file: PathBuf,
        #[arg(long, value_enum)]
        from: LegacyRevisionArg,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Export a mesh as glTF binary (.glb)
    Export {
        file: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RevisionArg {
    A,
    B,
    C,
}

impl From<RevisionArg> for Revision {
    fn from(value: RevisionArg) -> Self {
        match value {
            RevisionArg::A => Revision::Minimal,
            RevisionArg::B => Revision::Strided,
            RevisionArg::C => Revision::Extended,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LegacyRevisionArg {
    A,
    B,
}

impl From<LegacyRevisionArg> for Revision {
    fn from(value: LegacyRevisionArg) -> Self {
        match value {
            LegacyRevisionArg::A => Revision::Minimal,
            LegacyRevisionArg::B => Revision::Strided,
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("c2gview={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .compact()
        .init();
}

fn open_source(path: &Path, base64: bool) -> Result<Box<dyn MeshSource + Send + Sync>, Report> {
    if base64 {
        let text = fs::read_to_string(path)
            .context(format!("Failed to read text blob {}", path.display()))?;
        Ok(Box::new(Base64Text::new(text)))
    } else {
        let file =
            MmapFile::open(path).context(format!("Failed to open {}", path.display()))?;
        Ok(Box::new(file))
    }
}

fn load(path: &Path, base64: bool, options: &DecodeOptions) -> Result<Mesh, Report> {
    let source = open_source(path, base64)?;
    load_mesh(source.as_ref(), options)
}

/// Expand glob patterns. A pattern that matches nothing is kept as a literal
/// path so the user gets a "not found" error for it.
fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>, Report> {
    let mut paths = Vec::new();
    for pattern in patterns {
        let matches = glob::glob(pattern)
            .map_err(|e| rootcause::report!("Invalid glob pattern {pattern:?}: {e}"))?
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("Skipping unreadable path: {e}");
                    None
                }
            })
            .collect::<Vec<_>>();

        if matches.is_empty() {
            paths.push(PathBuf::from(pattern));
        } else {
            paths.extend(matches);
        }
    }
    Ok(paths)
}

fn summarize(path: &Path, mesh: &Mesh) -> String {
    let h = &mesh.header;
    let mut line = format!(
        "{}: revision {}, {} vertices ({} bytes each), {} {} indices ({} triangles)",
        path.display(),
        h.revision,
        h.num_vertices,
        h.vertex_size,
        h.num_indices,
        h.index_format(),
        h.triangle_count(),
    );
    if h.num_colors_per_vertex > 0 || h.num_tex_coords_per_vertex > 0 {
        line.push_str(&format!(
            ", {} color / {} texcoord components",
            h.num_colors_per_vertex, h.num_tex_coords_per_vertex
        ));
    }
    if let Some((min, max)) = mesh.bounds() {
        line.push_str(&format!(", bounds {min:?}..{max:?}"));
    }
    line
}

fn run_info(patterns: &[String], base64: bool, options: &DecodeOptions) -> Result<(), Report> {
    let paths = expand_patterns(patterns)?;

    let results = paths
        .par_iter()
        .progress_count(paths.len() as u64)
        .map(|path| (path, load(path, base64, options)))
        .collect::<Vec<_>>();

    let mut failed = 0usize;
    for (path, result) in results {
        match result {
            Ok(mesh) => {
                println!("{}", summarize(path, &mesh));
                let bad = mesh.out_of_range_indices();
                if bad > 0 {
                    warn!(
                        "{}: {bad} indices reference vertices past {}",
                        path.display(),
                        mesh.vertex_count()
                    );
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("{}: {e}", path.display());
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} files could not be decoded", paths.len());
    }
    Ok(())
}

fn run_dump(path: &Path, json: bool, base64: bool, options: &DecodeOptions) -> Result<(), Report> {
    let mesh = load(path, base64, options)?;

    if json {
        let text = serde_json::to_string_pretty(&mesh)
            .map_err(|e| rootcause::report!("Failed to serialize mesh: {e}"))?;
        println!("{text}");
        return Ok(());
    }

    println!("{:#?}", mesh.header);
    let format = mesh.vertex_format();
    for attr in &format.attributes {
        println!(
            "  {:?}: {} components at byte {}",
            attr.semantic, attr.components, attr.offset
        );
    }
    for i in 0..mesh.vertex_count() {
        if let Some(v) = mesh.vertex(i) {
            println!("v{i}: {v:?}");
        }
    }
    for (i, tri) in mesh.triangles().enumerate() {
        println!("t{i}: {tri:?}");
    }
    Ok(())
}

/// Export to `output`. Nothing is written unless the export succeeds.
fn write_glb(mesh: &Mesh, name: &str, output: &Path) -> Result<(), Report> {
    let mut glb = Vec::new();
    gltf_export::export_glb(mesh, name, &mut glb).context("Failed to build GLB")?;
    fs::write(output, glb).context(format!("Failed to write {}", output.display()))?;
    Ok(())
}

fn main() -> Result<(), Report> {
    let args = Args::parse();
    init_logging(args.verbose);

    let options = DecodeOptions::builder()
        .revision(args.revision.into())
        .allow_trailing_bytes(!args.strict)
        .build();

    match args.command {
        Command::Info { files } => run_info(&files, args.base64, &options)?,
        Command::Dump { file, json } => run_dump(&file, json, args.base64, &options)?,
        Command::Encode { file, output } => {
            let bytes = fs::read(&file).context(format!("Failed to read {}", file.display()))?;
            let output = output.unwrap_or_else(|| {
                let mut name = file.clone().into_os_string();
                name.push(".txt");
                PathBuf::from(name)
            });
            fs::write(&output, text_blob::encode_text(&bytes))
                .context(format!("Failed to write {}", output.display()))?;
            info!("wrote {}", output.display());
        }
        Command::Decode { file, output } => {
            let text = fs::read_to_string(&file)
                .context(format!("Failed to read {}", file.display()))?;
            let bytes = text_blob::decode_text(&text)
                .context(format!("{} is not valid base64", file.display()))?;
            fs::write(&output, bytes).context(format!("Failed to write {}", output.display()))?;
            info!("wrote {}", output.display());
        }
        Command::Upgrade { file, from, output } => {
            let source = open_source(&file, args.base64)?;
            let bytes = source
                .bytes()
                .context(format!("Failed to read {}", file.display()))?;
            let upgraded = writer::upgrade(&bytes, from.into())
                .context(format!("Failed to upgrade {}", file.display()))?;
            fs::write(&output, upgraded)
                .context(format!("Failed to write {}", output.display()))?;
        }
        Command::Export { file, output } => {
            let mesh = load(&file, args.base64, &options)?;
            let name = file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "mesh".to_string());
            write_glb(&mesh, &name, &output)
                .context(format!("Failed to export {}", file.display()))?;
            info!("wrote {}", output.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use c2gview::models::writer::mesh_from_arrays;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("c2gview-cli-{}-{name}", std::process::id()))
    }

    #[test]
    fn failed_export_leaves_no_file() {
        let output = scratch_path("empty.glb");
        let _ = fs::remove_file(&output);

        let empty = mesh_from_arrays(Vec::new(), Vec::new(), 0, 0).unwrap();
        assert!(write_glb(&empty, "empty", &output).is_err());
        assert!(!output.exists());
    }

    #[test]
    fn export_writes_glb() {
        let output = scratch_path("triangle.glb");
        let mesh = mesh_from_arrays(vec![0.5; 18], vec![0, 1, 2], 0, 0).unwrap();
        write_glb(&mesh, "triangle", &output).unwrap();

        let bytes = fs::read(&output).unwrap();
        assert_eq!(&bytes[..4], b"glTF");
        fs::remove_file(output).unwrap();
    }
}
