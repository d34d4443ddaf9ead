use std::{error::Error, fs, path::PathBuf, sync::Arc};
use clap::Args;
use ramlmockserver::{
    config::{compiled::compile_document, options::MockOptions},
    mock::example::ThreadRngPicker,
    raml::loader::{load_raml, raml_path_cwd},
};
use tracing::info;

/// Resolve a RAML file into the mock route table, written as JSON.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Input RAML file
    #[arg(short, long, value_name = "FILE")]
    pub file: PathBuf,

    /// Output filename for the compiled routes
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,
}

pub async fn run(args: BuildArgs) -> Result<(), Box<dyn Error>> {
    let raml = raml_path_cwd(&args.file.to_string_lossy());
    let out = raml_path_cwd(&args.output.to_string_lossy());
    info!(raml = %raml.display(), out = %out.display(), "starting build");

    // 1) Load, resolve includes and templates
    let loaded = load_raml(&raml)?;

    // 2) Compile one handler per operation
    let api = compile_document(&loaded.document, &MockOptions::default(), Arc::new(ThreadRngPicker));

    // 3) Serialize + write
    let json = serde_json::to_string_pretty(&api)?;
    fs::write(&out, json)?;

    info!(resources = api.resources.len(), "build succeeded");
    Ok(())
}
