use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use srcgen::{Definition, Generator, RuntimeModel, SourceModel, TemplateEngine};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding templates.yaml and the template bodies
    #[arg(short, long, global = true, default_value = ".")]
    template_dir: PathBuf,

    /// Path to the JSON or YAML model data file
    #[arg(short, long, global = true)]
    data: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Select and generate the active file set for a deployment target
    Generate {
        /// Destination directory for generated files
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Active deployment target name
        #[arg(long)]
        deploy_to: String,
    },
    /// Execute one named run step from the definition
    Run {
        /// Name of the run step
        step: String,

        /// Path to a JSON or YAML credentials mapping
        #[arg(long)]
        creds: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let data = load_data(cli.data.as_deref())?;

    match cli.command {
        Commands::Generate { output, deploy_to } => {
            generate(&cli.template_dir, &output, &deploy_to, data)
        }
        Commands::Run { step, creds } => run(&cli.template_dir, &step, data, creds.as_deref()),
    }
}

fn load_data(path: Option<&Path>) -> Result<serde_json::Value> {
    let Some(path) = path else {
        return Ok(serde_json::Value::Null);
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read data file {:?}", path))?;
    let is_yaml = path
        .extension()
        .is_some_and(|ext| ext == "yaml" || ext == "yml");
    if is_yaml {
        serde_yaml::from_str(&content).with_context(|| format!("failed to parse {:?}", path))
    } else {
        serde_json::from_str(&content).with_context(|| format!("failed to parse {:?}", path))
    }
}

fn generate(
    template_dir: &Path,
    output: &Path,
    deploy_to: &str,
    data: serde_json::Value,
) -> Result<()> {
    info!("loading definition from {:?}", template_dir);
    let definition = Definition::load(template_dir).context("failed to load definition")?;

    let engine = TemplateEngine::new();
    let selection_model = SourceModel::new(data.clone());
    let selected = srcgen::select::select(&engine, &definition, deploy_to, selection_model)
        .context("selection pass failed")?;
    info!("active features: {:?}", selected.features);

    let generator = Generator::new(&engine, template_dir, output, definition.defaults.chmod);

    // The selection model was dropped by select(); the render phase gets a
    // fresh one that also exposes the resolved feature list.
    let render_model = SourceModel::new(with_features(data, &selected.features)?);

    // Files are independent; a failed file aborts that file only.
    let mut changed = 0usize;
    let mut failed = 0usize;

    for (dest, spec) in &selected.copies {
        match generator.copy_source(dest, spec) {
            Ok(true) => changed += 1,
            Ok(false) => {}
            Err(err) => {
                failed += 1;
                log::error!("{}: {}", dest, err);
            }
        }
    }
    for (dest, spec) in &selected.templates {
        match generator.generate_template(dest, spec, &render_model) {
            Ok(true) => changed += 1,
            Ok(false) => {}
            Err(err) => {
                failed += 1;
                log::error!("{}: {}", dest, err);
            }
        }
    }

    info!("generation resulted in {} changed file(s)", changed);
    if failed > 0 {
        anyhow::bail!("{failed} file(s) failed to generate");
    }
    Ok(())
}

fn with_features(data: serde_json::Value, features: &[String]) -> Result<serde_json::Value> {
    let mut map = match data {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Null => serde_json::Map::new(),
        _ => anyhow::bail!("model data must be a mapping at the top level"),
    };
    map.insert(
        "features".to_string(),
        serde_json::json!(features),
    );
    Ok(serde_json::Value::Object(map))
}

fn run(
    template_dir: &Path,
    step_name: &str,
    data: serde_json::Value,
    creds: Option<&Path>,
) -> Result<()> {
    let definition = Definition::load(template_dir).context("failed to load definition")?;
    let step = definition
        .run
        .get(step_name)
        .with_context(|| format!("no run step named '{step_name}'"))?;

    let engine = TemplateEngine::new();
    let mut model = RuntimeModel::new(data).with_process_env();
    if let Some(path) = creds {
        model = model.with_creds(load_creds(path)?);
    }
    let env = srcgen::run::resolve_env(&engine, step, &model)?;
    srcgen::run::run_step(step_name, step, &env)?;
    Ok(())
}

fn load_creds(path: &Path) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read credentials file {:?}", path))?;
    let is_yaml = path
        .extension()
        .is_some_and(|ext| ext == "yaml" || ext == "yml");
    if is_yaml {
        serde_yaml::from_str(&content).with_context(|| format!("failed to parse {:?}", path))
    } else {
        serde_json::from_str(&content).with_context(|| format!("failed to parse {:?}", path))
    }
}
