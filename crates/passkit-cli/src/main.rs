//! Command-line interface for assembling signed pass packages.
//!
//! Reads a template definition, merges instance fields from a JSON file,
//! adds images from a directory, and writes the resulting `.pkpass`.

use clap::Parser;
use passkit::{ArchiveOptions, DigestAlgorithm, FieldMap, Template, TemplateDefinition};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "passkit")]
#[command(about = "Assemble a signed wallet pass package")]
struct Cli {
    /// Template definition (JSON)
    template: PathBuf,

    /// Instance fields (JSON object), merged over the template fields
    #[arg(short = 'f', long)]
    fields: Option<PathBuf>,

    /// Directory of <role>[@2x|@3x].png images, overriding template images
    #[arg(short = 'i', long)]
    images: Option<PathBuf>,

    /// Key directory, overriding the one in the template
    #[arg(short = 'k', long)]
    keys: Option<PathBuf>,

    /// Password for the private key
    #[arg(long)]
    password: Option<String>,

    /// Output file (default: <serialNumber>.pkpass)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// ZIP compression level (0-9, default: 1)
    #[arg(short = 'z', long, default_value = "1")]
    zip_level: u32,

    /// Manifest digest: sha1 or sha256
    #[arg(long, default_value = "sha1")]
    digest: DigestAlgorithm,

    /// Fixed modification time for every member (YYYY-MM-DDTHH:MM:SS)
    #[arg(long)]
    timestamp: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let template = load_template(&cli)?;

    let fields = match cli.fields {
        Some(ref path) => load_fields(path)?,
        None => FieldMap::new(),
    };

    let mut pass = template.create_pass(fields);
    if let Some(ref dir) = cli.images {
        let count = pass.load_images_from(dir)?;
        tracing::info!(count, dir = %dir.display(), "loaded images");
    }

    let mut options = ArchiveOptions::new().compression_level(cli.zip_level);
    if let Some(ref timestamp) = cli.timestamp {
        let (year, month, day, hour, minute, second) = parse_timestamp(timestamp)?;
        options = options.modified_at(year, month, day, hour, minute, second)?;
    }

    let output = cli.output.clone().unwrap_or_else(|| {
        let serial = pass
            .fields()
            .get("serialNumber")
            .and_then(|v| v.as_str())
            .unwrap_or("pass");
        PathBuf::from(format!("{}.pkpass", serial))
    });

    let bytes = pass
        .archive_options(options)
        .digest_algorithm(cli.digest)
        .generate()
        .await?;
    std::fs::write(&output, bytes)?;

    println!("Generated: {}", output.display());
    Ok(())
}

/// Template from the definition file, with `--keys` and `--password` applied.
///
/// Either flag alone keeps the other setting from the definition.
fn load_template(cli: &Cli) -> Result<Template, Box<dyn std::error::Error>> {
    let mut definition = TemplateDefinition::from_file(&cli.template)?;
    if let Some(ref keys) = cli.keys {
        definition = definition.key_dir(std::fs::canonicalize(keys)?);
    }
    if let Some(ref password) = cli.password {
        definition = definition.password(password.as_str());
    }
    Ok(definition.into_template()?)
}

fn load_fields(path: &Path) -> Result<FieldMap, Box<dyn std::error::Error>> {
    let data = std::fs::read(path)?;
    match serde_json::from_slice::<serde_json::Value>(&data)? {
        serde_json::Value::Object(fields) => Ok(fields),
        _ => Err(format!("{} must contain a JSON object", path.display()).into()),
    }
}

fn parse_timestamp(value: &str) -> Result<(u16, u8, u8, u8, u8, u8), Box<dyn std::error::Error>> {
    let invalid = || format!("Invalid timestamp {}, expected YYYY-MM-DDTHH:MM:SS", value);

    let (date, time) = value.split_once(['T', ' ']).ok_or_else(invalid)?;
    let date: Vec<&str> = date.split('-').collect();
    let time: Vec<&str> = time.split(':').collect();
    if date.len() != 3 || time.len() != 3 {
        return Err(invalid().into());
    }

    Ok((
        date[0].parse()?,
        date[1].parse()?,
        date[2].parse()?,
        time[0].parse()?,
        time[1].parse()?,
        time[2].parse()?,
    ))
}
