use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rollcall_core::{load_gallery, OnnxEmbeddingProvider};
use std::path::{Path, PathBuf};

const DEFAULT_SERVER: &str = "http://127.0.0.1:3000";

#[derive(Parser)]
#[command(name = "rollcall", about = "rollcall face attendance CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload an image to the daemon and print the match result
    Compare {
        /// Image file to upload
        image: PathBuf,
        /// Base URL of rollcalld
        #[arg(short, long, default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// Show daemon status
    Status {
        /// Base URL of rollcalld
        #[arg(short, long, default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// Load a gallery directory locally and list the enrolled names
    Gallery {
        /// Gallery directory (default: Face/)
        #[arg(short, long, default_value = "Face/")]
        dir: PathBuf,
        /// Directory containing the ONNX models
        #[arg(short, long)]
        model_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compare { image, server } => compare(&image, &server).await,
        Commands::Status { server } => status(&server).await,
        Commands::Gallery { dir, model_dir } => gallery(dir, model_dir),
    }
}

async fn compare(image: &Path, server: &str) -> Result<()> {
    let bytes = tokio::fs::read(image)
        .await
        .with_context(|| format!("reading {}", image.display()))?;
    let file_name = image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.jpg".to_string());
    tracing::debug!(bytes = bytes.len(), file = %file_name, server, "uploading image");

    let form = reqwest::multipart::Form::new()
        .part("image", reqwest::multipart::Part::bytes(bytes).file_name(file_name));

    let response = reqwest::Client::new()
        .post(format!("{}/compare-face", server.trim_end_matches('/')))
        .multipart(form)
        .send()
        .await
        .with_context(|| format!("connecting to {server}"))?;

    let code = response.status();
    let body: serde_json::Value = response.json().await.context("decoding reply")?;
    println!("{}", serde_json::to_string_pretty(&body)?);

    if !code.is_success() {
        bail!("rollcalld answered {code}");
    }
    Ok(())
}

async fn status(server: &str) -> Result<()> {
    let body: serde_json::Value = reqwest::get(format!("{}/status", server.trim_end_matches('/')))
        .await
        .with_context(|| format!("connecting to {server}"))?
        .error_for_status()?
        .json()
        .await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

fn gallery(dir: PathBuf, model_dir: Option<PathBuf>) -> Result<()> {
    let model_dir = model_dir.unwrap_or_else(rollcall_core::default_model_dir);
    let scrfd = model_dir.join(rollcall_core::SCRFD_MODEL_FILE);
    let arcface = model_dir.join(rollcall_core::ARCFACE_MODEL_FILE);

    let mut provider =
        OnnxEmbeddingProvider::load(&scrfd.to_string_lossy(), &arcface.to_string_lossy())
            .with_context(|| format!("loading models from {}", model_dir.display()))?;

    let gallery = load_gallery(&dir, &mut provider);
    if gallery.is_empty() {
        println!("No faces enrolled in {}", dir.display());
        return Ok(());
    }

    println!("{} face(s) enrolled in {}:", gallery.len(), dir.display());
    for (i, entry) in gallery.entries().iter().enumerate() {
        println!(
            "  {:>3}  {}  ({}-dim)",
            i + 1,
            entry.name,
            entry.embedding.values.len()
        );
    }
    Ok(())
}
