use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    ExportedDocument, HttpProcessingBackend, ImageUpload, UploadController, UploadSession,
};
use shared::domain::Statistics;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod settings;

use settings::{load_settings, Settings};

#[derive(Parser, Debug)]
#[command(name = "ocr-cli", about = "Extract and export text through a remote OCR service")]
struct Cli {
    /// Base URL of the processing service; overrides ocr_client.toml and env.
    #[arg(long, global = true)]
    server_url: Option<String>,
    /// Abort requests after this many seconds (0 disables the timeout).
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload an image and print the extracted text with its statistics.
    Process {
        image: PathBuf,
        /// Replace the extracted text with this file's contents before export.
        #[arg(long)]
        replace_text: Option<PathBuf>,
        /// Export the text as a .docx; a directory receives the default file name.
        #[arg(long, num_args = 0..=1, default_missing_value = ".")]
        export: Option<PathBuf>,
        /// Print the session as JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },
    /// Export arbitrary text as a .docx document.
    Export {
        text_file: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let settings = load_settings()
        .with_overrides(cli.server_url, cli.timeout_secs)
        .validated()?;
    info!(server_url = %settings.server_url, "using processing service");
    let controller = build_controller(&settings)?;

    match cli.command {
        Command::Process {
            image,
            replace_text,
            export,
            json,
        } => {
            run_process(
                &controller,
                &image,
                replace_text.as_deref(),
                export.as_deref(),
                json,
            )
            .await
        }
        Command::Export { text_file, output } => {
            let text = tokio::fs::read_to_string(&text_file)
                .await
                .with_context(|| format!("failed to read text file '{}'", text_file.display()))?;
            let document = controller.export(&text).await?;
            let target = output.unwrap_or_else(|| PathBuf::from("."));
            save_document(&document, &target).await?;
            Ok(())
        }
    }
}

fn build_controller(settings: &Settings) -> Result<UploadController> {
    let backend = match settings.request_timeout_secs {
        Some(secs) => {
            HttpProcessingBackend::with_timeout(&settings.server_url, Duration::from_secs(secs))
                .context("failed to build HTTP client")?
        }
        None => HttpProcessingBackend::new(&settings.server_url),
    };
    Ok(UploadController::new(Arc::new(backend))
        .with_export_file_name(&settings.export_file_name))
}

async fn run_process(
    controller: &UploadController,
    image: &Path,
    replace_text: Option<&Path>,
    export: Option<&Path>,
    json: bool,
) -> Result<()> {
    let upload = read_image(image).await?;
    let session = controller.submit(upload).await?;
    match &session {
        UploadSession::Success { .. } => {}
        UploadSession::Error { error_message } => bail!("{error_message}"),
        other => bail!("upload did not complete (session is {})", other.status()),
    }

    if let Some(path) = replace_text {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read replacement text '{}'", path.display()))?;
        controller.edit_text(text)?;
    }

    let session = controller.session();
    if json {
        println!("{}", serde_json::to_string_pretty(&session)?);
    } else if let (Some(text), Some(stats)) = (session.text(), session.stats()) {
        println!("{text}");
        println!("---");
        println!("{}", format_stats(stats));
    }

    if let Some(target) = export {
        let document = controller.export_current().await?;
        save_document(&document, target).await?;
    }
    Ok(())
}

async fn read_image(path: &Path) -> Result<ImageUpload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read image '{}'", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    let upload = ImageUpload::new(file_name, bytes);
    Ok(match mime_guess::from_path(path).first_raw() {
        Some(mime) => upload.with_mime_type(mime),
        None => upload,
    })
}

async fn save_document(document: &ExportedDocument, target: &Path) -> Result<PathBuf> {
    let path = resolve_output_path(target, &document.file_name);
    tokio::fs::write(&path, &document.bytes)
        .await
        .with_context(|| format!("failed to write document '{}'", path.display()))?;
    info!(path = %path.display(), size_bytes = document.bytes.len(), "document saved");
    Ok(path)
}

fn resolve_output_path(target: &Path, file_name: &str) -> PathBuf {
    if target.is_dir() {
        target.join(file_name)
    } else {
        target.to_path_buf()
    }
}

fn format_stats(stats: &Statistics) -> String {
    format!(
        "words: {}  sentences: {}  characters: {}  avg word length: {:.2}",
        stats.word_count, stats.sentence_count, stats.char_count, stats.avg_word_length
    )
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
