use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use qbank_core::{
    ImportOrchestrator, ImportPipeline, PipelineConfig, RawDocument, TaskStatus,
    extract::TextExtractor,
    ocr::TesseractCli,
    srs::{Grade, SrsRecord, schedule},
    store::{MemoryAssetLibrary, MemoryQuestionBank, QuestionStore},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "qbank")]
#[command(about = "Extract multiple-choice questions from exam papers and schedule reviews")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import questions from PDF, image, CSV or workbook files
    Import {
        #[arg(required = true, help = "Input files")]
        files: Vec<PathBuf>,

        #[arg(short, long, default_value = "default", help = "Subject the questions belong to")]
        subject: String,

        #[arg(short, long, help = "Pipeline configuration (JSON)")]
        config: Option<PathBuf>,

        #[arg(long, default_value = "tesseract", help = "Tesseract binary used for images")]
        tesseract: PathBuf,
    },

    /// Compute the next review schedule for a grade
    Schedule {
        #[arg(short, long, help = "Recall grade, 0 to 5")]
        grade: u8,

        #[arg(long, help = "Current schedule as JSON")]
        state: Option<String>,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn import(
    files: Vec<PathBuf>,
    subject: String,
    config: Option<PathBuf>,
    tesseract: PathBuf,
) -> Result<(), Box<dyn Error>> {
    let config = match config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    let ocr = TesseractCli::new(tesseract, config.ocr_languages.clone());
    let pipeline = ImportPipeline::new(config.clone())
        .with_extractor(TextExtractor::spawn(config.extract.clone()))
        .with_ocr(Arc::new(ocr));

    let bank = MemoryQuestionBank::new();
    let orchestrator = ImportOrchestrator::new(
        pipeline,
        Arc::new(bank.clone()),
        Arc::new(MemoryAssetLibrary::new()),
    );

    for path in &files {
        let doc = RawDocument::from_path(path)?;
        let task = orchestrator.submit_questions(doc, subject.as_str());
        info!("submitted {} as task {}", task.file_name, task.id);
    }

    for result in orchestrator.wait_all().await {
        let task = result?;
        match task.status {
            TaskStatus::Completed => info!(
                "{}: imported {} questions",
                task.file_name,
                task.result_count.unwrap_or_default()
            ),
            _ => warn!(
                "{}: {:?} {}",
                task.file_name,
                task.status,
                task.error_message.unwrap_or_default()
            ),
        }
    }

    println!("{}", serde_json::to_string_pretty(&bank.list())?);
    Ok(())
}

fn reschedule(grade: u8, state: Option<String>) -> Result<(), Box<dyn Error>> {
    let grade = Grade::new(grade)?;
    let current = state
        .map(|json| serde_json::from_str::<SrsRecord>(&json))
        .transpose()?;

    let next = schedule(current.as_ref(), grade, Utc::now());
    println!("{}", serde_json::to_string_pretty(&next)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Import {
            files,
            subject,
            config,
            tesseract,
        } => import(files, subject, config, tesseract).await,
        Commands::Schedule { grade, state } => reschedule(grade, state),
    }
}
