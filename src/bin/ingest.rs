use std::env;
use std::path::PathBuf;
use tracing::{error, info};

use tonearm::config::Config;
use tonearm::db::Database;
use tonearm::ingest::IngestService;
use tonearm::pipeline::{ChunkPipeline, PipelineConfig};
use tonearm::storage::StorageManager;

#[tokio::main]
async fn main() {
    // Use RUST_LOG env var if set, otherwise default to info level
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        std::process::exit(1);
    }

    let mut file_path: Option<PathBuf> = None;
    let mut track_id: Option<String> = None;
    let mut chunk_seconds: Option<f64> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--file" => {
                if i + 1 >= args.len() {
                    error!("--file requires a file path");
                    print_usage(&args[0]);
                    std::process::exit(1);
                }
                file_path = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--track" => {
                if i + 1 >= args.len() {
                    error!("--track requires an identifier");
                    print_usage(&args[0]);
                    std::process::exit(1);
                }
                track_id = Some(args[i + 1].clone());
                i += 2;
            }
            "--chunk-seconds" => {
                if i + 1 >= args.len() {
                    error!("--chunk-seconds requires a number");
                    print_usage(&args[0]);
                    std::process::exit(1);
                }
                match args[i + 1].parse::<f64>() {
                    Ok(value) if value > 0.0 => chunk_seconds = Some(value),
                    _ => {
                        error!("--chunk-seconds must be a positive number");
                        std::process::exit(1);
                    }
                }
                i += 2;
            }
            _ => {
                error!("Unknown argument: {}", args[i]);
                print_usage(&args[0]);
                std::process::exit(1);
            }
        }
    }

    let file_path = match file_path {
        Some(path) => path,
        None => {
            error!("No input file specified");
            print_usage(&args[0]);
            std::process::exit(1);
        }
    };
    if !file_path.exists() {
        error!("Audio file not found: {}", file_path.display());
        std::process::exit(1);
    }
    let track_id = match track_id {
        Some(id) => id,
        None => {
            error!("No track identifier specified");
            print_usage(&args[0]);
            std::process::exit(1);
        }
    };

    let config = Config::load();

    let buffer = match tokio::fs::read(&file_path).await {
        Ok(buffer) => buffer,
        Err(e) => {
            error!("Failed to read {}: {}", file_path.display(), e);
            std::process::exit(1);
        }
    };

    let storage = match StorageManager::from_config(&config).await {
        Ok(storage) => storage,
        Err(e) => {
            error!("Failed to initialize storage: {}", e);
            std::process::exit(1);
        }
    };

    let database_file = config.database_file();
    if let Some(parent) = database_file.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            error!("Failed to create {}: {}", parent.display(), e);
            std::process::exit(1);
        }
    }
    let db = match Database::new(&database_file.to_string_lossy()).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    let pipeline_config = PipelineConfig {
        chunk_seconds: chunk_seconds.unwrap_or(config.chunk_seconds),
    };
    let service = IngestService::new(
        ChunkPipeline::with_config(storage, pipeline_config),
        db,
    );

    info!(
        "Ingesting {} as track {}",
        file_path.display(),
        track_id
    );
    let ingested = match service.ingest(&track_id, &buffer).await {
        Ok(ingested) => ingested,
        Err(e) => {
            error!("Ingest failed: {}", e);
            std::process::exit(1);
        }
    };

    println!("track: {}", track_id);
    println!("duration: {} s", ingested.duration_secs);
    println!("chunks: {}", ingested.chunks.len());
    for chunk in &ingested.chunks {
        println!(
            "  [{:05}] {:8.3} s  {:>9} bytes  {}",
            chunk.chunk_index, chunk.duration_secs, chunk.size_bytes, chunk.url
        );
    }
}

fn print_usage(program_name: &str) {
    eprintln!("Usage:");
    eprintln!(
        "  {} --file <mp3_file> --track <id> [--chunk-seconds <seconds>]",
        program_name
    );
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} --file song.mp3 --track 4f1c2ab0", program_name);
    eprintln!(
        "  {} --file song.mp3 --track 4f1c2ab0 --chunk-seconds 15",
        program_name
    );
}
