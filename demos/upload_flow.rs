//! Log in, upload a selection of photos and wait for the result
//!
//! Usage:
//!   DEV2GIS_EMAIL=pilot@example.com DEV2GIS_PASSWORD=... \
//!     cargo run --example upload_flow -- photo1.jpg [photo2.jpg ...]

use dev2gis_client::types::JobStatus;
use dev2gis_client::{
    ApiClient, BatchOptions, ClientConfig, FileCredentialStore, FnNavigator, PollOptions,
    UploadFile, UploadOutcome,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("dev2gis_client=debug".parse()?))
        .init();

    let config = ClientConfig::from_env()?;
    let email = std::env::var("DEV2GIS_EMAIL").unwrap_or_else(|_| "pilot@example.com".to_string());
    let password = std::env::var("DEV2GIS_PASSWORD").unwrap_or_else(|_| "changeme123".to_string());
    let session_file =
        std::env::var("DEV2GIS_SESSION_FILE").unwrap_or_else(|_| ".dev2gis-session.json".to_string());

    println!("=== dev2gis Upload Example ===");
    println!("API: {}", config.base_url);
    println!("Session file: {}", session_file);
    println!();

    let store = Arc::new(FileCredentialStore::open(&session_file)?);
    let client = ApiClient::builder(config)
        .store(store)
        .navigator(Arc::new(FnNavigator::new(|| {
            println!("! Session ended, log in again");
        })))
        .build()?;

    if client.is_authenticated() {
        if let Some(user) = client.current_user() {
            println!("✓ Reusing session for {}", user.email);
        }
    } else {
        println!("Logging in as {}...", email);
        client.login(&email, &password).await?;
        println!("✓ Logged in");
    }
    println!();

    let mut files = Vec::new();
    for path in std::env::args().skip(1) {
        files.push(UploadFile::from_path(&path).await?);
    }
    if files.is_empty() {
        println!("No photos given, listing recent jobs instead");
        let list = client.list_heightmaps(Default::default()).await?;
        for job in list.heightmaps {
            println!("  - {} {:?}", job.id, job.status);
        }
        return Ok(());
    }

    println!("Uploading {} photo(s)...", files.len());
    let options = BatchOptions {
        generate_orthophoto: true,
        ..Default::default()
    };
    let outcome = client.submit_upload(files, options).await?;
    println!("✓ Job {} accepted", outcome.job_id());

    let poll = PollOptions::default();
    let (status, result_url) = match outcome {
        UploadOutcome::Single(upload) => {
            let job = client.wait_for_heightmap(&upload.id, poll).await?;
            (job.status, job.result_url)
        }
        UploadOutcome::Batch(upload) => {
            let job = client.wait_for_batch_heightmap(&upload.id, poll).await?;
            (job.status, job.result_url)
        }
    };

    match status {
        JobStatus::Completed => println!("✓ Done: {}", result_url.unwrap_or_default()),
        other => println!("! Job ended as {:?}", other),
    }

    Ok(())
}
