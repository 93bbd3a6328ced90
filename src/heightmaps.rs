//! Auth and heightmap endpoint methods

use crate::api_client::{ApiClient, MultipartForm, RequestBody, RequestOptions};
use crate::error::{ClientError, Result};
use crate::token;
use crate::types::*;
use crate::validators::{
    validate_batch_files, validate_email, validate_image_files, validate_name, validate_password,
    ValidationError, MIN_BATCH_FILES,
};
use reqwest::Method;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";
pub const HEIGHTMAPS_PATH: &str = "/heightmaps";
pub const UPLOAD_PATH: &str = "/heightmaps/upload";
pub const BATCH_PATH: &str = "/heightmaps/batch";
pub const BATCH_UPLOAD_PATH: &str = "/heightmaps/batch/upload";

/// How often and how long to poll a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 600,
        }
    }
}

impl ApiClient {
    /// Log in and persist the session
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse> {
        validate_email(email)?;
        validate_password(password)?;

        let body = RequestBody::json(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })?;
        let response: AuthResponse = self
            .request_json(LOGIN_PATH, RequestOptions::new(Method::POST).body(body))
            .await?;

        self.persist_session(&response)?;
        info!(email = %email, "Logged in");
        Ok(response)
    }

    /// Create an account and persist the session
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<AuthResponse> {
        validate_name(name)?;
        validate_email(email)?;
        validate_password(password)?;

        let body = RequestBody::json(&RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        })?;
        let response: AuthResponse = self
            .request_json(REGISTER_PATH, RequestOptions::new(Method::POST).body(body))
            .await?;

        self.persist_session(&response)?;
        info!(email = %email, "Registered");
        Ok(response)
    }

    /// Drop the local session
    pub fn logout(&self) -> Result<()> {
        self.store().clear()?;
        self.navigator().redirect_to_login();
        info!("Logged out");
        Ok(())
    }

    fn persist_session(&self, response: &AuthResponse) -> Result<()> {
        let tokens = response
            .tokens
            .as_ref()
            .filter(|tokens| !tokens.access_token.is_empty())
            .ok_or_else(|| ClientError::MalformedResponse {
                status: 200,
                message: "no access token in auth response".into(),
            })?;

        let store = self.store();
        store.store_tokens(tokens)?;
        if let Some(user) = response
            .user
            .clone()
            .or_else(|| token::user_from_token(&tokens.access_token))
        {
            store.store_user(&user)?;
        }
        Ok(())
    }

    /// Upload one photo for depth estimation
    pub async fn upload_single(&self, file: UploadFile) -> Result<UploadResponse> {
        validate_image_files(std::slice::from_ref(&file))?;

        debug!(file = %file.name, size = file.size(), "Uploading single image");
        let form = MultipartForm::new().file("file", file);
        self.request_json(UPLOAD_PATH, RequestOptions::new(Method::POST).body(form))
            .await
    }

    /// Upload a photo set for photogrammetry
    pub async fn upload_batch(
        &self,
        files: Vec<UploadFile>,
        options: BatchOptions,
    ) -> Result<BatchUploadResponse> {
        validate_batch_files(&files)?;
        let mode = options
            .generation_mode()
            .ok_or(ValidationError::NoGenerationMode)?;

        debug!(
            count = files.len(),
            merge_method = %options.merge_method,
            generation_mode = %mode,
            "Uploading batch"
        );

        let mut form = MultipartForm::new();
        for file in files {
            form = form.file("files", file);
        }
        let form = form
            .text("merge_method", options.merge_method.as_str())
            .text("fast_mode", options.fast_mode.to_string())
            .text("generation_mode", mode.as_str());

        self.request_json(BATCH_UPLOAD_PATH, RequestOptions::new(Method::POST).body(form))
            .await
    }

    /// Send the selection to the single or batch endpoint depending on its size
    pub async fn submit_upload(
        &self,
        files: Vec<UploadFile>,
        options: BatchOptions,
    ) -> Result<UploadOutcome> {
        match ProcessingKind::for_count(files.len()) {
            ProcessingKind::None => Err(ValidationError::NoFiles.into()),
            ProcessingKind::Insufficient => Err(ValidationError::InsufficientFiles {
                count: files.len(),
                min: MIN_BATCH_FILES,
            }
            .into()),
            ProcessingKind::Single => {
                let file = files.into_iter().next().ok_or(ValidationError::NoFiles)?;
                self.upload_single(file).await.map(UploadOutcome::Single)
            }
            ProcessingKind::Batch => self
                .upload_batch(files, options)
                .await
                .map(UploadOutcome::Batch),
        }
    }

    pub async fn list_heightmaps(&self, page: Page) -> Result<HeightmapList> {
        self.request_json(HEIGHTMAPS_PATH, paged(page)).await
    }

    pub async fn get_heightmap(&self, id: &str) -> Result<HeightmapJob> {
        self.request_json(
            &format!("{HEIGHTMAPS_PATH}/{id}"),
            RequestOptions::new(Method::GET),
        )
        .await
    }

    pub async fn list_batch_heightmaps(&self, page: Page) -> Result<BatchHeightmapList> {
        self.request_json(BATCH_PATH, paged(page)).await
    }

    pub async fn get_batch_heightmap(&self, id: &str) -> Result<BatchHeightmapJob> {
        self.request_json(&format!("{BATCH_PATH}/{id}"), RequestOptions::new(Method::GET))
            .await
    }

    /// Poll a single-image job until it completes or fails
    pub async fn wait_for_heightmap(&self, id: &str, poll: PollOptions) -> Result<HeightmapJob> {
        poll_until(id, poll, || self.get_heightmap(id), |job: &HeightmapJob| job.status).await
    }

    /// Poll a batch job until it completes or fails
    pub async fn wait_for_batch_heightmap(
        &self,
        id: &str,
        poll: PollOptions,
    ) -> Result<BatchHeightmapJob> {
        poll_until(id, poll, || self.get_batch_heightmap(id), |job: &BatchHeightmapJob| {
            job.status
        })
        .await
    }
}

fn paged(page: Page) -> RequestOptions {
    page.query()
        .into_iter()
        .fold(RequestOptions::new(Method::GET), |options, (key, value)| {
            options.query(key, value)
        })
}

async fn poll_until<T, F, Fut>(
    id: &str,
    poll: PollOptions,
    mut fetch: F,
    status: fn(&T) -> JobStatus,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    for attempt in 1..=poll.max_attempts {
        let job = fetch().await?;
        let current = status(&job);
        if current.is_terminal() {
            debug!(id = %id, attempt, status = ?current, "Job finished");
            return Ok(job);
        }

        debug!(id = %id, attempt, status = ?current, "Job still running");
        if attempt < poll.max_attempts {
            tokio::time::sleep(poll.interval).await;
        }
    }

    Err(ClientError::PollTimeout {
        id: id.to_string(),
        attempts: poll.max_attempts,
    })
}
