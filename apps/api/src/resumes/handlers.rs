use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Response,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::feedback::ScoreBands;
use crate::models::resume::ResumeRecord;
use crate::resumes::pipeline::{analyze_resume, ResumeUpload};
use crate::resumes::store::{list_records, load_record};
use crate::routes::blob_response;
use crate::state::AppState;
use crate::upload::read_upload_form;

#[derive(Serialize)]
pub struct ResumeDetail {
    #[serde(flatten)]
    pub record: ResumeRecord,
    pub bands: Option<ScoreBands>,
}

impl From<ResumeRecord> for ResumeDetail {
    fn from(record: ResumeRecord) -> Self {
        let bands = record.feedback.as_ref().map(|f| f.bands());
        Self { record, bands }
    }
}

/// POST /api/v1/resumes
pub async fn handle_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ResumeDetail>), AppError> {
    let mut form = read_upload_form(multipart, state.config.max_upload_bytes).await?;
    let upload = ResumeUpload {
        company_name: form.required("company_name")?,
        job_title: form.required("job_title")?,
        job_description: form.required("job_description")?,
        file: form.take_file()?,
    };

    let record = analyze_resume(&state, upload).await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

/// GET /api/v1/resumes
pub async fn handle_list(State(state): State<AppState>) -> Result<Json<Vec<ResumeDetail>>, AppError> {
    let records = list_records(state.kv.as_ref()).await?;
    Ok(Json(records.into_iter().map(ResumeDetail::from).collect()))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResumeDetail>, AppError> {
    let record = find(&state, id).await?;
    Ok(Json(record.into()))
}

/// GET /api/v1/resumes/:id/pdf
pub async fn handle_pdf(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let record = find(&state, id).await?;
    read_blob(&state, &record.resume_path).await
}

/// GET /api/v1/resumes/:id/image
pub async fn handle_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let record = find(&state, id).await?;
    read_blob(&state, &record.image_path).await
}

async fn find(state: &AppState, id: Uuid) -> Result<ResumeRecord, AppError> {
    load_record(state.kv.as_ref(), id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))
}

async fn read_blob(state: &AppState, path: &str) -> Result<Response, AppError> {
    let blob = state
        .blobs
        .read(path)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Blob {path} not found")))?;
    Ok(blob_response(blob))
}
