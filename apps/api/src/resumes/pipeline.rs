use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::feedback::parse_feedback;
use crate::feedback::prompts::prepare_instructions;
use crate::models::blob::{Blob, PDF_MIME};
use crate::models::resume::ResumeRecord;
use crate::raster::PdfFile;
use crate::resumes::store::save_record;
use crate::state::AppState;
use crate::storage::sanitize_file_name;

#[derive(Debug)]
pub struct ResumeUpload {
    pub company_name: String,
    pub job_title: String,
    pub job_description: String,
    pub file: PdfFile,
}

/// Stores the PDF and its first-page preview, records metadata, then asks
/// the AI provider for feedback. The record is saved before analysis so a
/// failed analysis still leaves the upload visible with `feedback: null`.
pub async fn analyze_resume(state: &AppState, upload: ResumeUpload) -> Result<ResumeRecord, AppError> {
    let ResumeUpload {
        company_name,
        job_title,
        job_description,
        file,
    } = upload;
    file.validate()?;
    let id = Uuid::new_v4();
    let file_name = sanitize_file_name(&file.name);

    info!(%id, "Uploading the file...");
    let resume_path = format!("resumes/{id}/{file_name}");
    state
        .blobs
        .upload(&resume_path, Blob::new(file.bytes.clone(), PDF_MIME))
        .await?;

    info!(%id, "Converting to image...");
    let converted = state
        .rasterizer
        .convert_pdf_to_image(PdfFile {
            name: file_name,
            ..file
        })
        .await?;

    info!(%id, "Uploading the image...");
    let image_path = format!("resumes/{id}/{}", converted.derived_name);
    let stored = state
        .blobs
        .upload(&image_path, converted.raster.clone())
        .await;
    converted.handle.release();
    stored?;

    info!(%id, "Preparing data...");
    let mut record = ResumeRecord {
        id,
        company_name,
        job_title,
        job_description,
        resume_path,
        image_path,
        feedback: None,
        created_at: Utc::now(),
    };
    save_record(state.kv.as_ref(), &record).await?;

    info!(%id, "Analyzing...");
    let instructions = prepare_instructions(&record.job_title, &record.job_description);
    let reply = state
        .feedback
        .feedback(&record.resume_path, &instructions)
        .await?;
    record.feedback = Some(parse_feedback(&reply.message.content)?);
    save_record(state.kv.as_ref(), &record).await?;

    info!(%id, "Analysis complete");
    Ok(record)
}
