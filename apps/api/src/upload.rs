//! Multipart form parsing shared by the upload endpoints.

use std::collections::HashMap;

use axum::extract::Multipart;

use crate::errors::AppError;
use crate::raster::PdfFile;

const FILE_FIELD: &str = "file";

/// Text fields plus at most one file from a multipart body.
#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    file: Option<PdfFile>,
}

impl UploadForm {
    pub fn optional(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn required(&self, name: &str) -> Result<String, AppError> {
        self.optional(name)
            .map(str::to_string)
            .ok_or_else(|| AppError::Validation(format!("Field '{name}' is required")))
    }

    pub fn take_file(&mut self) -> Result<PdfFile, AppError> {
        self.file
            .take()
            .ok_or_else(|| AppError::Validation(format!("Field '{FILE_FIELD}' is required")))
    }
}

/// Reads the whole form, rejecting files larger than `max_file_bytes`.
pub async fn read_upload_form(
    mut multipart: Multipart,
    max_file_bytes: usize,
) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == FILE_FIELD {
            let file_name = field.file_name().unwrap_or("resume.pdf").to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await?;
            if bytes.len() > max_file_bytes {
                return Err(AppError::PayloadTooLarge(format!(
                    "File is {} bytes; the limit is {max_file_bytes} bytes",
                    bytes.len()
                )));
            }
            form.file = Some(PdfFile {
                name: file_name,
                content_type,
                bytes,
            });
        } else {
            let value = field.text().await?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}
