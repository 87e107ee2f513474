//! API endpoint handlers.
//!
//! Handlers are thin: they open a connection, call the domain module and
//! map its errors. Authorization rules live in the domain layer.

pub mod auth;
pub mod data_files;
pub mod doctors;
pub mod file_prescriptions;
pub mod health;
pub mod patients;
pub mod prescriptions;
pub mod users;

use axum::extract::Multipart;
use axum::http::StatusCode;

use crate::api::error::ApiError;
use crate::prescriptions::Upload;

/// Multipart field carrying the uploaded bytes.
const FILE_FIELD: &str = "file";

/// Pull the `file` field out of a multipart body. Other fields are ignored.
pub(crate) async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return Ok(Upload {
            file_name,
            bytes: bytes.to_vec(),
        });
    }
    Err(ApiError::BadRequest(format!("Missing multipart field '{FILE_FIELD}'")))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}
