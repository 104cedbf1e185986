//! Text extraction from uploaded files.
//!
//! PDF via `pdf-extract`; plain text and markdown as UTF-8. Anything
//! else is attempted as UTF-8 text and rejected as a validation error
//! if it is not.

use crate::domains::error::{ServiceError, ServiceResult};

pub fn extract_text(data: &[u8], filename: &str, content_type: &str) -> ServiceResult<String> {
    let lower_name = filename.to_lowercase();

    if content_type == "application/pdf" || lower_name.ends_with(".pdf") {
        return pdf_extract::extract_text_from_mem(data).map_err(|err| {
            ServiceError::Validation(format!("Failed to extract text from PDF: {err}"))
        });
    }

    if content_type.starts_with("text/")
        || lower_name.ends_with(".txt")
        || lower_name.ends_with(".md")
    {
        return String::from_utf8(data.to_vec())
            .map_err(|_| ServiceError::Validation("File is not valid UTF-8 text".to_string()));
    }

    // Last resort: treat as text if it decodes cleanly.
    String::from_utf8(data.to_vec())
        .map_err(|_| ServiceError::Validation(format!("Unsupported file type: {content_type}")))
}
