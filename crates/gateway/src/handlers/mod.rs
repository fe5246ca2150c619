//! API handlers module

pub mod collection;
pub mod columns;
pub mod health;
pub mod trail;

use citegraph_common::errors::AppError;
use citegraph_common::models::PaperId;
use validator::ValidationErrors;

/// Parse a paper identifier taken from a path or body
pub(crate) fn parse_paper_id(raw: &str, field: &str) -> Result<PaperId, AppError> {
    PaperId::parse(raw).ok_or_else(|| AppError::Validation {
        message: format!("{} must be a paper identifier", field),
        field: Some(field.to_string()),
    })
}

pub(crate) fn validation_error(errors: ValidationErrors) -> AppError {
    let field = errors.field_errors().keys().next().map(|f| f.to_string());
    AppError::Validation {
        message: errors.to_string(),
        field,
    }
}
