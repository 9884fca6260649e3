use thiserror::Error;

use crate::domain::ModuleId;

/// Stable error category surfaced to callers alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidInput,
    Internal,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Student not found: {0}")]
    StudentNotFound(String),

    #[error("Student already exists: {0}")]
    StudentAlreadyExists(String),

    #[error("Module not found: {0}")]
    ModuleNotFound(ModuleId),

    #[error("Module not found with code: {0}")]
    ModuleCodeNotFound(String),

    #[error("Module code already in use: {0}")]
    DuplicateModuleCode(String),

    #[error("Student {student_id} is already enrolled in module {module_id}")]
    AlreadyEnrolled {
        student_id: String,
        module_id: ModuleId,
    },

    #[error("Student {student_id} is not enrolled in module {module_id}")]
    EnrollmentNotFound {
        student_id: String,
        module_id: ModuleId,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::StudentNotFound(_)
            | AppError::ModuleNotFound(_)
            | AppError::ModuleCodeNotFound(_)
            | AppError::EnrollmentNotFound { .. } => ErrorKind::NotFound,
            AppError::StudentAlreadyExists(_)
            | AppError::DuplicateModuleCode(_)
            | AppError::AlreadyEnrolled { .. } => ErrorKind::Conflict,
            AppError::InvalidInput(_) => ErrorKind::InvalidInput,
            AppError::Database(_) => ErrorKind::Internal,
        }
    }
}
