use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{ModuleId, StudentId};

pub type EnrollmentId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    /// Student is currently taking the module
    Active,
    /// Module finished, final grade recorded
    Completed,
    /// Student withdrew before completion
    Dropped,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Completed => "completed",
            EnrollmentStatus::Dropped => "dropped",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(EnrollmentStatus::Active),
            "completed" => Some(EnrollmentStatus::Completed),
            "dropped" => Some(EnrollmentStatus::Dropped),
            _ => None,
        }
    }
}

impl std::fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An enrollment links one student to one module.
/// The (student, module) pair is unique across the ledger; the surrogate id
/// exists only as a storage key and is assigned by the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub student_id: StudentId,
    pub module_id: ModuleId,
    /// Set once at creation, never modified afterwards
    pub date_enrolled: NaiveDate,
    /// Percentage 0..=100, null until a grade is assigned
    pub grade_percentage: Option<Decimal>,
    pub status: EnrollmentStatus,
}

impl Enrollment {
    /// Create a new enrollment dated today. The id is set by the repository.
    pub fn new(student_id: impl Into<String>, module_id: ModuleId) -> Self {
        Self {
            id: 0, // Will be set by repository
            student_id: student_id.into(),
            module_id,
            date_enrolled: Utc::now().date_naive(),
            grade_percentage: None,
            status: EnrollmentStatus::Active,
        }
    }

    pub fn with_grade(mut self, grade: Decimal) -> Self {
        self.grade_percentage = Some(grade);
        self
    }

    /// Apply a grade/status delta. Date and identity fields are not mutable.
    pub fn apply(&mut self, update: EnrollmentUpdate) {
        if let Some(grade) = update.grade_percentage {
            self.grade_percentage = Some(grade);
        }
        if let Some(status) = update.status {
            self.status = status;
        }
    }
}

/// Partial update: `None` means "leave unchanged". A grade, once set,
/// can only be replaced (last write wins), never cleared.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EnrollmentUpdate {
    pub grade_percentage: Option<Decimal>,
    pub status: Option<EnrollmentStatus>,
}

impl EnrollmentUpdate {
    pub fn is_empty(&self) -> bool {
        self.grade_percentage.is_none() && self.status.is_none()
    }
}

/// A grade is a percentage: between 0 and 100 inclusive.
pub fn grade_in_range(grade: Decimal) -> bool {
    grade >= Decimal::ZERO && grade <= Decimal::ONE_HUNDRED
}
