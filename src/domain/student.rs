use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Business identifier supplied by the caller (e.g. "123456789").
/// Opaque, globally unique, immutable once assigned.
pub type StudentId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub student_id: StudentId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub date_of_birth: NaiveDate,
    pub year_group: i32,
}

impl Student {
    pub fn new(
        student_id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        date_of_birth: NaiveDate,
        year_group: i32,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            date_of_birth,
            year_group,
        }
    }

    /// "First Last", used in denormalized enrollment listings.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Overwrite the mutable fields that are present in the delta.
    /// The student id is immutable and deliberately absent from the delta.
    pub fn apply(&mut self, update: StudentUpdate) {
        if let Some(first_name) = update.first_name {
            self.first_name = first_name;
        }
        if let Some(last_name) = update.last_name {
            self.last_name = last_name;
        }
        if let Some(email) = update.email {
            self.email = email;
        }
        if let Some(date_of_birth) = update.date_of_birth {
            self.date_of_birth = date_of_birth;
        }
        if let Some(year_group) = update.year_group {
            self.year_group = year_group;
        }
    }
}

/// Partial update: a field that is `None` means "leave unchanged",
/// never "reset to default".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudentUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub year_group: Option<i32>,
}

impl StudentUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.date_of_birth.is_none()
            && self.year_group.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_student() -> Student {
        Student::new(
            "123456789",
            "Ada",
            "Lovelace",
            "ada@example.com",
            NaiveDate::from_ymd_opt(2008, 12, 10).unwrap(),
            9,
        )
    }

    #[test]
    fn test_display_name() {
        assert_eq!(sample_student().display_name(), "Ada Lovelace");
    }

    #[test]
    fn test_apply_partial_update() {
        let mut student = sample_student();
        student.apply(StudentUpdate {
            email: Some("ada.lovelace@example.com".into()),
            year_group: Some(10),
            ..Default::default()
        });

        assert_eq!(student.email, "ada.lovelace@example.com");
        assert_eq!(student.year_group, 10);
        // Untouched fields keep their values
        assert_eq!(student.first_name, "Ada");
        assert_eq!(student.last_name, "Lovelace");
    }

    #[test]
    fn test_empty_update_changes_nothing() {
        let mut student = sample_student();
        let before = student.clone();
        student.apply(StudentUpdate::default());
        assert_eq!(student, before);
    }

    #[test]
    fn test_empty_update_is_empty() {
        assert!(StudentUpdate::default().is_empty());
        assert!(!StudentUpdate {
            first_name: Some("Grace".into()),
            ..Default::default()
        }
        .is_empty());
    }
}
