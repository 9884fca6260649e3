use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::LedgerService;
use crate::domain::{Enrollment, Module, Student};

/// Database snapshot for full export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub students: Vec<Student>,
    pub modules: Vec<Module>,
    pub enrollments: Vec<Enrollment>,
}

/// Exporter for converting ledger data to various formats
pub struct Exporter<'a> {
    service: &'a LedgerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Export students to CSV format
    pub async fn export_students_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let students = self.service.list_students().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "student_id",
            "first_name",
            "last_name",
            "email",
            "date_of_birth",
            "year_group",
        ])?;

        let mut count = 0;
        for student in &students {
            csv_writer.write_record([
                student.student_id.clone(),
                student.first_name.clone(),
                student.last_name.clone(),
                student.email.clone(),
                student.date_of_birth.to_string(),
                student.year_group.to_string(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export modules to CSV format
    pub async fn export_modules_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let modules = self.service.list_modules().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["id", "title", "module_code", "description"])?;

        let mut count = 0;
        for module in &modules {
            csv_writer.write_record([
                module.id.to_string(),
                module.title.clone(),
                module.module_code.clone(),
                module.description.clone(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export enrollments to CSV format, denormalized with student names
    /// and module titles.
    pub async fn export_enrollments_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let records = self.service.list_enrollments(None, None).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "student_id",
            "student_name",
            "module_code",
            "module_title",
            "date_enrolled",
            "grade_percentage",
            "status",
        ])?;

        let mut count = 0;
        for record in &records {
            csv_writer.write_record([
                record.enrollment.student_id.clone(),
                record.student_name.clone(),
                record.module_code.clone(),
                record.module_title.clone(),
                record.enrollment.date_enrolled.to_string(),
                record
                    .enrollment
                    .grade_percentage
                    .map(|g| g.to_string())
                    .unwrap_or_default(),
                record.enrollment.status.as_str().to_string(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export full database as JSON snapshot
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<RegistrySnapshot> {
        let students = self.service.list_students().await?;
        let modules = self.service.list_modules().await?;
        let enrollments = self.service.list_raw_enrollments().await?;

        let snapshot = RegistrySnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            students,
            modules,
            enrollments,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
