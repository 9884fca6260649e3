use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::io::Read;
use std::str::FromStr;

use crate::application::{ErrorKind, LedgerService};

/// Result of an import operation
#[derive(Debug, Clone)]
pub struct ImportResult {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<ImportError>,
}

/// Error that occurred during import
#[derive(Debug, Clone)]
pub struct ImportError {
    pub line: usize,
    pub field: Option<String>,
    pub error: String,
}

/// Options for import operations
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub dry_run: bool,
    pub skip_duplicates: bool,
}

/// Importer for loading records into the ledger
pub struct Importer<'a> {
    service: &'a LedgerService,
}

impl<'a> Importer<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Import students from CSV with columns:
    /// student_id, first_name, last_name, email, date_of_birth, year_group
    pub async fn import_students_csv<R: Read>(
        &self,
        reader: R,
        options: ImportOptions,
    ) -> Result<ImportResult> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut imported = 0;
        let mut skipped = 0;
        let mut errors = Vec::new();

        for (line_num, result) in csv_reader.records().enumerate() {
            let line = line_num + 2; // +2 for header and 0-indexing

            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    errors.push(ImportError {
                        line,
                        field: None,
                        error: format!("CSV parse error: {}", e),
                    });
                    continue;
                }
            };

            let student_id = record.get(0).unwrap_or("").to_string();
            let first_name = record.get(1).unwrap_or("").to_string();
            let last_name = record.get(2).unwrap_or("").to_string();
            let email = record.get(3).unwrap_or("").to_string();
            let date_of_birth_str = record.get(4).unwrap_or("");
            let year_group_str = record.get(5).unwrap_or("");

            let date_of_birth = match NaiveDate::parse_from_str(date_of_birth_str, "%Y-%m-%d") {
                Ok(d) => d,
                Err(e) => {
                    errors.push(ImportError {
                        line,
                        field: Some("date_of_birth".to_string()),
                        error: format!("Invalid date: {}", e),
                    });
                    continue;
                }
            };

            let year_group = match year_group_str.parse::<i32>() {
                Ok(y) => y,
                Err(e) => {
                    errors.push(ImportError {
                        line,
                        field: Some("year_group".to_string()),
                        error: format!("Invalid year group: {}", e),
                    });
                    continue;
                }
            };

            if options.dry_run {
                imported += 1;
                continue;
            }

            match self
                .service
                .create_student(
                    student_id,
                    first_name,
                    last_name,
                    email,
                    date_of_birth,
                    year_group,
                )
                .await
            {
                Ok(_) => imported += 1,
                Err(e) if e.kind() == ErrorKind::Conflict && options.skip_duplicates => {
                    skipped += 1;
                }
                Err(e) => {
                    errors.push(ImportError {
                        line,
                        field: None,
                        error: format!("Student creation failed: {}", e),
                    });
                }
            }
        }

        Ok(ImportResult {
            imported,
            skipped,
            errors,
        })
    }

    /// Import enrollments from CSV with columns:
    /// student_id, module_code, grade_percentage (optional)
    pub async fn import_enrollments_csv<R: Read>(
        &self,
        reader: R,
        options: ImportOptions,
    ) -> Result<ImportResult> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut imported = 0;
        let mut skipped = 0;
        let mut errors = Vec::new();

        for (line_num, result) in csv_reader.records().enumerate() {
            let line = line_num + 2;

            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    errors.push(ImportError {
                        line,
                        field: None,
                        error: format!("CSV parse error: {}", e),
                    });
                    continue;
                }
            };

            let student_id = record.get(0).unwrap_or("");
            let module_code = record.get(1).unwrap_or("");
            let grade_str = record.get(2).unwrap_or("");

            let grade = if grade_str.is_empty() {
                None
            } else {
                match Decimal::from_str(grade_str) {
                    Ok(g) => Some(g),
                    Err(e) => {
                        errors.push(ImportError {
                            line,
                            field: Some("grade_percentage".to_string()),
                            error: format!("Invalid grade: {}", e),
                        });
                        continue;
                    }
                }
            };

            let module = match self.service.get_module_by_code(module_code).await {
                Ok(m) => m,
                Err(e) => {
                    errors.push(ImportError {
                        line,
                        field: Some("module_code".to_string()),
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            if options.dry_run {
                imported += 1;
                continue;
            }

            match self.service.enroll(student_id, module.id, grade).await {
                Ok(_) => imported += 1,
                Err(e) if e.kind() == ErrorKind::Conflict && options.skip_duplicates => {
                    skipped += 1;
                }
                Err(e) => {
                    errors.push(ImportError {
                        line,
                        field: None,
                        error: format!("Enrollment failed: {}", e),
                    });
                }
            }
        }

        Ok(ImportResult {
            imported,
            skipped,
            errors,
        })
    }
}
