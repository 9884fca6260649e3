// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::NaiveDate;
use rollbook::application::LedgerService;
use rollbook::domain::Module;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into NaiveDate
pub fn parse_date(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

/// Test fixture: standard roster setup
pub struct SampleRoster;

impl SampleRoster {
    /// Create two students: "123456789" (Ada) and "987654321" (Grace)
    pub async fn create_students(service: &LedgerService) -> Result<()> {
        service
            .create_student(
                "123456789".into(),
                "Ada".into(),
                "Lovelace".into(),
                "ada@example.com".into(),
                parse_date("2008-12-10"),
                9,
            )
            .await?;
        service
            .create_student(
                "987654321".into(),
                "Grace".into(),
                "Hopper".into(),
                "grace@example.com".into(),
                parse_date("2007-12-09"),
                10,
            )
            .await?;
        Ok(())
    }

    /// Create two modules and return them: CS101 and CS301
    pub async fn create_modules(service: &LedgerService) -> Result<(Module, Module)> {
        let cs101 = service
            .create_module(
                "Programming Fundamentals".into(),
                "CS101".into(),
                "Variables, loops, functions".into(),
            )
            .await?;
        let cs301 = service
            .create_module(
                "Algorithms".into(),
                "CS301".into(),
                "Sorting, searching, graphs".into(),
            )
            .await?;
        Ok((cs101, cs301))
    }
}
