mod common;

use anyhow::Result;
use common::{test_service, SampleRoster};
use rollbook::io::{Exporter, ImportOptions, Importer, RegistrySnapshot};
use rust_decimal::Decimal;
use std::str::FromStr;

#[tokio::test]
async fn test_export_students_csv() -> Result<()> {
    let (service, _temp) = test_service().await?;
    SampleRoster::create_students(&service).await?;

    let mut buffer = Vec::new();
    let count = Exporter::new(&service)
        .export_students_csv(&mut buffer)
        .await?;

    assert_eq!(count, 2);
    let output = String::from_utf8(buffer)?;
    let mut lines = output.lines();
    assert_eq!(
        lines.next().unwrap(),
        "student_id,first_name,last_name,email,date_of_birth,year_group"
    );
    assert!(output.contains("123456789,Ada,Lovelace,ada@example.com,2008-12-10,9"));

    Ok(())
}

#[tokio::test]
async fn test_export_enrollments_csv_is_denormalized() -> Result<()> {
    let (service, _temp) = test_service().await?;
    SampleRoster::create_students(&service).await?;
    let (cs101, _) = SampleRoster::create_modules(&service).await?;
    service
        .enroll("123456789", cs101.id, Some(Decimal::from_str("85")?))
        .await?;

    let mut buffer = Vec::new();
    let count = Exporter::new(&service)
        .export_enrollments_csv(&mut buffer)
        .await?;

    assert_eq!(count, 1);
    let output = String::from_utf8(buffer)?;
    assert!(output.contains("Ada Lovelace"));
    assert!(output.contains("Programming Fundamentals"));
    assert!(output.contains("85"));
    assert!(output.contains("active"));

    Ok(())
}

#[tokio::test]
async fn test_full_json_snapshot_round_trips() -> Result<()> {
    let (service, _temp) = test_service().await?;
    SampleRoster::create_students(&service).await?;
    let (cs101, _) = SampleRoster::create_modules(&service).await?;
    service.enroll("123456789", cs101.id, None).await?;

    let mut buffer = Vec::new();
    Exporter::new(&service).export_full_json(&mut buffer).await?;

    let snapshot: RegistrySnapshot = serde_json::from_slice(&buffer)?;
    assert_eq!(snapshot.students.len(), 2);
    assert_eq!(snapshot.modules.len(), 2);
    assert_eq!(snapshot.enrollments.len(), 1);
    assert_eq!(snapshot.enrollments[0].student_id, "123456789");

    Ok(())
}

#[tokio::test]
async fn test_import_students_csv() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let csv = "\
student_id,first_name,last_name,email,date_of_birth,year_group
111111111,Alan,Turing,alan@example.com,2008-06-23,9
222222222,Edsger,Dijkstra,edsger@example.com,2007-05-11,10
333333333,Bad,Row,bad@example.com,not-a-date,9
";

    let result = Importer::new(&service)
        .import_students_csv(csv.as_bytes(), ImportOptions::default())
        .await?;

    assert_eq!(result.imported, 2);
    assert_eq!(result.skipped, 0);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].line, 4);
    assert_eq!(result.errors[0].field.as_deref(), Some("date_of_birth"));

    assert_eq!(service.list_students().await?.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_import_students_dry_run_writes_nothing() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let csv = "\
student_id,first_name,last_name,email,date_of_birth,year_group
111111111,Alan,Turing,alan@example.com,2008-06-23,9
";

    let result = Importer::new(&service)
        .import_students_csv(
            csv.as_bytes(),
            ImportOptions {
                dry_run: true,
                ..Default::default()
            },
        )
        .await?;

    assert_eq!(result.imported, 1);
    assert!(service.list_students().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_import_students_skip_duplicates() -> Result<()> {
    let (service, _temp) = test_service().await?;
    SampleRoster::create_students(&service).await?;

    let csv = "\
student_id,first_name,last_name,email,date_of_birth,year_group
123456789,Ada,Lovelace,ada@example.com,2008-12-10,9
444444444,Barbara,Liskov,barbara@example.com,2008-11-07,9
";

    let result = Importer::new(&service)
        .import_students_csv(
            csv.as_bytes(),
            ImportOptions {
                skip_duplicates: true,
                ..Default::default()
            },
        )
        .await?;

    assert_eq!(result.imported, 1);
    assert_eq!(result.skipped, 1);
    assert!(result.errors.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_import_enrollments_by_module_code() -> Result<()> {
    let (service, _temp) = test_service().await?;
    SampleRoster::create_students(&service).await?;
    SampleRoster::create_modules(&service).await?;

    let csv = "\
student_id,module_code,grade_percentage
123456789,CS101,85
987654321,CS101,
123456789,CS999,70
";

    let result = Importer::new(&service)
        .import_enrollments_csv(csv.as_bytes(), ImportOptions::default())
        .await?;

    assert_eq!(result.imported, 2);
    assert_eq!(result.errors.len(), 1, "unknown module code is reported");
    assert_eq!(result.errors[0].field.as_deref(), Some("module_code"));

    let enrollments = service.list_raw_enrollments().await?;
    assert_eq!(enrollments.len(), 2);
    assert_eq!(
        enrollments[0].grade_percentage,
        Some(Decimal::from_str("85")?)
    );
    assert_eq!(enrollments[1].grade_percentage, None);

    Ok(())
}
