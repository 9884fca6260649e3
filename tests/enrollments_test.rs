mod common;

use anyhow::Result;
use common::{test_service, SampleRoster};
use rollbook::application::{AppError, ErrorKind};
use rollbook::domain::{EnrollmentStatus, EnrollmentUpdate};
use rust_decimal::Decimal;
use std::str::FromStr;

fn grade(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

#[tokio::test]
async fn test_enrollment_scenario() -> Result<()> {
    let (service, _temp) = test_service().await?;
    SampleRoster::create_students(&service).await?;
    let (cs101, _) = SampleRoster::create_modules(&service).await?;

    // Enroll succeeds with null grade
    let enrollment = service.enroll("123456789", cs101.id, None).await?;
    assert_eq!(enrollment.grade_percentage, None);
    assert_eq!(enrollment.status, EnrollmentStatus::Active);

    // Enrolling the same pair again is a conflict
    let err = service.enroll("123456789", cs101.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::AlreadyEnrolled { .. }));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // Update the grade to 85
    let updated = service
        .update_enrollment(
            "123456789",
            cs101.id,
            EnrollmentUpdate {
                grade_percentage: Some(grade("85")),
                status: None,
            },
        )
        .await?;
    assert_eq!(updated.grade_percentage, Some(grade("85")));

    // Deleting the student removes the enrollment from the listing
    service.delete_student("123456789").await?;
    let records = service.list_enrollments(None, None).await?;
    assert!(records.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_enroll_twice_leaves_single_row() -> Result<()> {
    let (service, _temp) = test_service().await?;
    SampleRoster::create_students(&service).await?;
    let (cs101, _) = SampleRoster::create_modules(&service).await?;

    service.enroll("123456789", cs101.id, None).await?;
    let _ = service.enroll("123456789", cs101.id, None).await;

    assert_eq!(service.list_raw_enrollments().await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_enroll_missing_student_is_not_found() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let (cs101, _) = SampleRoster::create_modules(&service).await?;

    let err = service.enroll("999999999", cs101.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::StudentNotFound(_)));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // Referential precondition: no row was created
    assert!(service.list_raw_enrollments().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_enroll_missing_module_is_not_found() -> Result<()> {
    let (service, _temp) = test_service().await?;
    SampleRoster::create_students(&service).await?;

    let err = service.enroll("123456789", 42, None).await.unwrap_err();
    assert!(matches!(err, AppError::ModuleNotFound(42)));

    assert!(service.list_raw_enrollments().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_grade_out_of_range_is_invalid_input() -> Result<()> {
    let (service, _temp) = test_service().await?;
    SampleRoster::create_students(&service).await?;
    let (cs101, _) = SampleRoster::create_modules(&service).await?;

    let err = service
        .enroll("123456789", cs101.id, Some(grade("100.01")))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = service
        .enroll("123456789", cs101.id, Some(grade("-1")))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    // Validate-then-write
    assert!(service.list_raw_enrollments().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_grade_last_write_wins() -> Result<()> {
    let (service, _temp) = test_service().await?;
    SampleRoster::create_students(&service).await?;
    let (cs101, _) = SampleRoster::create_modules(&service).await?;

    service
        .enroll("123456789", cs101.id, Some(grade("60")))
        .await?;

    let updated = service
        .update_enrollment(
            "123456789",
            cs101.id,
            EnrollmentUpdate {
                grade_percentage: Some(grade("72.50")),
                status: None,
            },
        )
        .await?;

    assert_eq!(updated.grade_percentage, Some(grade("72.50")));

    Ok(())
}

#[tokio::test]
async fn test_status_update_preserves_grade_and_date() -> Result<()> {
    let (service, _temp) = test_service().await?;
    SampleRoster::create_students(&service).await?;
    let (cs101, _) = SampleRoster::create_modules(&service).await?;

    let original = service
        .enroll("123456789", cs101.id, Some(grade("91")))
        .await?;

    let updated = service
        .update_enrollment(
            "123456789",
            cs101.id,
            EnrollmentUpdate {
                grade_percentage: None,
                status: Some(EnrollmentStatus::Completed),
            },
        )
        .await?;

    assert_eq!(updated.status, EnrollmentStatus::Completed);
    assert_eq!(updated.grade_percentage, Some(grade("91")));
    assert_eq!(updated.date_enrolled, original.date_enrolled);

    Ok(())
}

#[tokio::test]
async fn test_empty_enrollment_update_is_identity() -> Result<()> {
    let (service, _temp) = test_service().await?;
    SampleRoster::create_students(&service).await?;
    let (cs101, _) = SampleRoster::create_modules(&service).await?;

    let before = service
        .enroll("123456789", cs101.id, Some(grade("55.25")))
        .await?;

    let after = service
        .update_enrollment("123456789", cs101.id, EnrollmentUpdate::default())
        .await?;

    assert_eq!(before, after);

    Ok(())
}

#[tokio::test]
async fn test_update_unenrolled_pair_is_not_found() -> Result<()> {
    let (service, _temp) = test_service().await?;
    SampleRoster::create_students(&service).await?;
    let (cs101, _) = SampleRoster::create_modules(&service).await?;

    let err = service
        .update_enrollment(
            "123456789",
            cs101.id,
            EnrollmentUpdate {
                grade_percentage: Some(grade("50")),
                status: None,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::EnrollmentNotFound { .. }));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    Ok(())
}

#[tokio::test]
async fn test_unenroll() -> Result<()> {
    let (service, _temp) = test_service().await?;
    SampleRoster::create_students(&service).await?;
    let (cs101, _) = SampleRoster::create_modules(&service).await?;

    service.enroll("123456789", cs101.id, None).await?;
    let removed = service.unenroll("123456789", cs101.id).await?;
    assert_eq!(removed.student_id, "123456789");
    assert!(service.list_raw_enrollments().await?.is_empty());

    // Second unenroll reports the missing enrollment
    let err = service.unenroll("123456789", cs101.id).await.unwrap_err();
    assert!(matches!(err, AppError::EnrollmentNotFound { .. }));

    // Unenroll checks student and module before the enrollment itself
    let err = service.unenroll("ghost", cs101.id).await.unwrap_err();
    assert!(matches!(err, AppError::StudentNotFound(_)));

    Ok(())
}

#[tokio::test]
async fn test_delete_student_cascades_enrollments() -> Result<()> {
    let (service, _temp) = test_service().await?;
    SampleRoster::create_students(&service).await?;
    let (cs101, cs301) = SampleRoster::create_modules(&service).await?;

    service.enroll("123456789", cs101.id, None).await?;
    service.enroll("123456789", cs301.id, None).await?;
    service.enroll("987654321", cs101.id, None).await?;

    service.delete_student("123456789").await?;

    let remaining = service.list_raw_enrollments().await?;
    assert_eq!(remaining.len(), 1);
    assert!(remaining.iter().all(|e| e.student_id != "123456789"));

    // Ledger stays consistent after the cascade
    let report = service.check_registry().await?;
    assert!(report.is_consistent());

    Ok(())
}

#[tokio::test]
async fn test_delete_module_cascades_enrollments() -> Result<()> {
    let (service, _temp) = test_service().await?;
    SampleRoster::create_students(&service).await?;
    let (cs101, cs301) = SampleRoster::create_modules(&service).await?;

    service.enroll("123456789", cs101.id, None).await?;
    service.enroll("987654321", cs101.id, None).await?;
    service.enroll("987654321", cs301.id, None).await?;

    service.delete_module(cs101.id).await?;

    let remaining = service.list_raw_enrollments().await?;
    assert_eq!(remaining.len(), 1);
    assert!(remaining.iter().all(|e| e.module_id != cs101.id));

    let report = service.check_registry().await?;
    assert!(report.is_consistent());

    Ok(())
}

#[tokio::test]
async fn test_listing_is_denormalized() -> Result<()> {
    let (service, _temp) = test_service().await?;
    SampleRoster::create_students(&service).await?;
    let (cs101, _) = SampleRoster::create_modules(&service).await?;

    service.enroll("123456789", cs101.id, None).await?;

    let records = service.list_enrollments(None, None).await?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].student_name, "Ada Lovelace");
    assert_eq!(records[0].module_title, "Programming Fundamentals");
    assert_eq!(records[0].module_code, "CS101");

    Ok(())
}

#[tokio::test]
async fn test_listing_filters() -> Result<()> {
    let (service, _temp) = test_service().await?;
    SampleRoster::create_students(&service).await?;
    let (cs101, cs301) = SampleRoster::create_modules(&service).await?;

    service.enroll("123456789", cs101.id, None).await?;
    service.enroll("123456789", cs301.id, None).await?;
    service.enroll("987654321", cs101.id, None).await?;

    let by_student = service.list_enrollments(Some("123456789"), None).await?;
    assert_eq!(by_student.len(), 2);

    let by_module = service.list_enrollments(None, Some(cs101.id)).await?;
    assert_eq!(by_module.len(), 2);

    let both = service
        .list_enrollments(Some("123456789"), Some(cs101.id))
        .await?;
    assert_eq!(both.len(), 1);

    // Unknown filter values are NotFound, not an empty listing
    let err = service
        .list_enrollments(Some("ghost"), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    Ok(())
}

#[tokio::test]
async fn test_module_info_headcount() -> Result<()> {
    let (service, _temp) = test_service().await?;
    SampleRoster::create_students(&service).await?;
    let (cs101, _) = SampleRoster::create_modules(&service).await?;

    let info = service.get_module_info(cs101.id).await?;
    assert_eq!(info.enrollment_count, 0);
    assert!(!info.currently_enrolled);

    service.enroll("123456789", cs101.id, None).await?;
    service.enroll("987654321", cs101.id, None).await?;
    service
        .update_enrollment(
            "987654321",
            cs101.id,
            EnrollmentUpdate {
                grade_percentage: None,
                status: Some(EnrollmentStatus::Dropped),
            },
        )
        .await?;

    let info = service.get_module_info(cs101.id).await?;
    assert_eq!(info.enrollment_count, 2);
    assert!(info.currently_enrolled, "one enrollment is still active");

    Ok(())
}

#[tokio::test]
async fn test_student_info_lists_enrollments() -> Result<()> {
    let (service, _temp) = test_service().await?;
    SampleRoster::create_students(&service).await?;
    let (cs101, cs301) = SampleRoster::create_modules(&service).await?;

    service
        .enroll("123456789", cs101.id, Some(grade("77")))
        .await?;
    service.enroll("123456789", cs301.id, None).await?;

    let info = service.get_student_info("123456789").await?;
    assert_eq!(info.enrollments.len(), 2);
    assert_eq!(info.enrollments[0].module_code, "CS101");
    assert_eq!(
        info.enrollments[0].enrollment.grade_percentage,
        Some(grade("77"))
    );

    Ok(())
}
