use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::domain::{
    build_registry_report, grade_in_range, Enrollment, EnrollmentUpdate, Module, ModuleId,
    ModuleUpdate, RegistryReport, Student, StudentUpdate,
};
use crate::storage::{EnrollmentRecord, Repository, WriteOutcome};

use super::AppError;

/// Longest student identifier observed in the wild; ids are opaque strings.
const MAX_STUDENT_ID_LEN: usize = 13;

/// The enrollment ledger: owns the student, module and enrollment collections
/// and enforces their consistency rules. This is the primary interface for
/// any client (CLI, import/export, a future API).
pub struct LedgerService {
    repo: Repository,
}

/// A student together with its enrollment records.
pub struct StudentInfo {
    pub student: Student,
    pub enrollments: Vec<EnrollmentRecord>,
}

/// A module together with its enrollment headcount.
pub struct ModuleInfo {
    pub module: Module,
    pub enrollment_count: i64,
    /// Derived: at least one active enrollment references this module.
    pub currently_enrolled: bool,
}

impl LedgerService {
    /// Create a new ledger service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Student operations
    // ========================

    /// Create a new student keyed by the supplied identifier.
    pub async fn create_student(
        &self,
        student_id: String,
        first_name: String,
        last_name: String,
        email: String,
        date_of_birth: NaiveDate,
        year_group: i32,
    ) -> Result<Student, AppError> {
        validate_student_id(&student_id)?;
        validate_required("first_name", &first_name)?;
        validate_required("last_name", &last_name)?;
        validate_email(&email)?;

        let student = Student::new(
            student_id,
            first_name,
            last_name,
            email,
            date_of_birth,
            year_group,
        );

        match self.repo.save_student(&student).await? {
            WriteOutcome::Applied => Ok(student),
            WriteOutcome::DuplicateKey => {
                Err(AppError::StudentAlreadyExists(student.student_id))
            }
        }
    }

    /// Get a student by identifier.
    pub async fn get_student(&self, student_id: &str) -> Result<Student, AppError> {
        self.repo
            .get_student(student_id)
            .await?
            .ok_or_else(|| AppError::StudentNotFound(student_id.to_string()))
    }

    /// Get a student together with its enrollment records.
    pub async fn get_student_info(&self, student_id: &str) -> Result<StudentInfo, AppError> {
        let student = self.get_student(student_id).await?;
        let enrollments = self
            .repo
            .list_enrollment_records(Some(student.student_id.as_str()), None)
            .await?;
        Ok(StudentInfo {
            student,
            enrollments,
        })
    }

    /// List all students in insertion order.
    pub async fn list_students(&self) -> Result<Vec<Student>, AppError> {
        Ok(self.repo.list_students().await?)
    }

    /// Apply a partial update to a student. Absent fields stay unchanged;
    /// the identifier itself is immutable.
    pub async fn update_student(
        &self,
        student_id: &str,
        update: StudentUpdate,
    ) -> Result<Student, AppError> {
        if let Some(first_name) = &update.first_name {
            validate_required("first_name", first_name)?;
        }
        if let Some(last_name) = &update.last_name {
            validate_required("last_name", last_name)?;
        }
        if let Some(email) = &update.email {
            validate_email(email)?;
        }

        let mut student = self.get_student(student_id).await?;
        if update.is_empty() {
            return Ok(student);
        }

        student.apply(update);
        self.repo.update_student(&student).await?;
        Ok(student)
    }

    /// Delete a student; all of its enrollments go with it, in one
    /// transaction.
    pub async fn delete_student(&self, student_id: &str) -> Result<(), AppError> {
        if self.repo.delete_student(student_id).await? {
            Ok(())
        } else {
            Err(AppError::StudentNotFound(student_id.to_string()))
        }
    }

    // ========================
    // Module operations
    // ========================

    /// Create a new module. The code must be unique across modules.
    pub async fn create_module(
        &self,
        title: String,
        module_code: String,
        description: String,
    ) -> Result<Module, AppError> {
        validate_required("title", &title)?;
        validate_required("module_code", &module_code)?;

        // Check first for a friendly error; the UNIQUE constraint decides.
        if self.repo.get_module_by_code(&module_code).await?.is_some() {
            return Err(AppError::DuplicateModuleCode(module_code));
        }

        let mut module = Module::new(title, module_code, description);
        match self.repo.save_module(&mut module).await? {
            WriteOutcome::Applied => Ok(module),
            WriteOutcome::DuplicateKey => Err(AppError::DuplicateModuleCode(module.module_code)),
        }
    }

    /// Get a module by surrogate id.
    pub async fn get_module(&self, id: ModuleId) -> Result<Module, AppError> {
        self.repo
            .get_module(id)
            .await?
            .ok_or(AppError::ModuleNotFound(id))
    }

    /// Get a module by its unique code.
    pub async fn get_module_by_code(&self, module_code: &str) -> Result<Module, AppError> {
        self.repo
            .get_module_by_code(module_code)
            .await?
            .ok_or_else(|| AppError::ModuleCodeNotFound(module_code.to_string()))
    }

    /// Get a module together with its enrollment headcount.
    pub async fn get_module_info(&self, id: ModuleId) -> Result<ModuleInfo, AppError> {
        let module = self.get_module(id).await?;
        let enrollment_count = self.repo.count_enrollments_for_module(id).await?;
        let active = self.repo.count_active_enrollments_for_module(id).await?;
        Ok(ModuleInfo {
            module,
            enrollment_count,
            currently_enrolled: active > 0,
        })
    }

    /// List all modules in insertion order.
    pub async fn list_modules(&self) -> Result<Vec<Module>, AppError> {
        Ok(self.repo.list_modules().await?)
    }

    /// Apply a partial update to a module. Absent fields stay unchanged.
    pub async fn update_module(
        &self,
        id: ModuleId,
        update: ModuleUpdate,
    ) -> Result<Module, AppError> {
        if let Some(title) = &update.title {
            validate_required("title", title)?;
        }
        if let Some(module_code) = &update.module_code {
            validate_required("module_code", module_code)?;
        }

        let mut module = self.get_module(id).await?;
        if update.is_empty() {
            return Ok(module);
        }

        module.apply(update);
        match self.repo.update_module(&module).await? {
            WriteOutcome::Applied => Ok(module),
            WriteOutcome::DuplicateKey => Err(AppError::DuplicateModuleCode(module.module_code)),
        }
    }

    /// Delete a module; all of its enrollments go with it, in one
    /// transaction.
    pub async fn delete_module(&self, id: ModuleId) -> Result<(), AppError> {
        if self.repo.delete_module(id).await? {
            Ok(())
        } else {
            Err(AppError::ModuleNotFound(id))
        }
    }

    // ========================
    // Enrollment operations
    // ========================

    /// Enroll a student in a module, optionally with an initial grade.
    /// Rejected if the pair is already enrolled.
    pub async fn enroll(
        &self,
        student_id: &str,
        module_id: ModuleId,
        grade: Option<Decimal>,
    ) -> Result<Enrollment, AppError> {
        if let Some(grade) = grade {
            validate_grade(grade)?;
        }

        let student = self.get_student(student_id).await?;
        let module = self.get_module(module_id).await?;

        let mut enrollment = Enrollment::new(student.student_id, module.id);
        if let Some(grade) = grade {
            enrollment = enrollment.with_grade(grade);
        }

        match self.repo.save_enrollment(&mut enrollment).await? {
            WriteOutcome::Applied => Ok(enrollment),
            WriteOutcome::DuplicateKey => Err(AppError::AlreadyEnrolled {
                student_id: student_id.to_string(),
                module_id,
            }),
        }
    }

    /// Update an enrollment's grade and/or status, addressed by the
    /// (student, module) pair. The enrollment date never changes.
    pub async fn update_enrollment(
        &self,
        student_id: &str,
        module_id: ModuleId,
        update: EnrollmentUpdate,
    ) -> Result<Enrollment, AppError> {
        if let Some(grade) = update.grade_percentage {
            validate_grade(grade)?;
        }

        let student = self.get_student(student_id).await?;
        let module = self.get_module(module_id).await?;

        let mut enrollment = self
            .repo
            .get_enrollment(&student.student_id, module.id)
            .await?
            .ok_or_else(|| AppError::EnrollmentNotFound {
                student_id: student_id.to_string(),
                module_id,
            })?;

        if update.is_empty() {
            return Ok(enrollment);
        }

        enrollment.apply(update);
        self.repo.update_enrollment(&enrollment).await?;
        Ok(enrollment)
    }

    /// Remove a student's enrollment in a module. Returns the removed record.
    pub async fn unenroll(
        &self,
        student_id: &str,
        module_id: ModuleId,
    ) -> Result<Enrollment, AppError> {
        let student = self.get_student(student_id).await?;
        let module = self.get_module(module_id).await?;

        let enrollment = self
            .repo
            .get_enrollment(&student.student_id, module.id)
            .await?
            .ok_or_else(|| AppError::EnrollmentNotFound {
                student_id: student_id.to_string(),
                module_id,
            })?;

        self.repo.delete_enrollment(enrollment.id).await?;
        Ok(enrollment)
    }

    /// List enrollments denormalized with student names and module titles,
    /// optionally filtered by student and/or module.
    pub async fn list_enrollments(
        &self,
        student_id: Option<&str>,
        module_id: Option<ModuleId>,
    ) -> Result<Vec<EnrollmentRecord>, AppError> {
        // Resolve filters up front so a bad filter is NotFound, not empty.
        if let Some(sid) = student_id {
            self.get_student(sid).await?;
        }
        if let Some(mid) = module_id {
            self.get_module(mid).await?;
        }
        Ok(self.repo.list_enrollment_records(student_id, module_id).await?)
    }

    /// List raw enrollment rows (used by export and the consistency check).
    pub async fn list_raw_enrollments(&self) -> Result<Vec<Enrollment>, AppError> {
        Ok(self.repo.list_enrollments().await?)
    }

    // ========================
    // Integrity operations
    // ========================

    /// Scan the whole ledger and report consistency problems: orphaned
    /// enrollment references, duplicate pairs, out-of-range grades.
    pub async fn check_registry(&self) -> Result<RegistryReport, AppError> {
        let students = self.repo.list_students().await?;
        let modules = self.repo.list_modules().await?;
        let enrollments = self.repo.list_enrollments().await?;

        Ok(build_registry_report(&students, &modules, &enrollments))
    }
}

fn validate_student_id(student_id: &str) -> Result<(), AppError> {
    if student_id.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "student_id is required".to_string(),
        ));
    }
    if student_id.len() > MAX_STUDENT_ID_LEN {
        return Err(AppError::InvalidInput(format!(
            "student_id must be at most {} characters",
            MAX_STUDENT_ID_LEN
        )));
    }
    if student_id.chars().any(char::is_whitespace) {
        return Err(AppError::InvalidInput(
            "student_id must not contain whitespace".to_string(),
        ));
    }
    Ok(())
}

fn validate_required(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidInput(format!("{} is required", field)));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AppError> {
    validate_required("email", email)?;
    if !email.contains('@') {
        return Err(AppError::InvalidInput(format!(
            "not a valid email address: {}",
            email
        )));
    }
    Ok(())
}

fn validate_grade(grade: Decimal) -> Result<(), AppError> {
    if !grade_in_range(grade) {
        return Err(AppError::InvalidInput(format!(
            "grade must be between 0 and 100, got {}",
            grade
        )));
    }
    Ok(())
}
