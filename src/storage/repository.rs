use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use sqlx::Row;

use crate::domain::{Enrollment, EnrollmentId, EnrollmentStatus, Module, ModuleId, Student};

use super::MIGRATION_001_INITIAL;

/// Outcome of a write guarded by a uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    /// The row would violate a UNIQUE constraint (duplicate student id,
    /// module code, or (student, module) pair). Nothing was written.
    DuplicateKey,
}

/// An enrollment denormalized with the referenced student's display name
/// and module title, for read convenience in listings.
#[derive(Debug, Clone)]
pub struct EnrollmentRecord {
    pub enrollment: Enrollment,
    pub student_name: String,
    pub module_title: String,
    pub module_code: String,
}

/// Repository for persisting and querying students, modules and enrollments.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    /// Foreign keys are enabled on every connection; cascade deletes are
    /// still issued explicitly so the invariant doesn't depend on the pragma.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .context("Invalid database URL")?
            .foreign_keys(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;

        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Student operations
    // ========================

    /// Insert a new student. The primary key constraint on student_id is the
    /// authoritative duplicate guard.
    pub async fn save_student(&self, student: &Student) -> Result<WriteOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO students (student_id, first_name, last_name, email, date_of_birth, year_group)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&student.student_id)
        .bind(&student.first_name)
        .bind(&student.last_name)
        .bind(&student.email)
        .bind(student.date_of_birth.to_string())
        .bind(student.year_group)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(WriteOutcome::Applied),
            Err(e) if is_unique_violation(&e) => Ok(WriteOutcome::DuplicateKey),
            Err(e) => Err(e).context("Failed to save student"),
        }
    }

    /// Get a student by identifier.
    pub async fn get_student(&self, student_id: &str) -> Result<Option<Student>> {
        let row = sqlx::query(
            r#"
            SELECT student_id, first_name, last_name, email, date_of_birth, year_group
            FROM students
            WHERE student_id = ?
            "#,
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch student")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_student(&row)?)),
            None => Ok(None),
        }
    }

    /// List all students in insertion order.
    pub async fn list_students(&self) -> Result<Vec<Student>> {
        let rows = sqlx::query(
            r#"
            SELECT student_id, first_name, last_name, email, date_of_birth, year_group
            FROM students
            ORDER BY rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list students")?;

        rows.iter().map(Self::row_to_student).collect()
    }

    /// Write all mutable fields of an existing student. The id never changes.
    pub async fn update_student(&self, student: &Student) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE students
            SET first_name = ?, last_name = ?, email = ?, date_of_birth = ?, year_group = ?
            WHERE student_id = ?
            "#,
        )
        .bind(&student.first_name)
        .bind(&student.last_name)
        .bind(&student.email)
        .bind(student.date_of_birth.to_string())
        .bind(student.year_group)
        .bind(&student.student_id)
        .execute(&self.pool)
        .await
        .context("Failed to update student")?;
        Ok(())
    }

    /// Delete a student and all of its enrollments in one transaction.
    /// Returns false if no such student existed.
    pub async fn delete_student(&self, student_id: &str) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        sqlx::query("DELETE FROM enrollments WHERE student_id = ?")
            .bind(student_id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete student enrollments")?;

        let result = sqlx::query("DELETE FROM students WHERE student_id = ?")
            .bind(student_id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete student")?;

        tx.commit().await.context("Failed to commit delete")?;
        Ok(result.rows_affected() > 0)
    }

    fn row_to_student(row: &sqlx::sqlite::SqliteRow) -> Result<Student> {
        let date_of_birth_str: String = row.get("date_of_birth");

        Ok(Student {
            student_id: row.get("student_id"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            email: row.get("email"),
            date_of_birth: NaiveDate::parse_from_str(&date_of_birth_str, "%Y-%m-%d")
                .context("Invalid date_of_birth")?,
            year_group: row.get("year_group"),
        })
    }

    // ========================
    // Module operations
    // ========================

    /// Insert a new module and assign its surrogate id.
    /// The UNIQUE constraint on module_code is the authoritative guard.
    pub async fn save_module(&self, module: &mut Module) -> Result<WriteOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO modules (title, module_code, description)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&module.title)
        .bind(&module.module_code)
        .bind(&module.description)
        .execute(&self.pool)
        .await;

        match result {
            Ok(r) => {
                module.id = r.last_insert_rowid();
                Ok(WriteOutcome::Applied)
            }
            Err(e) if is_unique_violation(&e) => Ok(WriteOutcome::DuplicateKey),
            Err(e) => Err(e).context("Failed to save module"),
        }
    }

    /// Get a module by surrogate id.
    pub async fn get_module(&self, id: ModuleId) -> Result<Option<Module>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, module_code, description
            FROM modules
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch module")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_module(&row)?)),
            None => Ok(None),
        }
    }

    /// Get a module by its unique code.
    pub async fn get_module_by_code(&self, module_code: &str) -> Result<Option<Module>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, module_code, description
            FROM modules
            WHERE module_code = ?
            "#,
        )
        .bind(module_code)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch module by code")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_module(&row)?)),
            None => Ok(None),
        }
    }

    /// List all modules in insertion order.
    pub async fn list_modules(&self) -> Result<Vec<Module>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, module_code, description
            FROM modules
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list modules")?;

        rows.iter().map(Self::row_to_module).collect()
    }

    /// Write all mutable fields of an existing module. A code change can
    /// collide with another module's code, so this reports DuplicateKey too.
    pub async fn update_module(&self, module: &Module) -> Result<WriteOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE modules
            SET title = ?, module_code = ?, description = ?
            WHERE id = ?
            "#,
        )
        .bind(&module.title)
        .bind(&module.module_code)
        .bind(&module.description)
        .bind(module.id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(WriteOutcome::Applied),
            Err(e) if is_unique_violation(&e) => Ok(WriteOutcome::DuplicateKey),
            Err(e) => Err(e).context("Failed to update module"),
        }
    }

    /// Delete a module and all of its enrollments in one transaction.
    /// Returns false if no such module existed.
    pub async fn delete_module(&self, id: ModuleId) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        sqlx::query("DELETE FROM enrollments WHERE module_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete module enrollments")?;

        let result = sqlx::query("DELETE FROM modules WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete module")?;

        tx.commit().await.context("Failed to commit delete")?;
        Ok(result.rows_affected() > 0)
    }

    fn row_to_module(row: &sqlx::sqlite::SqliteRow) -> Result<Module> {
        Ok(Module {
            id: row.get("id"),
            title: row.get("title"),
            module_code: row.get("module_code"),
            description: row.get("description"),
        })
    }

    // ========================
    // Enrollment operations
    // ========================

    /// Insert a new enrollment and assign its surrogate id.
    ///
    /// The existence check and the insert run in a single transaction, and
    /// the UNIQUE(student_id, module_id) index backs the check: two racing
    /// inserts for the same pair cannot both succeed.
    pub async fn save_enrollment(&self, enrollment: &mut Enrollment) -> Result<WriteOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let existing = sqlx::query(
            "SELECT 1 FROM enrollments WHERE student_id = ? AND module_id = ?",
        )
        .bind(&enrollment.student_id)
        .bind(enrollment.module_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to check for existing enrollment")?;

        if existing.is_some() {
            return Ok(WriteOutcome::DuplicateKey);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO enrollments (student_id, module_id, date_enrolled, grade_percentage, status)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&enrollment.student_id)
        .bind(enrollment.module_id)
        .bind(enrollment.date_enrolled.to_string())
        .bind(enrollment.grade_percentage.map(|g| g.to_string()))
        .bind(enrollment.status.as_str())
        .execute(&mut *tx)
        .await;

        match result {
            Ok(r) => {
                enrollment.id = r.last_insert_rowid();
                tx.commit().await.context("Failed to commit enrollment")?;
                Ok(WriteOutcome::Applied)
            }
            Err(e) if is_unique_violation(&e) => Ok(WriteOutcome::DuplicateKey),
            Err(e) => Err(e).context("Failed to save enrollment"),
        }
    }

    /// Get the enrollment for a (student, module) pair.
    pub async fn get_enrollment(
        &self,
        student_id: &str,
        module_id: ModuleId,
    ) -> Result<Option<Enrollment>> {
        let row = sqlx::query(
            r#"
            SELECT id, student_id, module_id, date_enrolled, grade_percentage, status
            FROM enrollments
            WHERE student_id = ? AND module_id = ?
            "#,
        )
        .bind(student_id)
        .bind(module_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch enrollment")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_enrollment(&row)?)),
            None => Ok(None),
        }
    }

    /// List all enrollments in insertion order.
    pub async fn list_enrollments(&self) -> Result<Vec<Enrollment>> {
        let rows = sqlx::query(
            r#"
            SELECT id, student_id, module_id, date_enrolled, grade_percentage, status
            FROM enrollments
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list enrollments")?;

        rows.iter().map(Self::row_to_enrollment).collect()
    }

    /// List enrollments joined with student name and module title,
    /// optionally filtered by student and/or module.
    pub async fn list_enrollment_records(
        &self,
        student_id: Option<&str>,
        module_id: Option<ModuleId>,
    ) -> Result<Vec<EnrollmentRecord>> {
        let mut query = String::from(
            r#"
            SELECT e.id, e.student_id, e.module_id, e.date_enrolled, e.grade_percentage, e.status,
                   s.first_name, s.last_name, m.title, m.module_code
            FROM enrollments e
            JOIN students s ON s.student_id = e.student_id
            JOIN modules m ON m.id = e.module_id
            WHERE 1=1
            "#,
        );

        if student_id.is_some() {
            query.push_str(" AND e.student_id = ?");
        }
        if module_id.is_some() {
            query.push_str(" AND e.module_id = ?");
        }
        query.push_str(" ORDER BY e.id");

        let mut sql_query = sqlx::query(&query);
        if let Some(sid) = student_id {
            sql_query = sql_query.bind(sid);
        }
        if let Some(mid) = module_id {
            sql_query = sql_query.bind(mid);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list enrollment records")?;

        rows.iter()
            .map(|row| {
                let enrollment = Self::row_to_enrollment(row)?;
                let first_name: String = row.get("first_name");
                let last_name: String = row.get("last_name");
                Ok(EnrollmentRecord {
                    enrollment,
                    student_name: format!("{} {}", first_name, last_name),
                    module_title: row.get("title"),
                    module_code: row.get("module_code"),
                })
            })
            .collect()
    }

    /// Write the mutable fields (grade, status) of an existing enrollment.
    /// Identity and date_enrolled never change.
    pub async fn update_enrollment(&self, enrollment: &Enrollment) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE enrollments
            SET grade_percentage = ?, status = ?
            WHERE id = ?
            "#,
        )
        .bind(enrollment.grade_percentage.map(|g| g.to_string()))
        .bind(enrollment.status.as_str())
        .bind(enrollment.id)
        .execute(&self.pool)
        .await
        .context("Failed to update enrollment")?;
        Ok(())
    }

    /// Delete an enrollment by surrogate id. Returns false if absent.
    pub async fn delete_enrollment(&self, id: EnrollmentId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM enrollments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete enrollment")?;
        Ok(result.rows_affected() > 0)
    }

    /// Count all enrollments for a module.
    pub async fn count_enrollments_for_module(&self, module_id: ModuleId) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM enrollments WHERE module_id = ?")
            .bind(module_id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count enrollments")?;

        Ok(row.get("count"))
    }

    /// Count active enrollments for a module (drives the derived
    /// currently-enrolled flag).
    pub async fn count_active_enrollments_for_module(&self, module_id: ModuleId) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM enrollments
            WHERE module_id = ? AND status = 'active'
            "#,
        )
        .bind(module_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count active enrollments")?;

        Ok(row.get("count"))
    }

    fn row_to_enrollment(row: &sqlx::sqlite::SqliteRow) -> Result<Enrollment> {
        let date_enrolled_str: String = row.get("date_enrolled");
        let grade_str: Option<String> = row.get("grade_percentage");
        let status_str: String = row.get("status");

        Ok(Enrollment {
            id: row.get("id"),
            student_id: row.get("student_id"),
            module_id: row.get("module_id"),
            date_enrolled: NaiveDate::parse_from_str(&date_enrolled_str, "%Y-%m-%d")
                .context("Invalid date_enrolled")?,
            grade_percentage: grade_str
                .map(|s| Decimal::from_str(&s))
                .transpose()
                .context("Invalid grade_percentage")?,
            status: EnrollmentStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid enrollment status: {}", status_str))?,
        })
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
