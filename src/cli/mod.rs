use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::application::LedgerService;
use crate::domain::{EnrollmentStatus, EnrollmentUpdate, Module, ModuleUpdate, StudentUpdate};

/// Rollbook - Student Enrollment Ledger
#[derive(Parser)]
#[command(name = "rollbook")]
#[command(about = "A local-first student/module enrollment record keeper")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "rollbook.db")]
    pub database: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Student record commands
    #[command(subcommand)]
    Student(StudentCommands),

    /// Module record commands
    #[command(subcommand)]
    Module(ModuleCommands),

    /// Enroll a student in a module
    Enroll {
        /// Student identifier
        student: String,

        /// Module id or module code (e.g. "3" or "CS101")
        module: String,

        /// Initial grade percentage (e.g. "85" or "72.50")
        #[arg(short, long)]
        grade: Option<String>,
    },

    /// Remove a student's enrollment in a module
    Unenroll {
        /// Student identifier
        student: String,

        /// Module id or module code
        module: String,
    },

    /// Update an enrollment's grade and/or status
    Grade {
        /// Student identifier
        student: String,

        /// Module id or module code
        module: String,

        /// Grade percentage (e.g. "85" or "72.50")
        #[arg(short, long)]
        grade: Option<String>,

        /// Enrollment status: active, completed, dropped
        #[arg(short, long)]
        status: Option<String>,
    },

    /// List enrollments with student and module names
    Enrollments {
        /// Filter by student identifier
        #[arg(long)]
        student: Option<String>,

        /// Filter by module id or code
        #[arg(long)]
        module: Option<String>,
    },

    /// Verify ledger consistency
    Check,

    /// Export records (students, modules, enrollments, full)
    Export {
        /// What to export: students, modules, enrollments, full
        export_type: String,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Import records from CSV (students, enrollments)
    Import {
        /// What to import: students, enrollments
        import_type: String,

        /// Input file (defaults to stdin)
        #[arg(short, long)]
        input: Option<String>,

        /// Validate and report without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Skip rows that collide with existing records
        #[arg(long)]
        skip_duplicates: bool,
    },
}

#[derive(Subcommand)]
pub enum StudentCommands {
    /// Add a new student
    Add {
        /// Student identifier (e.g. "123456789")
        id: String,

        /// First name
        first_name: String,

        /// Last name
        last_name: String,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Date of birth (YYYY-MM-DD)
        #[arg(short, long)]
        date_of_birth: String,

        /// Year group (e.g. 9)
        #[arg(short, long)]
        year_group: i32,
    },

    /// Show a student and their enrollments
    Show {
        /// Student identifier
        id: String,
    },

    /// List all students
    List,

    /// Update a student's details (only the given fields change)
    Update {
        /// Student identifier
        id: String,

        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        /// Date of birth (YYYY-MM-DD)
        #[arg(long)]
        date_of_birth: Option<String>,

        #[arg(long)]
        year_group: Option<i32>,
    },

    /// Remove a student and all their enrollments
    Remove {
        /// Student identifier
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ModuleCommands {
    /// Add a new module
    Add {
        /// Module title (e.g. "Algorithms")
        title: String,

        /// Unique module code (e.g. "CS301")
        code: String,

        /// Free-text description
        #[arg(long, default_value = "")]
        description: String,
    },

    /// Show a module and its enrollment headcount
    Show {
        /// Module id or module code
        module: String,
    },

    /// List all modules
    List,

    /// Update a module's details (only the given fields change)
    Update {
        /// Module id or module code
        module: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        code: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Remove a module and all enrollments in it
    Remove {
        /// Module id or module code
        module: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                LedgerService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Student(student_cmd) => {
                let service = LedgerService::connect(&self.database).await?;
                run_student_command(&service, student_cmd).await?;
            }

            Commands::Module(module_cmd) => {
                let service = LedgerService::connect(&self.database).await?;
                run_module_command(&service, module_cmd).await?;
            }

            Commands::Enroll {
                student,
                module,
                grade,
            } => {
                let service = LedgerService::connect(&self.database).await?;
                let module = resolve_module(&service, &module).await?;
                let grade = grade.map(|g| parse_grade(&g)).transpose()?;

                let enrollment = service.enroll(&student, module.id, grade).await?;
                match enrollment.grade_percentage {
                    Some(g) => println!(
                        "Enrolled {} in {} [{}] with grade {}",
                        student, module.title, module.module_code, g
                    ),
                    None => println!(
                        "Enrolled {} in {} [{}]",
                        student, module.title, module.module_code
                    ),
                }
            }

            Commands::Unenroll { student, module } => {
                let service = LedgerService::connect(&self.database).await?;
                let module = resolve_module(&service, &module).await?;

                service.unenroll(&student, module.id).await?;
                println!(
                    "Unenrolled {} from {} [{}]",
                    student, module.title, module.module_code
                );
            }

            Commands::Grade {
                student,
                module,
                grade,
                status,
            } => {
                let service = LedgerService::connect(&self.database).await?;
                let module = resolve_module(&service, &module).await?;

                let update = EnrollmentUpdate {
                    grade_percentage: grade.map(|g| parse_grade(&g)).transpose()?,
                    status: status.map(|s| parse_status(&s)).transpose()?,
                };

                let enrollment = service.update_enrollment(&student, module.id, update).await?;
                println!(
                    "Updated enrollment: {} in {} (grade: {}, status: {})",
                    student,
                    module.module_code,
                    enrollment
                        .grade_percentage
                        .map(|g| g.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    enrollment.status
                );
            }

            Commands::Enrollments { student, module } => {
                let service = LedgerService::connect(&self.database).await?;
                run_enrollments_command(&service, student, module).await?;
            }

            Commands::Check => {
                let service = LedgerService::connect(&self.database).await?;
                run_check_command(&service).await?;
            }

            Commands::Export {
                export_type,
                output,
            } => {
                let service = LedgerService::connect(&self.database).await?;
                run_export_command(&service, &export_type, output.as_deref()).await?;
            }

            Commands::Import {
                import_type,
                input,
                dry_run,
                skip_duplicates,
            } => {
                let service = LedgerService::connect(&self.database).await?;
                run_import_command(
                    &service,
                    &import_type,
                    input.as_deref(),
                    dry_run,
                    skip_duplicates,
                )
                .await?;
            }
        }

        Ok(())
    }
}

async fn run_student_command(service: &LedgerService, cmd: StudentCommands) -> Result<()> {
    match cmd {
        StudentCommands::Add {
            id,
            first_name,
            last_name,
            email,
            date_of_birth,
            year_group,
        } => {
            let date_of_birth = parse_date(&date_of_birth)?;
            let student = service
                .create_student(id, first_name, last_name, email, date_of_birth, year_group)
                .await?;
            println!(
                "Added student: {} ({})",
                student.display_name(),
                student.student_id
            );
        }

        StudentCommands::Show { id } => {
            let info = service.get_student_info(&id).await?;
            let student = &info.student;

            println!("Student: {}", student.display_name());
            println!("  ID:            {}", student.student_id);
            println!("  Email:         {}", student.email);
            println!("  Date of birth: {}", student.date_of_birth);
            println!("  Year group:    {}", student.year_group);
            println!();
            if info.enrollments.is_empty() {
                println!("  No enrollments.");
            } else {
                println!("  Enrollments:");
                for record in &info.enrollments {
                    let grade = record
                        .enrollment
                        .grade_percentage
                        .map(|g| g.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "    {:<8} {:<30} grade: {:<8} status: {} (since {})",
                        record.module_code,
                        record.module_title,
                        grade,
                        record.enrollment.status,
                        record.enrollment.date_enrolled
                    );
                }
            }
        }

        StudentCommands::List => {
            let students = service.list_students().await?;
            if students.is_empty() {
                println!("No students found.");
            } else {
                println!(
                    "{:<14} {:<25} {:<30} {:<12} {}",
                    "ID", "NAME", "EMAIL", "BORN", "YEAR"
                );
                println!("{}", "-".repeat(90));
                for student in students {
                    println!(
                        "{:<14} {:<25} {:<30} {:<12} {}",
                        student.student_id,
                        student.display_name(),
                        student.email,
                        student.date_of_birth.to_string(),
                        student.year_group
                    );
                }
            }
        }

        StudentCommands::Update {
            id,
            first_name,
            last_name,
            email,
            date_of_birth,
            year_group,
        } => {
            let update = StudentUpdate {
                first_name,
                last_name,
                email,
                date_of_birth: date_of_birth.map(|d| parse_date(&d)).transpose()?,
                year_group,
            };

            let student = service.update_student(&id, update).await?;
            println!(
                "Updated student: {} ({})",
                student.display_name(),
                student.student_id
            );
        }

        StudentCommands::Remove { id } => {
            service.delete_student(&id).await?;
            println!("Removed student {} and their enrollments", id);
        }
    }
    Ok(())
}

async fn run_module_command(service: &LedgerService, cmd: ModuleCommands) -> Result<()> {
    match cmd {
        ModuleCommands::Add {
            title,
            code,
            description,
        } => {
            let module = service.create_module(title, code, description).await?;
            println!(
                "Added module: {} [{}] (id {})",
                module.title, module.module_code, module.id
            );
        }

        ModuleCommands::Show { module } => {
            let module = resolve_module(service, &module).await?;
            let info = service.get_module_info(module.id).await?;

            println!("Module: {}", info.module.title);
            println!("  ID:          {}", info.module.id);
            println!("  Code:        {}", info.module.module_code);
            if !info.module.description.is_empty() {
                println!("  Description: {}", info.module.description);
            }
            println!("  Enrollments: {}", info.enrollment_count);
            println!(
                "  Currently enrolled: {}",
                if info.currently_enrolled { "yes" } else { "no" }
            );
        }

        ModuleCommands::List => {
            let modules = service.list_modules().await?;
            if modules.is_empty() {
                println!("No modules found.");
            } else {
                println!("{:<6} {:<10} {}", "ID", "CODE", "TITLE");
                println!("{}", "-".repeat(50));
                for module in modules {
                    println!(
                        "{:<6} {:<10} {}",
                        module.id, module.module_code, module.title
                    );
                }
            }
        }

        ModuleCommands::Update {
            module,
            title,
            code,
            description,
        } => {
            let module = resolve_module(service, &module).await?;
            let update = ModuleUpdate {
                title,
                module_code: code,
                description,
            };

            let module = service.update_module(module.id, update).await?;
            println!("Updated module: {} [{}]", module.title, module.module_code);
        }

        ModuleCommands::Remove { module } => {
            let module = resolve_module(service, &module).await?;
            service.delete_module(module.id).await?;
            println!(
                "Removed module {} [{}] and its enrollments",
                module.title, module.module_code
            );
        }
    }
    Ok(())
}

async fn run_enrollments_command(
    service: &LedgerService,
    student: Option<String>,
    module: Option<String>,
) -> Result<()> {
    let module_id = match module {
        Some(m) => Some(resolve_module(service, &m).await?.id),
        None => None,
    };

    let records = service.list_enrollments(student.as_deref(), module_id).await?;

    if records.is_empty() {
        println!("No enrollments found.");
        return Ok(());
    }

    println!(
        "{:<14} {:<25} {:<10} {:<30} {:<12} {:<8} {}",
        "STUDENT ID", "STUDENT", "CODE", "MODULE", "ENROLLED", "GRADE", "STATUS"
    );
    println!("{}", "-".repeat(110));
    for record in records {
        let grade = record
            .enrollment
            .grade_percentage
            .map(|g| g.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<14} {:<25} {:<10} {:<30} {:<12} {:<8} {}",
            record.enrollment.student_id,
            record.student_name,
            record.module_code,
            record.module_title,
            record.enrollment.date_enrolled.to_string(),
            grade,
            record.enrollment.status
        );
    }

    Ok(())
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    let report = service.check_registry().await?;

    println!("Ledger consistency check");
    println!("  Students:    {}", report.student_count);
    println!("  Modules:     {}", report.module_count);
    println!("  Enrollments: {}", report.enrollment_count);
    println!();

    if report.is_consistent() {
        println!("OK: no problems found.");
    } else {
        println!("PROBLEMS FOUND:");
        for issue in report.issues() {
            println!("  - {}", issue);
        }
        anyhow::bail!("ledger is inconsistent");
    }

    Ok(())
}

async fn run_export_command(
    service: &LedgerService,
    export_type: &str,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{stdout, Write};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    let count = match export_type {
        "students" => exporter.export_students_csv(writer).await?,
        "modules" => exporter.export_modules_csv(writer).await?,
        "enrollments" => exporter.export_enrollments_csv(writer).await?,
        "full" => {
            let snapshot = exporter.export_full_json(writer).await?;
            snapshot.students.len() + snapshot.modules.len() + snapshot.enrollments.len()
        }
        other => anyhow::bail!(
            "Unknown export type '{}'. Use: students, modules, enrollments, full",
            other
        ),
    };

    if let Some(path) = output {
        eprintln!("Exported {} record(s) to {}", count, path);
    }

    Ok(())
}

async fn run_import_command(
    service: &LedgerService,
    import_type: &str,
    input: Option<&str>,
    dry_run: bool,
    skip_duplicates: bool,
) -> Result<()> {
    use crate::io::{ImportOptions, Importer};
    use std::fs::File;
    use std::io::{stdin, Read};

    let importer = Importer::new(service);
    let options = ImportOptions {
        dry_run,
        skip_duplicates,
    };

    let reader: Box<dyn Read> = match input {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open input file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdin()),
    };

    let result = match import_type {
        "students" => importer.import_students_csv(reader, options).await?,
        "enrollments" => importer.import_enrollments_csv(reader, options).await?,
        other => anyhow::bail!("Unknown import type '{}'. Use: students, enrollments", other),
    };

    if dry_run {
        println!("Dry run: {} record(s) would be imported", result.imported);
    } else {
        println!(
            "Imported {} record(s), skipped {}",
            result.imported, result.skipped
        );
    }

    if !result.errors.is_empty() {
        println!("{} error(s):", result.errors.len());
        for error in &result.errors {
            match &error.field {
                Some(field) => println!("  line {}, {}: {}", error.line, field, error.error),
                None => println!("  line {}: {}", error.line, error.error),
            }
        }
    }

    Ok(())
}

/// Accept either a numeric module id or a module code.
async fn resolve_module(service: &LedgerService, module: &str) -> Result<Module> {
    let module = match module.parse::<i64>() {
        Ok(id) => service.get_module(id).await?,
        Err(_) => service.get_module_by_code(module).await?,
    };
    Ok(module)
}

fn parse_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", date_str))
}

fn parse_grade(grade_str: &str) -> Result<Decimal> {
    Decimal::from_str(grade_str)
        .with_context(|| format!("Invalid grade '{}'. Use '85' or '72.50'", grade_str))
}

fn parse_status(status_str: &str) -> Result<EnrollmentStatus> {
    EnrollmentStatus::from_str(status_str).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid status '{}'. Valid statuses: active, completed, dropped",
            status_str
        )
    })
}
