use std::collections::HashSet;

use super::{grade_in_range, Enrollment, Module, ModuleId, Student, StudentId};

/// Count enrollments whose student or module reference points nowhere.
/// A non-zero result means a cascade delete was skipped or interrupted.
pub fn count_orphaned_enrollments(
    students: &[Student],
    modules: &[Module],
    enrollments: &[Enrollment],
) -> usize {
    let student_ids: HashSet<&str> = students.iter().map(|s| s.student_id.as_str()).collect();
    let module_ids: HashSet<ModuleId> = modules.iter().map(|m| m.id).collect();

    enrollments
        .iter()
        .filter(|e| {
            !student_ids.contains(e.student_id.as_str()) || !module_ids.contains(&e.module_id)
        })
        .count()
}

/// Find (student, module) pairs that appear more than once.
pub fn duplicate_pairs(enrollments: &[Enrollment]) -> Vec<(StudentId, ModuleId)> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();

    for enrollment in enrollments {
        let pair = (enrollment.student_id.clone(), enrollment.module_id);
        if !seen.insert(pair.clone()) && !duplicates.contains(&pair) {
            duplicates.push(pair);
        }
    }

    duplicates
}

/// Count grades outside the 0..=100 percentage range.
pub fn count_out_of_range_grades(enrollments: &[Enrollment]) -> usize {
    enrollments
        .iter()
        .filter_map(|e| e.grade_percentage)
        .filter(|g| !grade_in_range(*g))
        .count()
}

/// Result of a full-ledger consistency scan.
#[derive(Debug, Clone)]
pub struct RegistryReport {
    pub student_count: usize,
    pub module_count: usize,
    pub enrollment_count: usize,
    pub orphaned_enrollments: usize,
    pub duplicate_pairs: Vec<(StudentId, ModuleId)>,
    pub out_of_range_grades: usize,
}

impl RegistryReport {
    pub fn is_consistent(&self) -> bool {
        self.orphaned_enrollments == 0
            && self.duplicate_pairs.is_empty()
            && self.out_of_range_grades == 0
    }

    /// Human-readable list of problems, empty when consistent.
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.orphaned_enrollments > 0 {
            issues.push(format!(
                "{} enrollment(s) reference a missing student or module",
                self.orphaned_enrollments
            ));
        }
        for (student_id, module_id) in &self.duplicate_pairs {
            issues.push(format!(
                "duplicate enrollment for student {} in module {}",
                student_id, module_id
            ));
        }
        if self.out_of_range_grades > 0 {
            issues.push(format!(
                "{} grade(s) outside the 0..=100 range",
                self.out_of_range_grades
            ));
        }
        issues
    }
}

/// Build a consistency report from full entity listings.
pub fn build_registry_report(
    students: &[Student],
    modules: &[Module],
    enrollments: &[Enrollment],
) -> RegistryReport {
    RegistryReport {
        student_count: students.len(),
        module_count: modules.len(),
        enrollment_count: enrollments.len(),
        orphaned_enrollments: count_orphaned_enrollments(students, modules, enrollments),
        duplicate_pairs: duplicate_pairs(enrollments),
        out_of_range_grades: count_out_of_range_grades(enrollments),
    }
}
