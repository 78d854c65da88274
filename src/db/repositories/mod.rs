mod account_repository;
mod assignment_repository;
mod certificate_repository;
mod enrollment_repository;
mod task_result_repository;

#[cfg(test)]
pub mod memory;

pub use account_repository::{AccountRepository, PgAccountRepository};
pub use assignment_repository::{AssignmentRepository, PgAssignmentRepository};
pub use certificate_repository::{CertificateRepository, PgCertificateRepository};
pub use enrollment_repository::{EnrollmentRepository, PgEnrollmentRepository};
pub use task_result_repository::{PgTaskResultRepository, TaskResultRepository};
