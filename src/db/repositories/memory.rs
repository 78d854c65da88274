//! In-memory repositories backing unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    AccountRepository, AssignmentRepository, CertificateRepository, EnrollmentRepository,
    TaskResultRepository,
};
use crate::db::models::*;
use crate::db::pagination::{Page, PageRequest};
use crate::db::DatabaseError;

#[derive(Default)]
struct Tables {
    accounts: Vec<Account>,
    programs: Vec<Program>,
    purchases: Vec<Purchase>,
    enrollments: Vec<Enrollment>,
    certificates: Vec<Certificate>,
    tasks: Vec<TaskResult>,
    bookmarks: Vec<Uuid>,
    activity: Vec<(Uuid, OffsetDateTime)>,
}

#[derive(Default)]
pub struct MemoryDb {
    tables: Mutex<Tables>,
    outages: Mutex<HashMap<&'static str, u32>>,
}

fn contains(haystack: Option<&str>, needle: &str) -> bool {
    haystack
        .map(|h| h.to_lowercase().contains(&needle.to_lowercase()))
        .unwrap_or(false)
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `times` calls to `operation` fail as if the pool timed out.
    pub fn fail_next(&self, operation: &'static str, times: u32) {
        self.outages.lock().unwrap().insert(operation, times);
    }

    fn check(&self, operation: &'static str) -> Result<(), DatabaseError> {
        let mut outages = self.outages.lock().unwrap();
        match outages.get_mut(operation) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(DatabaseError::Sqlx(sqlx::Error::PoolTimedOut))
            }
            _ => Ok(()),
        }
    }

    pub fn add_account(&self, email: Option<&str>, phone: Option<&str>, method: RegistrationMethod) -> Account {
        self.add_account_with_role(email, phone, method, AccountRole::Student)
    }

    pub fn add_account_with_role(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
        method: RegistrationMethod,
        role: AccountRole,
    ) -> Account {
        let now = OffsetDateTime::now_utc();
        let account = Account {
            id: Uuid::new_v4(),
            email: email.map(str::to_string),
            phone_number: phone.map(str::to_string),
            fullname: Some("Asha Rao".to_string()),
            role,
            registration_method: method,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().unwrap().accounts.push(account.clone());
        account
    }

    pub fn add_program(&self, title: &str) -> Program {
        let program = Program {
            id: Uuid::new_v4(),
            title: title.to_string(),
            subtitle: Some("Internship".to_string()),
            slug: title.to_lowercase().replace(' ', "-"),
            category: "engineering".to_string(),
        };
        self.tables.lock().unwrap().programs.push(program.clone());
        program
    }

    pub fn add_enrollment(&self, account: &Account, program: &Program, tier: PurchaseTier, completed: bool) -> Enrollment {
        let now = OffsetDateTime::now_utc();
        let purchase = Purchase {
            id: Uuid::new_v4(),
            account_id: account.id,
            program_id: program.id,
            amount_paid_cents: 499_900,
            tier,
            status: PurchaseStatus::Active,
            source: PurchaseSource::Payment,
            purchased_at: now,
            revoked_at: None,
        };
        let enrollment = Enrollment {
            id: Uuid::new_v4(),
            account_id: account.id,
            purchase_id: purchase.id,
            is_completed: completed,
            started_at: now,
            completed_at: completed.then_some(now),
        };
        let mut tables = self.tables.lock().unwrap();
        tables.purchases.push(purchase);
        tables.enrollments.push(enrollment.clone());
        enrollment
    }

    pub fn add_bookmark(&self, account_id: Uuid) {
        self.tables.lock().unwrap().bookmarks.push(account_id);
    }

    pub fn add_activity(&self, account_id: Uuid, at: OffsetDateTime) {
        self.tables.lock().unwrap().activity.push((account_id, at));
    }

    pub fn account(&self, id: Uuid) -> Option<Account> {
        self.tables.lock().unwrap().accounts.iter().find(|a| a.id == id).cloned()
    }

    pub fn certificates(&self, enrollment_id: Uuid) -> Vec<Certificate> {
        self.tables
            .lock()
            .unwrap()
            .certificates
            .iter()
            .filter(|c| c.enrollment_id == enrollment_id)
            .cloned()
            .collect()
    }

    pub fn enrollments_for(&self, account_id: Uuid) -> Vec<Enrollment> {
        self.tables
            .lock()
            .unwrap()
            .enrollments
            .iter()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect()
    }

    fn detail(tables: &Tables, enrollment: &Enrollment) -> Option<EnrollmentDetail> {
        let account = tables.accounts.iter().find(|a| a.id == enrollment.account_id)?;
        let purchase = tables.purchases.iter().find(|p| p.id == enrollment.purchase_id)?;
        let program = tables.programs.iter().find(|g| g.id == purchase.program_id)?;
        Some(EnrollmentDetail {
            enrollment: enrollment.clone(),
            account: account.clone(),
            program: program.clone(),
            tier: purchase.tier,
        })
    }

    fn overview_rows(tables: &Tables) -> Vec<CompletedEnrollmentRow> {
        let mut rows: Vec<CompletedEnrollmentRow> = tables
            .enrollments
            .iter()
            .filter(|e| e.is_completed)
            .filter_map(|e| Self::detail(tables, e))
            .map(|detail| {
                let certs: Vec<&Certificate> = tables
                    .certificates
                    .iter()
                    .filter(|c| c.enrollment_id == detail.enrollment.id)
                    .collect();
                let issued = certs.len() as i64;
                let sent = certs.iter().filter(|c| c.status == CertificateStatus::Sent).count() as i64;
                CompletedEnrollmentRow {
                    enrollment_id: detail.enrollment.id,
                    account_id: detail.account.id,
                    student_name: detail.account.fullname.clone(),
                    student_email: detail.account.email.clone(),
                    program_title: detail.program.title.clone(),
                    tier: detail.tier,
                    completed_at: detail.enrollment.completed_at,
                    verification_id: certs.first().map(|c| c.verification_id.clone()),
                    certificates_issued: issued,
                    certificates_sent: sent,
                    state: IssueState::from_counts(issued, sent),
                }
            })
            .collect();
        rows.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        rows
    }
}

#[async_trait]
impl AccountRepository for MemoryDb {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, DatabaseError> {
        Ok(self.account(id))
    }

    async fn find_by_phone(&self, phone_number: &str) -> Result<Option<Account>, DatabaseError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .accounts
            .iter()
            .find(|a| a.phone_number.as_deref() == Some(phone_number))
            .cloned())
    }

    async fn create(&self, new_account: &NewAccount) -> Result<Account, DatabaseError> {
        let mut tables = self.tables.lock().unwrap();
        let clash = tables.accounts.iter().any(|a| {
            (new_account.phone_number.is_some() && a.phone_number == new_account.phone_number)
                || (new_account.email.is_some() && a.email == new_account.email)
        });
        if clash {
            return Err(DatabaseError::Duplicate);
        }
        let now = OffsetDateTime::now_utc();
        let account = Account {
            id: Uuid::new_v4(),
            email: new_account.email.as_deref().map(str::to_lowercase),
            phone_number: new_account.phone_number.clone(),
            fullname: new_account.fullname.clone(),
            role: new_account.role,
            registration_method: new_account.registration_method,
            created_at: now,
            updated_at: now,
        };
        tables.accounts.push(account.clone());
        Ok(account)
    }

    async fn email_taken(&self, email: &str, except: Uuid) -> Result<bool, DatabaseError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.accounts.iter().any(|a| {
            a.id != except
                && a.email
                    .as_deref()
                    .map(|e| e.eq_ignore_ascii_case(email))
                    .unwrap_or(false)
        }))
    }

    async fn phone_taken(&self, phone_number: &str, except: Uuid) -> Result<bool, DatabaseError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .accounts
            .iter()
            .any(|a| a.id != except && a.phone_number.as_deref() == Some(phone_number)))
    }

    async fn update_contact(&self, id: Uuid, update: &ContactUpdate) -> Result<Account, DatabaseError> {
        let mut tables = self.tables.lock().unwrap();
        let account = tables
            .accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(DatabaseError::NotFound)?;
        if let Some(fullname) = &update.fullname {
            account.fullname = Some(fullname.clone());
        }
        if let Some(email) = &update.email {
            account.email = Some(email.to_lowercase());
        }
        if let Some(phone) = &update.phone_number {
            account.phone_number = Some(phone.clone());
        }
        account.updated_at = OffsetDateTime::now_utc();
        Ok(account.clone())
    }

    async fn learning_stats(&self, id: Uuid, active_since: OffsetDateTime) -> Result<LearningStats, DatabaseError> {
        let tables = self.tables.lock().unwrap();
        let total_purchases = tables.purchases.iter().filter(|p| p.account_id == id).count() as i64;
        let total_bookmarks = tables.bookmarks.iter().filter(|b| **b == id).count() as i64;
        let courses: Vec<&Enrollment> = tables.enrollments.iter().filter(|e| e.account_id == id).collect();
        let completed = courses.iter().filter(|e| e.is_completed).count() as i64;
        let recent = tables
            .activity
            .iter()
            .filter(|(account, at)| *account == id && *at >= active_since)
            .count() as i64;
        Ok(LearningStats {
            total_purchases,
            total_bookmarks,
            total_courses: courses.len() as i64,
            completed_courses: completed,
            completion_rate: LearningStats::completion_rate(completed, courses.len() as i64),
            recent_activity_count: recent,
        })
    }
}

#[async_trait]
impl EnrollmentRepository for MemoryDb {
    async fn find_detail(&self, enrollment_id: Uuid) -> Result<Option<EnrollmentDetail>, DatabaseError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .enrollments
            .iter()
            .find(|e| e.id == enrollment_id)
            .and_then(|e| Self::detail(&tables, e)))
    }

    async fn completed_overview(
        &self,
        search: Option<&str>,
        filter: IssueFilter,
        page: PageRequest,
    ) -> Result<Page<CompletedEnrollmentRow>, DatabaseError> {
        let tables = self.tables.lock().unwrap();
        let needle = search.map(str::trim).filter(|s| !s.is_empty());
        let rows = Self::overview_rows(&tables)
            .into_iter()
            .filter(|row| filter.matches(row.state))
            .filter(|row| match needle {
                None => true,
                Some(n) => {
                    contains(row.student_name.as_deref(), n)
                        || contains(row.student_email.as_deref(), n)
                        || contains(Some(&row.program_title), n)
                }
            })
            .collect();
        Ok(Page::from_vec(rows, page))
    }

    async fn certificate_totals(&self) -> Result<CertificateTotals, DatabaseError> {
        let tables = self.tables.lock().unwrap();
        let rows = Self::overview_rows(&tables);
        let total_completed = rows.len() as i64;
        let total_sent = rows.iter().filter(|r| r.state == IssueState::Sent).count() as i64;
        Ok(CertificateTotals {
            total_completed,
            total_sent,
            total_pending: total_completed - total_sent,
        })
    }
}

#[async_trait]
impl CertificateRepository for MemoryDb {
    async fn replace_batch(
        &self,
        enrollment_id: Uuid,
        verification_id: &str,
        batch: &[NewCertificate],
    ) -> Result<Vec<Certificate>, DatabaseError> {
        let mut tables = self.tables.lock().unwrap();
        tables.certificates.retain(|c| c.enrollment_id != enrollment_id);
        let now = OffsetDateTime::now_utc();
        let stored: Vec<Certificate> = batch
            .iter()
            .map(|new| Certificate {
                id: Uuid::new_v4(),
                enrollment_id,
                certificate_type: new.certificate_type,
                verification_id: verification_id.to_string(),
                storage_key: new.storage_key.clone(),
                status: CertificateStatus::Pending,
                sent_at: None,
                created_at: now,
            })
            .collect();
        tables.certificates.extend(stored.iter().cloned());
        Ok(stored)
    }

    async fn list_for_enrollment(&self, enrollment_id: Uuid) -> Result<Vec<Certificate>, DatabaseError> {
        Ok(self.certificates(enrollment_id))
    }

    async fn mark_sent(&self, enrollment_id: Uuid, sent_at: OffsetDateTime) -> Result<u64, DatabaseError> {
        self.check("mark_sent")?;
        let mut tables = self.tables.lock().unwrap();
        let mut updated = 0;
        for certificate in tables.certificates.iter_mut().filter(|c| c.enrollment_id == enrollment_id) {
            certificate.status = CertificateStatus::Sent;
            certificate.sent_at = Some(sent_at);
            updated += 1;
        }
        Ok(updated)
    }
}

#[async_trait]
impl AssignmentRepository for MemoryDb {
    async fn find_program(&self, program_id: Uuid) -> Result<Option<Program>, DatabaseError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.programs.iter().find(|g| g.id == program_id).cloned())
    }

    async fn find_active(&self, account_id: Uuid, program_id: Uuid) -> Result<Option<Purchase>, DatabaseError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .purchases
            .iter()
            .find(|p| p.account_id == account_id && p.program_id == program_id && p.status == PurchaseStatus::Active)
            .cloned())
    }

    async fn create_grant(&self, grant: &NewGrant) -> Result<Purchase, DatabaseError> {
        let mut tables = self.tables.lock().unwrap();
        let exists = tables.purchases.iter().any(|p| {
            p.account_id == grant.account_id && p.program_id == grant.program_id && p.status == PurchaseStatus::Active
        });
        if exists {
            return Err(DatabaseError::Duplicate);
        }
        let now = OffsetDateTime::now_utc();
        let purchase = Purchase {
            id: Uuid::new_v4(),
            account_id: grant.account_id,
            program_id: grant.program_id,
            amount_paid_cents: 0,
            tier: grant.tier,
            status: PurchaseStatus::Active,
            source: PurchaseSource::AdminAssignment,
            purchased_at: now,
            revoked_at: None,
        };
        tables.enrollments.push(Enrollment {
            id: Uuid::new_v4(),
            account_id: grant.account_id,
            purchase_id: purchase.id,
            is_completed: false,
            started_at: now,
            completed_at: None,
        });
        tables.purchases.push(purchase.clone());
        Ok(purchase)
    }

    async fn revoke(&self, purchase_id: Uuid, revoked_at: OffsetDateTime) -> Result<Option<Purchase>, DatabaseError> {
        let mut tables = self.tables.lock().unwrap();
        let purchase = tables
            .purchases
            .iter_mut()
            .find(|p| p.id == purchase_id && p.status == PurchaseStatus::Active);
        Ok(purchase.map(|p| {
            p.status = PurchaseStatus::Revoked;
            p.revoked_at = Some(revoked_at);
            p.clone()
        }))
    }

    async fn count_active(&self, account_id: Uuid, program_id: Uuid) -> Result<i64, DatabaseError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .purchases
            .iter()
            .filter(|p| p.account_id == account_id && p.program_id == program_id && p.status == PurchaseStatus::Active)
            .count() as i64)
    }

    async fn list(&self, search: Option<&str>, page: PageRequest) -> Result<Page<AssignmentListing>, DatabaseError> {
        let tables = self.tables.lock().unwrap();
        let needle = search.map(str::trim).filter(|s| !s.is_empty());
        let mut rows: Vec<AssignmentListing> = tables
            .purchases
            .iter()
            .filter_map(|p| {
                let account = tables.accounts.iter().find(|a| a.id == p.account_id)?;
                let program = tables.programs.iter().find(|g| g.id == p.program_id)?;
                Some(AssignmentListing {
                    id: p.id,
                    account_id: account.id,
                    student_name: account.fullname.clone(),
                    student_email: account.email.clone(),
                    program_id: program.id,
                    program_title: program.title.clone(),
                    tier: p.tier,
                    status: p.status,
                    source: p.source,
                    amount_paid_cents: p.amount_paid_cents,
                    purchased_at: p.purchased_at,
                })
            })
            .filter(|row| match needle {
                None => true,
                Some(n) => {
                    contains(row.student_name.as_deref(), n)
                        || contains(row.student_email.as_deref(), n)
                        || contains(Some(&row.program_title), n)
                }
            })
            .collect();
        rows.sort_by(|a, b| b.purchased_at.cmp(&a.purchased_at));
        Ok(Page::from_vec(rows, page))
    }

    async fn stats(&self) -> Result<AssignmentStats, DatabaseError> {
        let tables = self.tables.lock().unwrap();
        let active: Vec<&Purchase> = tables
            .purchases
            .iter()
            .filter(|p| p.status == PurchaseStatus::Active)
            .collect();
        let mut students: Vec<Uuid> = active
            .iter()
            .filter(|p| {
                tables
                    .accounts
                    .iter()
                    .any(|a| a.id == p.account_id && a.role == AccountRole::Student)
            })
            .map(|p| p.account_id)
            .collect();
        students.sort();
        students.dedup();

        Ok(AssignmentStats {
            total_assignments: tables.purchases.len() as i64,
            active_assignments: active.len() as i64,
            total_students_with_programs: students.len() as i64,
        })
    }
}

#[async_trait]
impl TaskResultRepository for MemoryDb {
    async fn create_pending(&self, id: Uuid, task_name: &str, enrollment_id: Uuid) -> Result<TaskResult, DatabaseError> {
        let now = OffsetDateTime::now_utc();
        let task = TaskResult {
            id,
            task_name: task_name.to_string(),
            enrollment_id,
            status: TaskStatus::Pending,
            attempts: 0,
            result: None,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().unwrap().tasks.push(task.clone());
        Ok(task)
    }

    async fn record_attempt(&self, id: Uuid, attempts: i32, last_error: &str) -> Result<(), DatabaseError> {
        self.check("record_attempt")?;
        let mut tables = self.tables.lock().unwrap();
        if let Some(task) = tables
            .tasks
            .iter_mut()
            .find(|t| t.id == id && t.status == TaskStatus::Pending)
        {
            task.attempts = attempts;
            task.result = Some(serde_json::json!({ "last_error": last_error }));
        }
        Ok(())
    }

    async fn finish(
        &self,
        id: Uuid,
        status: TaskStatus,
        attempts: i32,
        result: serde_json::Value,
    ) -> Result<TaskResult, DatabaseError> {
        self.check("finish")?;
        let mut tables = self.tables.lock().unwrap();
        let task = tables.tasks.iter_mut().find(|t| t.id == id).ok_or(DatabaseError::NotFound)?;
        task.status = status;
        task.attempts = attempts;
        task.result = Some(result);
        task.updated_at = OffsetDateTime::now_utc();
        Ok(task.clone())
    }

    async fn find(&self, id: Uuid) -> Result<Option<TaskResult>, DatabaseError> {
        Ok(self.tables.lock().unwrap().tasks.iter().find(|t| t.id == id).cloned())
    }
}
