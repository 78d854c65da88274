use askama::Template;
use async_trait::async_trait;
use thiserror::Error;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::db::models::CertificateType;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    #[error("Formatting error: {0}")]
    Format(#[from] time::error::Format),

    #[error("Render engine error: {0}")]
    Engine(String),
}

/// Everything printed on one certificate.
#[derive(Debug, Clone)]
pub struct CertificateDocument {
    pub certificate_type: CertificateType,
    pub student_name: String,
    pub program_name: String,
    pub verification_id: String,
    pub completed_on: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
    pub content_type: &'static str,
}

/// Turns a certificate into a file. A PDF engine plugs in here.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(&self, document: &CertificateDocument) -> Result<RenderedDocument, RenderError>;
}

/// "Month DD, YYYY"
pub fn completion_date(at: OffsetDateTime) -> Result<String, RenderError> {
    Ok(at.format(format_description!("[month repr:long] [day], [year]"))?)
}

#[derive(Template)]
#[template(path = "certificates/certificate.html")]
struct CertificateTemplate<'a> {
    title: &'a str,
    statement: &'a str,
    student_name: &'a str,
    program_name: &'a str,
    verification_id: &'a str,
    completed_on: &'a str,
}

fn statement(kind: CertificateType) -> &'static str {
    match kind {
        CertificateType::Internship => "has successfully completed an internship in",
        CertificateType::Training => "has successfully completed the training program",
        CertificateType::Credit => "has earned full academic credit for",
        CertificateType::Recommendation => "is warmly recommended by TopGrade Innovation on completing",
        CertificateType::Placement => "has qualified for placement assistance through the Gold Pass of",
    }
}

/// Askama HTML renderer, one layout for every certificate type.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlRenderer;

#[async_trait]
impl DocumentRenderer for HtmlRenderer {
    async fn render(&self, document: &CertificateDocument) -> Result<RenderedDocument, RenderError> {
        let completed_on = completion_date(document.completed_on)?;
        let html = CertificateTemplate {
            title: document.certificate_type.display_name(),
            statement: statement(document.certificate_type),
            student_name: &document.student_name,
            program_name: &document.program_name,
            verification_id: &document.verification_id,
            completed_on: &completed_on,
        }
        .render()?;

        Ok(RenderedDocument {
            bytes: html.into_bytes(),
            extension: "html",
            content_type: "text/html",
        })
    }
}
