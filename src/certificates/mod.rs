//! Certificate issuance for completed enrollments.

mod generator;
mod render;
mod verification;

pub use generator::{
    CertificateGenerator, CertificateOutcome, GenerationError, GenerationReport, TypeOutcome,
};
pub use render::{
    completion_date, CertificateDocument, DocumentRenderer, HtmlRenderer, RenderError, RenderedDocument,
};
pub use verification::verification_id;
