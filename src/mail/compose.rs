use crate::config::MailConfig;
use crate::db::models::{Certificate, EnrollmentDetail};

use super::{MailAttachment, OutgoingMessage};

const RULE: &str = "═══════════════════════════════════════════════════════════════════════════════";

/// Content type for a stored certificate, derived from its file extension.
pub fn attachment_content_type(file_name: &str) -> &'static str {
    match file_name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "pdf" => "application/pdf",
        Some(ext) if ext == "html" || ext == "htm" => "text/html",
        _ => "application/octet-stream",
    }
}

/// Builds the certificate delivery email.
#[derive(Debug, Clone)]
pub struct CertificateMail {
    from_address: String,
    verification_portal_url: String,
    support_email: String,
    support_phones: String,
}

impl CertificateMail {
    pub fn from_config(config: &MailConfig) -> Self {
        Self {
            from_address: config.from_address.clone(),
            verification_portal_url: config.verification_portal_url.clone(),
            support_email: config.support_email.clone(),
            support_phones: config.support_phones.clone(),
        }
    }

    pub fn subject(program_title: &str) -> String {
        format!("Certificates of Completion - {program_title} - TopGrade Innovation")
    }

    /// `<Type Display>_<verification id>.<ext>`
    pub fn attachment_name(certificate: &Certificate) -> String {
        let extension = certificate
            .storage_key
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.contains('/'))
            .unwrap_or("pdf");
        format!(
            "{}_{}.{}",
            certificate.certificate_type.display_name(),
            certificate.verification_id,
            extension
        )
    }

    pub fn body(&self, student_name: &str, program_title: &str) -> String {
        format!(
            "Dear {student_name},\n\
             \n\
             Congratulations on successfully completing the \"{program_title}\" program with TopGrade\n\
             Innovation Pvt. Ltd. We appreciate your dedication and commitment throughout the training\n\
             or internship period.\n\
             \n\
             Your Certificates of Completion are attached to this email. Every certificate issued by\n\
             TopGrade Innovation includes a unique verification ID.\n\
             \n\
             To confirm the authenticity of your certificate, please visit our official verification portal:\n\
             \n\
             \x20   {portal}\n\
             \n\
             You may enter the verification ID shown on your certificate to validate its authenticity.\n\
             \n\
             {RULE}\n\
             \n\
             \x20                               IMPORTANT NOTICE\n\
             \n\
             {RULE}\n\
             \n\
             This is an automated message sent from {from}\n\
             Please do not reply to this email.\n\
             \n\
             For any assistance or queries, kindly contact our support team:\n\
             \n\
             \x20   Email   : {support_email}\n\
             \x20   Phone   : {support_phones}\n\
             \n\
             {RULE}\n\
             \n\
             Thank you for being a part of TopGrade Innovation.\n\
             We wish you continued success in your future endeavors.\n\
             \n\
             Best regards,\n\
             TopGrade Innovation Pvt. Ltd.\n",
            portal = self.verification_portal_url,
            from = self.from_address,
            support_email = self.support_email,
            support_phones = self.support_phones,
        )
    }

    pub fn compose(
        &self,
        detail: &EnrollmentDetail,
        recipient: &str,
        attachments: Vec<MailAttachment>,
    ) -> OutgoingMessage {
        let student_name = detail
            .account
            .fullname
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(recipient);

        OutgoingMessage {
            to: recipient.to_string(),
            subject: Self::subject(&detail.program.title),
            body: self.body(student_name, &detail.program.title),
            attachments,
        }
    }
}
