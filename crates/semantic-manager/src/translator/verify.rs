use crate::error::TranslationError;
use crate::model::{PlatformInstanceDescription, ResourceDescription};

fn verify_labels(labels: &[String], subject: &str) -> Result<(), TranslationError> {
    if labels.is_empty() {
        return Err(TranslationError::InvalidArgument(format!(
            "{}: Labels must not be null or empty",
            subject
        )));
    }
    Ok(())
}

pub fn verify_platform(platform: &PlatformInstanceDescription) -> Result<(), TranslationError> {
    verify_labels(&platform.labels, &format!("Platform '{}'", platform.id))
}

pub fn verify_resource(resource: &ResourceDescription) -> Result<(), TranslationError> {
    let subject = format!("Resource '{}'", resource.id);
    verify_labels(&resource.labels, &subject)?;
    if resource.interworking_service_url.trim().is_empty() {
        return Err(TranslationError::InvalidArgument(format!(
            "{}: Interworking service URL must not be null or blank",
            subject
        )));
    }
    Ok(())
}
