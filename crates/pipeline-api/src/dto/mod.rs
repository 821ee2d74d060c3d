//! Request and response bodies.

pub mod request;
pub mod response;

use validator::ValidationErrors;

/// First human-readable message of a failed validation.
pub fn first_validation_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));
    fields
        .into_iter()
        .flat_map(|(field, errs)| errs.iter().map(move |e| (field.clone(), e)))
        .map(|(field, err)| match &err.message {
            Some(message) => message.to_string(),
            None => format!("Invalid value for {field}"),
        })
        .next()
        .unwrap_or_else(|| "Invalid request".to_string())
}
