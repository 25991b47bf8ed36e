// Error types shared by the command layer. Most functions return
// `anyhow::Result`; the variants here are the failures a caller may want to
// recognise (tests downcast to them) rather than just print.

use thiserror::Error;

/// Shown when the subdomain/URL input matches neither accepted pattern.
pub const URL_ERROR_MSG: &str = "Invalid value for the subdomain or URL. \
Please enter a subdomain (e.g. my-company) or a full URL including the protocol \
(e.g. https://my-company.zendesk.com).";

/// Shown when the username is not an email address.
pub const EMAIL_ERROR_MSG: &str = "Please enter a valid email address.";

#[derive(Error, Debug)]
pub enum ZatError {
    #[error("{}", URL_ERROR_MSG)]
    InvalidUrl,
    #[error("{}", EMAIL_ERROR_MSG)]
    InvalidEmail,
    #[error("App not found. Please verify that your credentials, subdomain, and app name are correct.")]
    AppNotFound,
    #[error("App id not found\nPlease try running command with --clean or check your internet connection")]
    AppIdNotFound,
    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("{0}")]
    JobFailed(String),
    #[error("Gave up waiting for job {0} to finish")]
    JobTimeout(String),
    #[error("No value given for \"{0}\" and prompting is disabled (--unattended)")]
    MissingInput(String),
    #[error("Missing required parameter \"{0}\"")]
    MissingSetting(String),
    #[error("{}", format_problems(.0))]
    Invalid(Vec<String>),
}

fn format_problems(problems: &[String]) -> String {
    let mut out = String::from("Validation failed:");
    for problem in problems {
        out.push_str("\n  - ");
        out.push_str(problem);
    }
    out
}
