//! Error handling and display for the CLI.

use colored::Colorize;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("API error: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
        request_id: Option<String>,
        retryable: bool,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Create an API error from response details.
    pub fn api(
        status: u16,
        code: impl Into<String>,
        message: impl Into<String>,
        request_id: Option<String>,
        retryable: bool,
    ) -> Self {
        Self::Api {
            status,
            code: code.into(),
            message: message.into(),
            request_id,
            retryable,
        }
    }

    /// Map a 404 onto a friendlier message.
    pub fn or_not_found(self, what: impl FnOnce() -> String) -> Self {
        match self {
            Self::Api { status: 404, .. } => Self::NotFound(what()),
            other => other,
        }
    }
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        match cli_err {
            CliError::Api {
                retryable: true, ..
            } => {
                eprintln!(
                    "\n{}",
                    "Hint: The manager is busy or has no terminator available; try again shortly."
                        .yellow()
                );
            }
            CliError::Api { code, .. } if code == "wrong_state" => {
                eprintln!(
                    "\n{}",
                    "Hint: Check the node's connection status with `e2mctl nodes get`.".yellow()
                );
            }
            CliError::Network(_) => {
                eprintln!(
                    "\n{}",
                    "Hint: Check that the manager is running and --url points at it.".yellow()
                );
            }
            _ => {}
        }

        if let CliError::Api {
            request_id: Some(request_id),
            ..
        } = cli_err
        {
            eprintln!("\nRequest ID: {}", request_id);
        }
    }
}
