//! Error handling utilities

use crate::error::AccumulatorError;
use tracing::error;

/// Handle fatal errors and exit with appropriate status code
///
/// - `verbose = 0`: User-friendly messages only
/// - `verbose >= 1`: Includes the code description and the error chain
pub fn handle_fatal_error(error: anyhow::Error, verbose: u8) -> ! {
    error!("Fatal error: {}", error);
    std::process::exit(report_error(&error, verbose))
}

/// Print `error` to stderr and return the exit code to use
pub fn report_error(error: &anyhow::Error, verbose: u8) -> i32 {
    if let Some(err) = error.downcast_ref::<AccumulatorError>() {
        eprintln!("{}", err.user_message());

        if verbose >= 1 {
            eprintln!("\nContext Chain:\n{}", err.developer_message());
        }

        err.exit_code()
    } else {
        eprintln!("Error: {error}");

        if verbose >= 1 {
            eprintln!("\nError chain:");
            for (i, cause) in error.chain().enumerate() {
                eprintln!("  {}: {}", i, cause);
            }
        }

        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_from_accumulator_error() {
        let err = anyhow::Error::new(AccumulatorError::invalid_config("parallelism", "zero"));
        assert_eq!(report_error(&err, 0), 2);
    }

    #[test]
    fn test_exit_code_for_context_wrapped_error() {
        let err = anyhow::Error::new(AccumulatorError::NotFound {
            name: "x".to_string(),
        })
        .context("reading results");
        assert_eq!(report_error(&err, 1), 1);
    }

    #[test]
    fn test_exit_code_for_foreign_error() {
        let err = anyhow::anyhow!("input file missing");
        assert_eq!(report_error(&err, 0), 1);
    }
}
