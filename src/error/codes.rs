/// Error code registry for accumulator operations
///
/// Error codes are organized by category:
/// - 1000-1999: Registration errors (surface to task code)
/// - 2000-2999: Merge errors (fatal to the job's accumulators)
/// - 3000-3999: Result retrieval errors
/// - 4000-4999: Transport errors
/// - 5000-5999: Coordinator state errors
/// - 9000-9999: Configuration and other errors
pub struct ErrorCode;

impl ErrorCode {
    // Registration errors (1000-1999)
    pub const DUPLICATE_NAME: u16 = 1001;
    pub const NOT_FOUND: u16 = 1002;
    pub const TYPE_MISMATCH: u16 = 1003;

    // Merge errors (2000-2999)
    pub const KIND_MISMATCH: u16 = 2001;
    pub const UNKNOWN_KIND: u16 = 2002;

    // Result retrieval errors (3000-3999)
    pub const NOT_AVAILABLE: u16 = 3001;
    pub const JOB_FAILED: u16 = 3002;

    // Transport errors (4000-4999)
    pub const TRANSPORT_FAILURE: u16 = 4001;
    pub const SERIALIZATION: u16 = 4002;

    // Coordinator state errors (5000-5999)
    pub const INVALID_TRANSITION: u16 = 5001;

    // Configuration and other errors (9000-9999)
    pub const INVALID_CONFIGURATION: u16 = 9001;
}

/// Get a human-readable description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        ErrorCode::DUPLICATE_NAME => "An accumulator with this name is already registered in the task",
        ErrorCode::NOT_FOUND => "No accumulator with this name exists",
        ErrorCode::TYPE_MISMATCH => "Value or requested type does not match the accumulator",
        ErrorCode::KIND_MISMATCH => "Tasks registered the same name with different accumulator kinds",
        ErrorCode::UNKNOWN_KIND => "Report carries an accumulator kind the coordinator cannot decode",
        ErrorCode::NOT_AVAILABLE => "Accumulator results are only available after the job completed",
        ErrorCode::JOB_FAILED => "The job failed before its accumulators were finalized",
        ErrorCode::TRANSPORT_FAILURE => "A task report could not be delivered to the coordinator",
        ErrorCode::SERIALIZATION => "Accumulator state could not be encoded or decoded",
        ErrorCode::INVALID_TRANSITION => "The coordinator cannot move to the requested phase",
        ErrorCode::INVALID_CONFIGURATION => "Job configuration is invalid",
        _ => "Unknown error",
    }
}
