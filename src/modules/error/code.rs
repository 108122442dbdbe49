#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ErrorCode {
    // Client-side / validation errors (10000-10999)
    InvalidParameter = 10000,
    MissingConfiguration = 10020,
    Incompatible = 10030,
    ExceedsLimitation = 10040,
    PayloadTooLarge = 10070,
    RequestTimeout = 10080,

    // Authentication and authorization errors (20000-20999)
    PermissionDenied = 20000,
    TokenExpired = 20010,
    AuthBroken = 20020,
    MissingRefreshToken = 20060,

    // Resource errors (30000-30999)
    ResourceNotFound = 30000,
    AlreadyExists = 30010,
    TooManyRequest = 30020,
    Conflict = 30030,

    // Network / provider errors (40000-40999)
    NetworkError = 40000,
    ConnectionTimeout = 40010,
    RateLimited = 40020,
    ProviderServerError = 40030,
    FullSyncRequired = 40040,

    // Job queue errors (50000-50999)
    JobNotFound = 50000,
    JobRetriesExhausted = 50010,
    JobDeadLettered = 50020,
    QueueClosed = 50030,

    // AI / classification errors (60000-60999)
    LlmRequestFailed = 60000,
    LlmTimeout = 60010,
    ParserError = 60020,

    // Internal system errors (70000-70999)
    InternalError = 70000,
    DatabaseError = 70010,
    SerializationError = 70020,
}

impl ErrorCode {
    /// Whether an error of this kind should be retried by the job queue
    /// rather than dead-lettered or treated as a semantic failure.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::NetworkError
                | ErrorCode::ConnectionTimeout
                | ErrorCode::RateLimited
                | ErrorCode::ProviderServerError
                | ErrorCode::TokenExpired
                | ErrorCode::LlmRequestFailed
                | ErrorCode::LlmTimeout
                | ErrorCode::QueueClosed
        )
    }
}
