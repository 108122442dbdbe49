use code::ErrorCode;
use snafu::{Location, Snafu};

pub mod code;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MailFabricError {
    #[snafu(display("{message}"))]
    Generic {
        message: String,
        #[snafu(implicit)]
        location: Location,
        code: ErrorCode,
    },
}

pub type MailFabricResult<T, E = MailFabricError> = std::result::Result<T, E>;

impl MailFabricError {
    pub fn code(&self) -> ErrorCode {
        match self {
            MailFabricError::Generic { code, .. } => *code,
        }
    }

    pub fn retryable(&self) -> bool {
        self.code().retryable()
    }
}
