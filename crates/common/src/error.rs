use derive_more::{Display, Error};

/// Context type for every [`error_stack::Report`] produced by this crate.
#[derive(Debug, Display, Error)]
pub enum HtdsaError {
    #[display("Configuration error: {message}")]
    Configuration { message: String },

    #[display("Invalid key material: {message}")]
    InvalidKey { message: String },

    #[display("Transport error: {message}")]
    Transport { message: String },

    #[display("Signature verification failed")]
    Verification,
}

/// Reason a signed message was rejected.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum VerificationError {
    #[display("No signature present in response to signed request")]
    MissingSignature,

    #[display("Date header is missing or malformed")]
    MalformedTimestamp,

    #[display("Rejecting stale message")]
    StaleResponse,

    #[display("Rejecting message from the future")]
    FutureResponse,

    #[display("Signature does not match message")]
    BadSignature,

    #[display("No identity present in signed request")]
    MissingIdentity,

    #[display("Unknown client identity")]
    UnknownIdentity,
}

#[cfg(test)]
mod tests {
    use error_stack::Report;

    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            HtdsaError::InvalidKey {
                message: "bad hex".into()
            }
            .to_string(),
            "Invalid key material: bad hex"
        );
        assert_eq!(
            VerificationError::StaleResponse.to_string(),
            "Rejecting stale message"
        );
    }

    #[test]
    fn test_verification_reason_survives_change_context() {
        let report = Report::new(VerificationError::FutureResponse)
            .change_context(HtdsaError::Verification);

        assert!(matches!(
            report.current_context(),
            HtdsaError::Verification
        ));
        assert_eq!(
            report.downcast_ref::<VerificationError>(),
            Some(&VerificationError::FutureResponse)
        );
    }
}
