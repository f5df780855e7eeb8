use thiserror::Error;

/// Everything that can go wrong between a user action and its result.
///
/// None of these are fatal to a session: the shell records them next to the
/// source or headline they belong to and keeps going.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NewsError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Could not parse feed: {0}")]
    Parse(String),

    #[error("Could not extract article text: {0}")]
    Scrape(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Invalid voice profile '{name}': {reason}")]
    InvalidVoiceProfile { name: String, reason: String },

    #[error("Input text is empty")]
    EmptyInput,

    #[error("Unknown news source: {0}")]
    UnknownSource(String),

    #[error("No headline at position {0}")]
    UnknownHeadline(usize),
}

impl NewsError {
    pub fn invalid_voice(name: impl Into<String>, reason: impl Into<String>) -> Self {
        NewsError::InvalidVoiceProfile {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Transport failures talking to a feed or article host.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NewsError::Network(format!("request timed out: {}", err))
        } else {
            NewsError::Network(err.to_string())
        }
    }

    /// Transport failures talking to an inference backend.
    pub(crate) fn from_backend(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NewsError::ModelUnavailable(format!("inference request timed out: {}", err))
        } else {
            NewsError::ModelUnavailable(err.to_string())
        }
    }
}

pub type NewsResult<T> = std::result::Result<T, NewsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_voice_message_names_the_voice() {
        let err = NewsError::invalid_voice("Morgan Freeman", "reference sample missing");
        assert_eq!(
            err.to_string(),
            "Invalid voice profile 'Morgan Freeman': reference sample missing"
        );
    }

    #[test]
    fn test_empty_input_message() {
        assert_eq!(NewsError::EmptyInput.to_string(), "Input text is empty");
    }
}
