//! Status codes for navigation operations

/// Result type for status-returning navigation operations
pub type StatusResult<T> = std::result::Result<T, Status>;

/// Status enum for navigation operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Operation was successful
    Success,
    /// Provided parameter was invalid
    InvalidParam,
    /// The open set was exhausted without reaching the goal
    NoSolution,
    /// Start and goal resolve to the same area
    StartEndSame,
    /// No mesh is loaded or the index is unavailable
    NotReady,
    /// Output buffer was too small
    BufferTooSmall,
    /// File has wrong magic number
    WrongMagic,
    /// File has wrong version
    WrongVersion,
    /// File was produced for another game variant
    WrongSubVersion,
}

impl Status {
    /// Checks if the status is a success
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success | Status::StartEndSame)
    }
}

impl std::error::Error for Status {}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Success => write!(f, "Success"),
            Status::InvalidParam => write!(f, "Invalid parameter"),
            Status::NoSolution => write!(f, "No solution found"),
            Status::StartEndSame => write!(f, "Start and end are same"),
            Status::NotReady => write!(f, "Not ready"),
            Status::BufferTooSmall => write!(f, "Buffer too small"),
            Status::WrongMagic => write!(f, "Wrong magic number"),
            Status::WrongVersion => write!(f, "Wrong version"),
            Status::WrongSubVersion => write!(f, "Wrong sub-version"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_classification() {
        assert!(Status::Success.is_success());
        assert!(Status::StartEndSame.is_success());
        assert!(!Status::NoSolution.is_success());
        assert!(!Status::NotReady.is_success());
        assert!(!Status::InvalidParam.is_success());
    }

    #[test]
    fn test_display() {
        assert_eq!(Status::WrongMagic.to_string(), "Wrong magic number");
        assert_eq!(Status::StartEndSame.to_string(), "Start and end are same");
    }
}
