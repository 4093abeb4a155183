//! Result shape of a stage that may stop early without failing
//!
//! Handled conditions such as a missing input directory end a stage with
//! [`Outcome::Aborted`]; the process still exits successfully. Only
//! [`crate::PipelineError`] values make it exit non-zero.

/// Completed report or early-return reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<R> {
    Completed(R),
    Aborted { reason: String },
}

impl<R> Outcome<R> {
    pub fn aborted<S: Into<String>>(reason: S) -> Self {
        Self::Aborted {
            reason: reason.into(),
        }
    }

    /// The report, if the stage ran to completion
    pub fn completed(self) -> Option<R> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Aborted { .. } => None,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_accessors() {
        let done: Outcome<u32> = Outcome::Completed(3);
        assert!(!done.is_aborted());
        assert_eq!(done.completed(), Some(3));

        let stopped: Outcome<u32> = Outcome::aborted("No images found");
        assert!(stopped.is_aborted());
        assert_eq!(stopped.completed(), None);
    }
}
