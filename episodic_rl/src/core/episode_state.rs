//! Type-safe episode termination classification.
//!
//! - **Terminal**: the episode reached an absorbing state. No future reward,
//!   so value targets do not bootstrap.
//! - **Truncated**: the episode hit an external limit (time limit). The state
//!   still has a value, so targets bootstrap from `V(s')`.

/// Episode state derived from `(terminal, truncated)` step flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EpisodeState {
    /// Episode is ongoing.
    Running,
    /// Episode reached an absorbing state.
    Terminal,
    /// Episode stopped by an external limit.
    Truncated,
}

impl EpisodeState {
    /// Classify step flags. If both are set, `Terminal` wins.
    #[inline]
    pub fn from_flags(terminal: bool, truncated: bool) -> Self {
        if terminal {
            Self::Terminal
        } else if truncated {
            Self::Truncated
        } else {
            Self::Running
        }
    }

    /// Whether a value target should include `γ V(s')`.
    #[inline]
    pub fn bootstraps(&self) -> bool {
        !matches!(self, Self::Terminal)
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        !matches!(self, Self::Running)
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal)
    }

    #[inline]
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Truncated)
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flags() {
        assert_eq!(EpisodeState::from_flags(false, false), EpisodeState::Running);
        assert_eq!(EpisodeState::from_flags(true, false), EpisodeState::Terminal);
        assert_eq!(EpisodeState::from_flags(false, true), EpisodeState::Truncated);
        assert_eq!(EpisodeState::from_flags(true, true), EpisodeState::Terminal);
    }

    #[test]
    fn test_bootstrap_only_when_not_terminal() {
        assert!(EpisodeState::Running.bootstraps());
        assert!(EpisodeState::Truncated.bootstraps());
        assert!(!EpisodeState::Terminal.bootstraps());
    }

    #[test]
    fn test_done() {
        assert!(!EpisodeState::Running.is_done());
        assert!(EpisodeState::Terminal.is_done());
        assert!(EpisodeState::Truncated.is_done());
    }
}
