//! Decoding of oracle responses into proposals.

/// Prefix the oracle puts in front of commands that need explicit approval.
pub const CONFIRM_MARKER: &str = "CONFIRM:";

/// The next command suggested by the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Proposal {
    /// Run without asking.
    Direct(String),
    /// Run only after the user answers `y`.
    NeedsConfirm(String),
}

impl Proposal {
    /// Decode raw oracle text.
    ///
    /// Returns `None` when there is nothing to run: an empty response, or a bare
    /// marker with no command after it.
    pub fn parse(raw: &str) -> Option<Self> {
        let text = raw.trim();
        if text.is_empty() {
            return None;
        }
        match text.strip_prefix(CONFIRM_MARKER) {
            Some(rest) => {
                let command = rest.trim();
                (!command.is_empty()).then(|| Proposal::NeedsConfirm(command.to_string()))
            }
            None => Some(Proposal::Direct(text.to_string())),
        }
    }

    /// The command text with any marker stripped.
    pub fn command(&self) -> &str {
        match self {
            Proposal::Direct(command) | Proposal::NeedsConfirm(command) => command,
        }
    }

    /// The proposal as the oracle phrased it, marker included.
    pub fn raw(&self) -> String {
        match self {
            Proposal::Direct(command) => command.clone(),
            Proposal::NeedsConfirm(command) => format!("{CONFIRM_MARKER} {command}"),
        }
    }

    pub fn needs_confirmation(&self) -> bool {
        matches!(self, Proposal::NeedsConfirm(_))
    }
}
