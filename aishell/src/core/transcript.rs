//! Append-only turn history shown to the oracle.

/// One recorded turn outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnRecord {
    /// The user declined a command that needed confirmation.
    Declined {
        /// Raw oracle proposal, marker included.
        proposal: String,
    },
    /// A command ran in the sandbox.
    Executed {
        command: String,
        /// Output after truncation (and redaction, when enabled).
        output: String,
        exit_code: i32,
    },
}

impl TurnRecord {
    fn render_into(&self, buf: &mut String) {
        match self {
            TurnRecord::Declined { proposal } => {
                buf.push_str(&format!("\nMODEL> {proposal}\nUSER> declined\n"));
            }
            TurnRecord::Executed {
                command,
                output,
                exit_code,
            } => {
                buf.push_str(&format!("\n$ {command}\n{output}\n[exit={exit_code}]\n"));
            }
        }
    }
}

/// Ordered turn records for one session.
///
/// Records can only be appended; there is no API to edit or remove them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    records: Vec<TurnRecord>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: TurnRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[TurnRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Flat text form used as oracle context.
    pub fn render(&self) -> String {
        let mut buf = String::new();
        for record in &self.records {
            record.render_into(&mut buf);
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_transcript_renders_empty() {
        assert_eq!(Transcript::new().render(), "");
    }

    #[test]
    fn renders_records_in_insertion_order() {
        let mut transcript = Transcript::new();
        transcript.push(TurnRecord::Executed {
            command: "ls".to_string(),
            output: "a\nb\n".to_string(),
            exit_code: 0,
        });
        transcript.push(TurnRecord::Declined {
            proposal: "CONFIRM: rm -rf /work/a".to_string(),
        });

        assert_eq!(
            transcript.render(),
            "\n$ ls\na\nb\n\n[exit=0]\n\nMODEL> CONFIRM: rm -rf /work/a\nUSER> declined\n"
        );
        assert_eq!(transcript.len(), 2);
    }

    #[test]
    fn nonzero_exit_is_rendered_verbatim() {
        let mut transcript = Transcript::new();
        transcript.push(TurnRecord::Executed {
            command: "false".to_string(),
            output: String::new(),
            exit_code: 127,
        });
        assert!(transcript.render().ends_with("[exit=127]\n"));
    }
}
