//! Masking of credential-looking lines in command output.

const SECRET_HINTS: [&str; 2] = ["TOKEN=", "KEY="];

/// Replace the value of every line that looks like a `*TOKEN=` or `*KEY=` assignment.
///
/// Everything after the first `=` on a matching line becomes `***`.
pub fn redact_secrets(output: &str) -> String {
    output
        .split('\n')
        .map(|line| {
            if SECRET_HINTS.iter().any(|hint| line.contains(hint))
                && let Some((key, _)) = line.split_once('=')
            {
                format!("{key}=***")
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_key_and_token_assignments() {
        let out = "PATH=/usr/bin\nOPENAI_API_KEY=sk-abc\nGH_TOKEN=ghp_123\n";
        assert_eq!(
            redact_secrets(out),
            "PATH=/usr/bin\nOPENAI_API_KEY=***\nGH_TOKEN=***\n"
        );
    }

    #[test]
    fn masks_from_first_equals_sign() {
        assert_eq!(redact_secrets("export A=1 API_KEY=x"), "export A=***");
    }

    #[test]
    fn leaves_other_lines_alone() {
        let out = "total 0\n-rw-r--r-- 1 root root 0 key.txt";
        assert_eq!(redact_secrets(out), out);
    }
}
