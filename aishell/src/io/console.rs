//! Interactive console used by the session loop.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

/// Line-oriented user interaction.
pub trait Console {
    /// Show `prompt` and read one line. `None` means input is closed.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;

    /// Write `text` followed by a newline.
    fn show(&mut self, text: &str) -> Result<()>;
}

/// Console over any reader/writer pair, normally stdin/stdout.
pub struct TerminalConsole<R, W> {
    input: R,
    output: W,
}

impl TerminalConsole<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalConsole<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

impl<R: BufRead, W: Write> Console for TerminalConsole<R, W> {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        self.output
            .write_all(prompt.as_bytes())
            .context("write prompt")?;
        self.output.flush().context("flush prompt")?;

        let mut line = String::new();
        let n = self.input.read_line(&mut line).context("read console input")?;
        if n == 0 {
            // Keep the terminal tidy when the user hits Ctrl-D at a prompt.
            writeln!(self.output).context("write newline")?;
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).to_string();
        Ok(Some(trimmed))
    }

    fn show(&mut self, text: &str) -> Result<()> {
        writeln!(self.output, "{text}").context("write console output")?;
        self.output.flush().context("flush console output")
    }
}
