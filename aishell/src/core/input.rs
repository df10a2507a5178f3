//! Classification of free-text console answers.

/// Keyword that ends the session at every prompt (case-insensitive).
pub const EXIT_KEYWORD: &str = "exit";

pub fn is_exit(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case(EXIT_KEYWORD)
}

/// Answer to the initial `Goal>` prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoalInput {
    Goal(String),
    Empty,
    Exit,
}

pub fn classify_goal(input: &str) -> GoalInput {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        GoalInput::Empty
    } else if is_exit(trimmed) {
        GoalInput::Exit
    } else {
        GoalInput::Goal(trimmed.to_string())
    }
}

/// Answer to the `Run it? [y/N]` prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAnswer {
    Yes,
    Decline,
    Exit,
}

/// Only `y` confirms. `exit` stops the session instead of declining; any other
/// answer declines.
pub fn classify_confirmation(input: &str) -> ConfirmAnswer {
    let trimmed = input.trim();
    if trimmed.eq_ignore_ascii_case("y") {
        ConfirmAnswer::Yes
    } else if is_exit(trimmed) {
        ConfirmAnswer::Exit
    } else {
        ConfirmAnswer::Decline
    }
}

/// Answer to the prompt shown after a command ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextInput {
    Continue,
    NewGoal(String),
    Exit,
}

pub fn classify_next(input: &str) -> NextInput {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        NextInput::Continue
    } else if is_exit(trimmed) {
        NextInput::Exit
    } else {
        NextInput::NewGoal(trimmed.to_string())
    }
}
