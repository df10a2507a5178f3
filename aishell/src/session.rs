//! The interactive turn loop.
//!
//! A session is a finite-state machine:
//!
//! ```text
//! AwaitingGoal -> Proposing -> [ConfirmGate] -> Executing -> Recording -> AwaitingNextInput
//!                     ^              |  declined                               |
//!                     +--------------+-----------------------------------------+
//! ```
//!
//! Every state may move to `Stopped`. Oracle and sandbox failures abort the
//! session with an error; the transcript is only touched once a turn record is
//! complete, so an aborted turn leaves no partial record behind.

use anyhow::Result;
use tracing::{debug, info, instrument};

use crate::core::input::{
    ConfirmAnswer, GoalInput, NextInput, classify_confirmation, classify_goal, classify_next,
};
use crate::core::proposal::Proposal;
use crate::core::transcript::{Transcript, TurnRecord};
use crate::io::config::ShellConfig;
use crate::io::console::Console;
use crate::io::liveness::LivenessProbe;
use crate::io::oracle::Oracle;
use crate::io::sandbox::{ExecResult, Sandbox};

pub const GOAL_PROMPT: &str = "Goal> ";
pub const NEXT_PROMPT: &str = "\nEnter to continue, or type a new goal, or 'exit'> ";
pub const EMPTY_PROPOSAL_NOTICE: &str = "\nModel returned an empty command. Stopping.";

/// Reason why a session stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStop {
    /// The first goal was empty.
    NoGoal,
    /// The user typed the exit keyword.
    Exit,
    /// The oracle returned nothing to run.
    OracleExhausted,
    /// Console input was closed (EOF).
    InputClosed,
}

/// Summary of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Number of turn records (executions plus declines).
    pub turns: usize,
    pub commands_executed: u32,
    /// Goal in effect when the session stopped, if one was ever set.
    pub goal: Option<String>,
    pub transcript: Transcript,
    pub stop: SessionStop,
}

#[derive(Debug)]
enum State {
    AwaitingGoal,
    Proposing,
    ConfirmGate(Proposal),
    Executing(String),
    Recording { command: String, result: ExecResult },
    AwaitingNextInput,
    Stopped(SessionStop),
}

struct Session<'a, O, S, C> {
    oracle: &'a O,
    sandbox: &'a S,
    console: &'a mut C,
    goal: Option<String>,
    transcript: Transcript,
    commands_executed: u32,
}

/// Run one interactive session until it stops or a turn fails fatally.
///
/// The sandbox is checked for liveness exactly once, before anything is asked
/// of the user; a failed check means no oracle call and no command ever runs.
#[instrument(skip_all, fields(container = %config.container))]
pub fn run_session<L, O, S, C>(
    config: &ShellConfig,
    liveness: &L,
    oracle: &O,
    sandbox: &S,
    console: &mut C,
) -> Result<SessionOutcome>
where
    L: LivenessProbe,
    O: Oracle,
    S: Sandbox,
    C: Console,
{
    liveness.ensure_running(&config.container)?;

    console.show(&format!("Using container: {}", config.container))?;
    console.show("This tool will propose one command at a time and run it inside the container.")?;
    console.show("Type 'exit' at any prompt to quit.\n")?;

    let mut session = Session {
        oracle,
        sandbox,
        console,
        goal: None,
        transcript: Transcript::new(),
        commands_executed: 0,
    };

    let mut state = State::AwaitingGoal;
    loop {
        state = match state {
            State::Stopped(stop) => return Ok(session.finish(stop)),
            other => session.advance(other)?,
        };
    }
}

impl<O, S, C> Session<'_, O, S, C>
where
    O: Oracle,
    S: Sandbox,
    C: Console,
{
    fn advance(&mut self, state: State) -> Result<State> {
        let next = match state {
            State::AwaitingGoal => self.await_goal()?,
            State::Proposing => self.propose()?,
            State::ConfirmGate(proposal) => self.confirm(proposal)?,
            State::Executing(command) => self.execute(command)?,
            State::Recording { command, result } => self.record(command, result)?,
            State::AwaitingNextInput => self.await_next_input()?,
            State::Stopped(stop) => State::Stopped(stop),
        };
        debug!(next = ?next, "session transition");
        Ok(next)
    }

    fn await_goal(&mut self) -> Result<State> {
        let Some(line) = self.console.read_line(GOAL_PROMPT)? else {
            return Ok(State::Stopped(SessionStop::InputClosed));
        };
        Ok(match classify_goal(&line) {
            GoalInput::Empty => State::Stopped(SessionStop::NoGoal),
            GoalInput::Exit => State::Stopped(SessionStop::Exit),
            GoalInput::Goal(goal) => {
                info!(goal = %goal, "goal set");
                self.goal = Some(goal);
                State::Proposing
            }
        })
    }

    fn propose(&mut self) -> Result<State> {
        let goal = self.goal.as_deref().unwrap_or_default();
        let raw = self.oracle.propose(goal, &self.transcript.render())?;

        Ok(match Proposal::parse(&raw) {
            None => {
                info!("oracle has nothing further to propose");
                self.console.show(EMPTY_PROPOSAL_NOTICE)?;
                State::Stopped(SessionStop::OracleExhausted)
            }
            Some(proposal @ Proposal::NeedsConfirm(_)) => State::ConfirmGate(proposal),
            Some(Proposal::Direct(command)) => State::Executing(command),
        })
    }

    fn confirm(&mut self, proposal: Proposal) -> Result<State> {
        let prompt = format!(
            "\nProposed (needs confirm): {}\nRun it? [y/N] ",
            proposal.command()
        );
        let Some(answer) = self.console.read_line(&prompt)? else {
            return Ok(State::Stopped(SessionStop::InputClosed));
        };

        Ok(match classify_confirmation(&answer) {
            ConfirmAnswer::Yes => State::Executing(proposal.command().to_string()),
            // `exit` ends the session here as at every other prompt; it is not a decline.
            ConfirmAnswer::Exit => State::Stopped(SessionStop::Exit),
            ConfirmAnswer::Decline => {
                info!(command = %proposal.command(), "user declined command");
                self.transcript.push(TurnRecord::Declined {
                    proposal: proposal.raw(),
                });
                State::Proposing
            }
        })
    }

    fn execute(&mut self, command: String) -> Result<State> {
        self.console.show(&format!("\n$ {command}"))?;
        let result = self.sandbox.run(&command)?;
        self.commands_executed += 1;
        Ok(State::Recording { command, result })
    }

    fn record(&mut self, command: String, result: ExecResult) -> Result<State> {
        let shown = result.output.strip_suffix('\n').unwrap_or(&result.output);
        self.console.show(shown)?;
        self.console.show(&format!("[exit={}]", result.exit_code))?;

        info!(
            exit_code = result.exit_code,
            truncated = result.truncated,
            turn = self.transcript.len() + 1,
            "command recorded"
        );
        self.transcript.push(TurnRecord::Executed {
            command,
            output: result.output,
            exit_code: result.exit_code,
        });
        Ok(State::AwaitingNextInput)
    }

    fn await_next_input(&mut self) -> Result<State> {
        let Some(line) = self.console.read_line(NEXT_PROMPT)? else {
            return Ok(State::Stopped(SessionStop::InputClosed));
        };
        Ok(match classify_next(&line) {
            NextInput::Continue => State::Proposing,
            NextInput::Exit => State::Stopped(SessionStop::Exit),
            NextInput::NewGoal(goal) => {
                info!(goal = %goal, "goal replaced");
                self.goal = Some(goal);
                State::Proposing
            }
        })
    }

    fn finish(self, stop: SessionStop) -> SessionOutcome {
        info!(stop = ?stop, turns = self.transcript.len(), "session stopped");
        SessionOutcome {
            turns: self.transcript.len(),
            commands_executed: self.commands_executed,
            goal: self.goal,
            transcript: self.transcript,
            stop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShellError;
    use crate::test_support::{
        ScriptedConsole, ScriptedOracle, ScriptedReply, ScriptedRun, ScriptedSandbox,
        StaticLiveness,
    };

    fn config() -> ShellConfig {
        ShellConfig::default()
    }

    #[test]
    fn empty_goal_stops_without_turns() {
        let oracle = ScriptedOracle::new(vec!["ls"]);
        let sandbox = ScriptedSandbox::new(Vec::new());
        let mut console = ScriptedConsole::new(vec![""]);

        let outcome = run_session(
            &config(),
            &StaticLiveness::running(),
            &oracle,
            &sandbox,
            &mut console,
        )
        .expect("session");

        assert_eq!(outcome.stop, SessionStop::NoGoal);
        assert_eq!(outcome.turns, 0);
        assert_eq!(oracle.calls().len(), 0);
    }

    #[test]
    fn exit_goal_stops_without_turns() {
        let oracle = ScriptedOracle::new(vec!["ls"]);
        let sandbox = ScriptedSandbox::new(Vec::new());
        let mut console = ScriptedConsole::new(vec!["EXIT"]);

        let outcome = run_session(
            &config(),
            &StaticLiveness::running(),
            &oracle,
            &sandbox,
            &mut console,
        )
        .expect("session");

        assert_eq!(outcome.stop, SessionStop::Exit);
        assert_eq!(oracle.calls().len(), 0);
        assert_eq!(sandbox.commands().len(), 0);
    }

    #[test]
    fn direct_command_runs_and_is_recorded() {
        let oracle = ScriptedOracle::new(vec!["echo hi"]);
        let sandbox = ScriptedSandbox::new(vec![ScriptedRun::ok("hi\n")]);
        let mut console = ScriptedConsole::new(vec!["say hi", "exit"]);

        let outcome = run_session(
            &config(),
            &StaticLiveness::running(),
            &oracle,
            &sandbox,
            &mut console,
        )
        .expect("session");

        assert_eq!(outcome.stop, SessionStop::Exit);
        assert_eq!(outcome.commands_executed, 1);
        assert_eq!(
            outcome.transcript.records(),
            &[TurnRecord::Executed {
                command: "echo hi".to_string(),
                output: "hi\n".to_string(),
                exit_code: 0,
            }]
        );
        assert_eq!(sandbox.commands(), vec!["echo hi".to_string()]);

        let shown = console.shown().join("\n");
        assert!(shown.contains("$ echo hi"));
        assert!(shown.contains("[exit=0]"));
    }

    #[test]
    fn confirmed_command_runs_without_marker() {
        let oracle = ScriptedOracle::new(vec!["CONFIRM: rm -rf /work/build"]);
        let sandbox = ScriptedSandbox::new(vec![ScriptedRun::ok("")]);
        let mut console = ScriptedConsole::new(vec!["clean", "Y", "exit"]);

        let outcome = run_session(
            &config(),
            &StaticLiveness::running(),
            &oracle,
            &sandbox,
            &mut console,
        )
        .expect("session");

        assert_eq!(sandbox.commands(), vec!["rm -rf /work/build".to_string()]);
        assert_eq!(outcome.turns, 1);
        assert!(
            console
                .prompts()
                .iter()
                .any(|p| p.contains("Proposed (needs confirm): rm -rf /work/build"))
        );
    }

    #[test]
    fn exit_at_confirmation_stops_without_recording_decline() {
        let oracle = ScriptedOracle::new(vec!["CONFIRM: dd if=/dev/zero of=/dev/sda"]);
        let sandbox = ScriptedSandbox::new(Vec::new());
        let mut console = ScriptedConsole::new(vec!["wipe", "exit"]);

        let outcome = run_session(
            &config(),
            &StaticLiveness::running(),
            &oracle,
            &sandbox,
            &mut console,
        )
        .expect("session");

        assert_eq!(outcome.stop, SessionStop::Exit);
        assert_eq!(outcome.turns, 0);
        assert!(outcome.transcript.is_empty());
        assert!(sandbox.commands().is_empty());
        assert_eq!(oracle.calls().len(), 1);
    }

    #[test]
    fn closed_input_stops_session() {
        let oracle = ScriptedOracle::new(vec!["ls"]);
        let sandbox = ScriptedSandbox::new(vec![ScriptedRun::ok("a\n")]);
        let mut console = ScriptedConsole::new(vec!["look around"]);

        let outcome = run_session(
            &config(),
            &StaticLiveness::running(),
            &oracle,
            &sandbox,
            &mut console,
        )
        .expect("session");

        assert_eq!(outcome.stop, SessionStop::InputClosed);
        assert_eq!(outcome.turns, 1);
    }

    #[test]
    fn oracle_failure_aborts_without_partial_record() {
        let oracle = ScriptedOracle::from_replies(vec![
            ScriptedReply::text("pwd"),
            ScriptedReply::fail("connection reset"),
        ]);
        let sandbox = ScriptedSandbox::new(vec![ScriptedRun::ok("/work\n")]);
        let mut console = ScriptedConsole::new(vec!["where am i", ""]);

        let err = run_session(
            &config(),
            &StaticLiveness::running(),
            &oracle,
            &sandbox,
            &mut console,
        )
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ShellError>(),
            Some(ShellError::OracleTransport(_))
        ));
        assert_eq!(oracle.calls().len(), 2);
        assert_eq!(sandbox.commands().len(), 1);
    }

    #[test]
    fn exec_fault_aborts_session() {
        let oracle = ScriptedOracle::new(vec!["ls"]);
        let sandbox = ScriptedSandbox::new(vec![ScriptedRun::fault("container vanished")]);
        let mut console = ScriptedConsole::new(vec!["list"]);

        let err = run_session(
            &config(),
            &StaticLiveness::running(),
            &oracle,
            &sandbox,
            &mut console,
        )
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ShellError>(),
            Some(ShellError::SandboxExecFault { .. })
        ));
    }
}
