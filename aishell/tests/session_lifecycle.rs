//! Session-level harness tests.
//!
//! These tests drive `run_session` end to end with scripted oracle, sandbox,
//! console and liveness doubles, and check what reaches the transcript and
//! what the oracle sees on each call.

use aishell::core::transcript::TurnRecord;
use aishell::core::truncate::TRUNCATION_MARKER;
use aishell::error::{ShellError, exit_code_for};
use aishell::exit_codes;
use aishell::io::config::ShellConfig;
use aishell::session::{SessionStop, run_session};
use aishell::test_support::{
    ScriptedConsole, ScriptedOracle, ScriptedRun, ScriptedSandbox, StaticLiveness,
};

fn config() -> ShellConfig {
    ShellConfig::default()
}

/// Three turns, driven by pressing Enter between them, end in three records
/// in execution order.
#[test]
fn turns_are_recorded_in_execution_order() {
    let oracle = ScriptedOracle::new(vec!["pwd", "ls", "cat notes.txt"]);
    let sandbox = ScriptedSandbox::new(vec![
        ScriptedRun::ok("/work\n"),
        ScriptedRun::ok("notes.txt\n"),
        ScriptedRun::ok("buy milk\n"),
    ]);
    let mut console = ScriptedConsole::new(vec!["read my notes", "", "", "exit"]);

    let outcome = run_session(
        &config(),
        &StaticLiveness::running(),
        &oracle,
        &sandbox,
        &mut console,
    )
    .expect("session");

    assert_eq!(outcome.turns, 3);
    assert_eq!(outcome.commands_executed, 3);
    let commands: Vec<&str> = outcome
        .transcript
        .records()
        .iter()
        .map(|record| match record {
            TurnRecord::Executed { command, .. } => command.as_str(),
            TurnRecord::Declined { proposal } => proposal.as_str(),
        })
        .collect();
    assert_eq!(commands, vec!["pwd", "ls", "cat notes.txt"]);
    assert_eq!(sandbox.commands(), vec!["pwd", "ls", "cat notes.txt"]);

    let calls = oracle.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].transcript, "");
    assert!(calls[2].transcript.contains("$ pwd\n/work\n\n[exit=0]"));
    assert!(calls[2].transcript.contains("$ ls\nnotes.txt\n\n[exit=0]"));
}

/// Declining a `CONFIRM:` proposal records the decline, runs nothing, and asks
/// the oracle again with the decline visible.
#[test]
fn declined_confirmation_is_recorded_and_not_executed() {
    let oracle = ScriptedOracle::new(vec!["CONFIRM: rm -rf build", "ls build"]);
    let sandbox = ScriptedSandbox::new(vec![ScriptedRun::ok("a.o\n")]);
    let mut console = ScriptedConsole::new(vec!["clean up", "n", "exit"]);

    let outcome = run_session(
        &config(),
        &StaticLiveness::running(),
        &oracle,
        &sandbox,
        &mut console,
    )
    .expect("session");

    assert_eq!(sandbox.commands(), vec!["ls build"]);
    assert_eq!(outcome.turns, 2);
    assert_eq!(
        outcome.transcript.records()[0],
        TurnRecord::Declined {
            proposal: "CONFIRM: rm -rf build".to_string()
        }
    );

    let calls = oracle.calls();
    assert_eq!(calls.len(), 2);
    assert!(
        calls[1]
            .transcript
            .contains("MODEL> CONFIRM: rm -rf build\nUSER> declined")
    );
}

/// Anything other than `y` declines, including `yes`.
#[test]
fn only_y_confirms() {
    let oracle = ScriptedOracle::new(vec!["CONFIRM: reboot", "CONFIRM: reboot"]);
    let sandbox = ScriptedSandbox::new(vec![ScriptedRun::ok("")]);
    let mut console = ScriptedConsole::new(vec!["restart", "yes", " y ", "exit"]);

    let outcome = run_session(
        &config(),
        &StaticLiveness::running(),
        &oracle,
        &sandbox,
        &mut console,
    )
    .expect("session");

    assert_eq!(sandbox.commands(), vec!["reboot"]);
    assert!(matches!(
        outcome.transcript.records()[0],
        TurnRecord::Declined { .. }
    ));
    assert!(matches!(
        outcome.transcript.records()[1],
        TurnRecord::Executed { .. }
    ));
}

#[test]
fn long_output_is_truncated_to_ceiling() {
    let oracle = ScriptedOracle::new(vec!["cat big.log"]);
    let sandbox = ScriptedSandbox::with_ceiling(vec![ScriptedRun::ok("0123456789abcdef")], 10);
    let mut console = ScriptedConsole::new(vec!["show the log", "exit"]);

    let outcome = run_session(
        &config(),
        &StaticLiveness::running(),
        &oracle,
        &sandbox,
        &mut console,
    )
    .expect("session");

    match &outcome.transcript.records()[0] {
        TurnRecord::Executed { output, .. } => {
            assert_eq!(output, &format!("{TRUNCATION_MARKER}6789abcdef"));
        }
        other => panic!("unexpected record {other:?}"),
    }
}

#[test]
fn empty_proposal_stops_without_executing() {
    let oracle = ScriptedOracle::new(vec!["   \n"]);
    let sandbox = ScriptedSandbox::new(Vec::new());
    let mut console = ScriptedConsole::new(vec!["do something"]);

    let outcome = run_session(
        &config(),
        &StaticLiveness::running(),
        &oracle,
        &sandbox,
        &mut console,
    )
    .expect("session");

    assert_eq!(outcome.stop, SessionStop::OracleExhausted);
    assert!(sandbox.commands().is_empty());
    assert!(
        console
            .shown()
            .iter()
            .any(|line| line.contains("Model returned an empty command. Stopping."))
    );
}

/// A new goal replaces the old one, but the transcript carries over.
#[test]
fn new_goal_keeps_earlier_records_visible() {
    let oracle = ScriptedOracle::new(vec!["uname -a", "df -h"]);
    let sandbox = ScriptedSandbox::new(vec![
        ScriptedRun::ok("Linux box\n"),
        ScriptedRun::ok("/dev/sda1 10G\n"),
    ]);
    let mut console = ScriptedConsole::new(vec!["which os", "check disk space", "exit"]);

    let outcome = run_session(
        &config(),
        &StaticLiveness::running(),
        &oracle,
        &sandbox,
        &mut console,
    )
    .expect("session");

    let calls = oracle.calls();
    assert_eq!(calls[0].goal, "which os");
    assert_eq!(calls[1].goal, "check disk space");
    assert!(calls[1].transcript.contains("$ uname -a\nLinux box\n"));
    assert_eq!(outcome.goal.as_deref(), Some("check disk space"));
    assert_eq!(outcome.turns, 2);
}

#[test]
fn nonzero_exit_is_recorded_and_loop_continues() {
    let oracle = ScriptedOracle::new(vec!["ls missing", "ls"]);
    let sandbox = ScriptedSandbox::new(vec![
        ScriptedRun::exit(2, "ls: cannot access 'missing': No such file or directory\n"),
        ScriptedRun::ok("present\n"),
    ]);
    let mut console = ScriptedConsole::new(vec!["find the file", "", "exit"]);

    let outcome = run_session(
        &config(),
        &StaticLiveness::running(),
        &oracle,
        &sandbox,
        &mut console,
    )
    .expect("session");

    assert_eq!(outcome.turns, 2);
    match &outcome.transcript.records()[0] {
        TurnRecord::Executed { exit_code, .. } => assert_eq!(*exit_code, 2),
        other => panic!("unexpected record {other:?}"),
    }
    assert!(oracle.calls()[1].transcript.contains("[exit=2]"));
}

#[test]
fn liveness_failure_prevents_any_oracle_or_sandbox_call() {
    let liveness = StaticLiveness::stopped();
    let oracle = ScriptedOracle::new(vec!["ls"]);
    let sandbox = ScriptedSandbox::new(vec![ScriptedRun::ok("")]);
    let mut console = ScriptedConsole::new(vec!["anything"]);

    let err = run_session(&config(), &liveness, &oracle, &sandbox, &mut console).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ShellError>(),
        Some(ShellError::SandboxUnavailable { .. })
    ));
    assert_eq!(exit_code_for(&err), exit_codes::SANDBOX_UNAVAILABLE);
    assert_eq!(liveness.calls(), 1);
    assert!(oracle.calls().is_empty());
    assert!(sandbox.commands().is_empty());
    assert!(console.prompts().is_empty());
}
