//! Real-time driver for a [`TestSession`]
//!
//! One task owns the session. A `tokio::time::interval` produces ticks and an
//! async line reader produces operator commands; `tokio::select!` serializes
//! the two, so a command is always applied between ticks.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::MissedTickBehavior;

use crate::cues::CueSink;
use crate::error::{RosterError, SessionError};
use crate::models::TestResult;
use crate::roster::WarnOutcome;
use crate::session::{TestSession, TickOutcome};

pub const HELP_TEXT: &str = "\
Commands:
  warn <name|#>   record a warning (alias: w)
  stop            end the test for everyone (alias: abort)
  status          show the clock and roster
  help            show this list";

/// Operator command, one per input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Athlete name or 1-based roster number
    Warn(String),
    Stop,
    Status,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,

    #[error("'{0}' needs an athlete name or number")]
    MissingTarget(String),

    #[error("Unknown command '{0}'. Type 'help' for the list.")]
    Unknown(String),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        match verb.to_lowercase().as_str() {
            "" => Err(CommandError::Empty),
            "warn" | "w" if rest.is_empty() => Err(CommandError::MissingTarget(verb.to_string())),
            "warn" | "w" => Ok(Command::Warn(rest.to_string())),
            "stop" | "abort" => Ok(Command::Stop),
            "status" | "s" => Ok(Command::Status),
            "help" | "h" | "?" => Ok(Command::Help),
            _ => Err(CommandError::Unknown(verb.to_string())),
        }
    }
}

/// Effect of a command on the session
#[derive(Debug, Clone, PartialEq)]
pub enum CommandReply {
    Warned(WarnOutcome),
    Stopped(Vec<TestResult>),
    WarnRejected(RosterError),
    StopRejected(SessionError),
    Status,
    Help,
}

/// Something the operator console should render
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerEvent {
    Tick(TickOutcome),
    Reply(CommandReply),
    BadCommand(CommandError),
    /// No more commands will arrive; the clock keeps running
    InputClosed,
}

/// Apply one command between ticks
pub fn execute<C: CueSink>(session: &mut TestSession<C>, command: Command) -> CommandReply {
    match command {
        Command::Warn(target) => {
            let name = resolve_target(session, &target);
            match session.warn(&name) {
                Ok(outcome) => CommandReply::Warned(outcome),
                Err(e) => {
                    tracing::debug!(athlete = %target, error = %e, "Warning rejected");
                    CommandReply::WarnRejected(e)
                }
            }
        }
        Command::Stop => match session.abort() {
            Ok(results) => CommandReply::Stopped(results.to_vec()),
            Err(e) => CommandReply::StopRejected(e),
        },
        Command::Status => CommandReply::Status,
        Command::Help => CommandReply::Help,
    }
}

/// Registered names win over roster numbers, so an athlete called "2" stays reachable
fn resolve_target<C: CueSink>(session: &TestSession<C>, target: &str) -> String {
    let roster = session.roster();
    if roster.get(target).is_some() {
        return target.to_string();
    }

    target
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| roster.athletes().get(i))
        .map(|a| a.name().to_string())
        .unwrap_or_else(|| target.to_string())
}

/// Drive `session` to completion, one tick per `period`, reading commands from `input`.
///
/// Returns the final results in registration order.
pub async fn run_session<C, R, F>(
    session: &mut TestSession<C>,
    input: R,
    period: Duration,
    mut on_event: F,
) -> Vec<TestResult>
where
    C: CueSink,
    R: AsyncBufRead + Unpin,
    F: FnMut(&TestSession<C>, &RunnerEvent),
{
    let mut lines = input.lines();
    let mut input_open = true;

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first interval tick fires immediately
    ticker.tick().await;

    tracing::info!(session = %session.id(), period_ms = period.as_millis() as u64, "Runner started");

    while !session.is_completed() {
        tokio::select! {
            _ = ticker.tick() => {
                let outcome = session.tick();
                on_event(session, &RunnerEvent::Tick(outcome));
            }
            line = lines.next_line(), if input_open => {
                match line {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) => {
                        let event = match line.parse::<Command>() {
                            Ok(command) => RunnerEvent::Reply(execute(session, command)),
                            Err(e) => RunnerEvent::BadCommand(e),
                        };
                        on_event(session, &event);
                    }
                    Ok(None) => {
                        input_open = false;
                        on_event(session, &RunnerEvent::InputClosed);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Command input failed; continuing without it");
                        input_open = false;
                        on_event(session, &RunnerEvent::InputClosed);
                    }
                }
            }
        }
    }

    session.results().map(<[TestResult]>::to_vec).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cues::{RecordedCues, SilentCues};
    use crate::models::Stage;
    use crate::session::{Completion, Phase, ProtocolTiming};
    use crate::stages::StageTable;
    use tokio::io::BufReader;

    fn session(names: &[&str], preparation_seconds: u32) -> TestSession<RecordedCues> {
        let table = StageTable::new(vec![
            Stage::new("1", 12.0, 6.0, 160),
            Stage::new("2", 14.4, 5.0, 200),
        ])
        .unwrap();
        let timing = ProtocolTiming {
            preparation_seconds,
            rest_seconds: 3,
        };
        TestSession::start(names.iter().copied(), table, timing, RecordedCues::new()).unwrap()
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!("warn Ana".parse(), Ok(Command::Warn("Ana".to_string())));
        assert_eq!("  W  Maria Clara ".parse(), Ok(Command::Warn("Maria Clara".to_string())));
        assert_eq!("abort".parse(), Ok(Command::Stop));
        assert_eq!("STATUS".parse(), Ok(Command::Status));
        assert_eq!("?".parse(), Ok(Command::Help));

        assert_eq!("warn".parse::<Command>(), Err(CommandError::MissingTarget("warn".to_string())));
        assert_eq!("   ".parse::<Command>(), Err(CommandError::Empty));
        assert_eq!("jump".parse::<Command>(), Err(CommandError::Unknown("jump".to_string())));
    }

    #[test]
    fn test_warn_by_number_and_name() {
        let mut session = session(&["Ana", "2", "Bruno"], 5);

        let reply = execute(&mut session, Command::Warn("3".to_string()));
        assert_eq!(
            reply,
            CommandReply::Warned(WarnOutcome::Warned {
                name: "Bruno".to_string()
            })
        );

        // A registered name beats the roster number
        execute(&mut session, Command::Warn("2".to_string()));
        assert_eq!(session.roster().get("2").unwrap().warnings(), 1);
        assert_eq!(session.roster().get("Ana").unwrap().warnings(), 0);

        let reply = execute(&mut session, Command::Warn("Zé".to_string()));
        assert_eq!(
            reply,
            CommandReply::WarnRejected(RosterError::UnknownAthlete {
                name: "Zé".to_string()
            })
        );
    }

    #[test]
    fn test_stop_before_start_is_rejected() {
        let mut session = session(&["Ana"], 5);

        assert_eq!(
            execute(&mut session, Command::Stop),
            CommandReply::StopRejected(SessionError::NotStarted)
        );
        assert_eq!(session.phase(), Phase::Preparing);
    }

    #[tokio::test]
    async fn test_commands_complete_session() {
        let mut session = session(&["Ana", "Bruno"], 10_000);
        let input = BufReader::new(&b"w ana\nbogus\nwarn 1\nwarn Bruno\n\nwarn Bruno\n"[..]);

        let mut events = Vec::new();
        let results = run_session(&mut session, input, Duration::from_millis(1), |_, event| {
            events.push(event.clone())
        })
        .await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.distance == 0));
        assert_eq!(session.completion(), Some(Completion::AllEliminated));
        assert!(events
            .iter()
            .any(|e| matches!(e, RunnerEvent::BadCommand(CommandError::Unknown(_)))));
    }

    #[tokio::test]
    async fn test_clock_runs_after_input_closes() {
        let mut session = session(&["Ana"], 2);
        let input = BufReader::new(&b""[..]);

        let mut saw_close = false;
        let results = run_session(&mut session, input, Duration::from_millis(1), |_, event| {
            if *event == RunnerEvent::InputClosed {
                saw_close = true;
            }
        })
        .await;

        assert!(saw_close);
        assert_eq!(session.completion(), Some(Completion::TableExhausted));
        assert_eq!(results[0].distance, 200);
        assert_eq!(session.cues().count(crate::cues::Cue::NextStage), 1);
    }

    #[tokio::test]
    async fn test_runs_with_boxed_sink() {
        let table = StageTable::new(vec![Stage::new("1", 12.0, 6.0, 160)]).unwrap();
        let timing = ProtocolTiming {
            preparation_seconds: 1,
            rest_seconds: 1,
        };
        let sink: Box<dyn CueSink> = Box::new(SilentCues);
        let mut session = TestSession::start(["Ana"], table, timing, sink).unwrap();

        let results = run_session(&mut session, BufReader::new(&b""[..]), Duration::from_millis(1), |_, _| {}).await;
        assert_eq!(results[0].level, "1");
    }
}
