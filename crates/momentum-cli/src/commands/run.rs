//! Interactive terminal session.
//!
//! The ticker drives the clock; stdin lines are user intents. Output is
//! either human-readable or one JSON event per line (`--json`).

use std::io::{BufRead, Write};
use std::str::FromStr;

use clap::Args;
use momentum_core::timer::format_clock;
use momentum_core::{
    Config, Database, Event, KvStore, Meaningful, Perfectionism, ReflectionField,
    SessionController, SessionPhase, SessionSnapshot,
};
use tokio::sync::{broadcast, mpsc};

#[derive(Args)]
pub struct RunArgs {
    /// Start a session immediately
    #[arg(long)]
    start: bool,
    /// Print events as JSON lines instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Start,
    Stop,
    Dismiss,
    Answer(ReflectionField),
    Finish,
    Status,
    Help,
    Quit,
}

impl FromStr for Input {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (cmd, rest) = match line.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (line, ""),
        };
        match cmd.to_ascii_lowercase().as_str() {
            "start" => Ok(Input::Start),
            "stop" => Ok(Input::Stop),
            "ok" | "dismiss" => Ok(Input::Dismiss),
            "meaningful" => Ok(Input::Answer(ReflectionField::Meaningful(
                Meaningful::from_str(rest)?,
            ))),
            "perfectionism" => Ok(Input::Answer(ReflectionField::Perfectionism(
                Perfectionism::from_str(rest)?,
            ))),
            "next" => Ok(Input::Answer(ReflectionField::NextTask(rest.to_string()))),
            "finish" => Ok(Input::Finish),
            "status" => Ok(Input::Status),
            "help" | "?" => Ok(Input::Help),
            "quit" | "exit" | "q" => Ok(Input::Quit),
            other => Err(format!("unknown command '{other}' (try 'help')")),
        }
    }
}

const HELP: &str = "\
commands:
  start                          begin a session (activation countdown)
  stop                           end activation/focus and reflect
  ok                             dismiss the check-in
  meaningful <yes|no>            did you start something meaningful?
  perfectionism <yes|no|unsure>  did you get stuck perfecting details?
  next <text>                    note your next action (optional)
  finish                         save the reflection
  status                         show the current state
  quit";

struct Renderer {
    json: bool,
    bell: bool,
    /// A clock line without trailing newline is on screen.
    clock_pending: bool,
}

impl Renderer {
    fn line(&mut self, text: &str) {
        let mut out = std::io::stdout().lock();
        if self.clock_pending {
            let _ = writeln!(out);
            self.clock_pending = false;
        }
        let _ = writeln!(out, "{text}");
    }

    fn json_line<T: serde::Serialize>(&mut self, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => self.line(&json),
            Err(e) => tracing::warn!(error = %e, "failed to encode event"),
        }
    }

    fn clock(&mut self, snapshot: &SessionSnapshot) {
        if self.json {
            return;
        }
        let text = match snapshot.phase {
            SessionPhase::Activation => {
                format!("activation  {}", format_clock(snapshot.activation_remaining_secs))
            }
            SessionPhase::Focus => format!("focus       {}", format_clock(snapshot.focus_elapsed_secs)),
            _ => return,
        };
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "\r{text}  ");
        let _ = out.flush();
        self.clock_pending = true;
    }

    fn event(&mut self, event: &Event) {
        if self.json {
            self.json_line(event);
            return;
        }
        match event {
            Event::SessionStarted { activation_secs, .. } => self.line(&format!(
                "Activation zone: {} to get moving. Progress over perfection.",
                format_clock(*activation_secs)
            )),
            Event::FocusStarted { .. } => {
                self.line("Deep focus. No alarm, no limit. Type 'stop' when you're done.")
            }
            Event::CheckinDue { focus_elapsed_secs, .. } => {
                if self.bell {
                    print!("\x07");
                }
                self.line(&format!(
                    "Check-in at {}: are you refining or avoiding? Still on what matters? ('ok' to continue)",
                    format_clock(*focus_elapsed_secs)
                ));
            }
            Event::CheckinDismissed { .. } => self.line("Back to focus."),
            Event::SessionStopped { .. } => self.line(
                "Reflection: answer 'meaningful <yes|no>' and 'perfectionism <yes|no|unsure>', \
                 optionally 'next <text>', then 'finish'.",
            ),
            Event::ReflectionUpdated { field, complete, .. } => {
                let hint = if *complete { " (ready to finish)" } else { "" };
                self.line(&format!("noted {}{hint}", field.name()));
            }
            Event::SessionFinished { record, total_sessions, .. } => self.line(&format!(
                "Saved: activation {} + focus {}. {total_sessions} session(s) so far.",
                format_clock(record.activation_used_secs),
                format_clock(record.focus_secs)
            )),
            Event::StateSnapshot { snapshot, .. } => self.status(snapshot),
        }
    }

    fn status(&mut self, s: &SessionSnapshot) {
        let reflection = &s.reflection;
        self.line(&format!(
            "phase {}  activation {}  focus {}  check-in {}  meaningful {}  perfectionism {}",
            s.phase,
            format_clock(s.activation_remaining_secs),
            format_clock(s.focus_elapsed_secs),
            if s.prompt_visible { "open" } else { "-" },
            reflection.meaningful.map(|m| m.to_string()).unwrap_or_else(|| "-".into()),
            reflection.perfectionism.map(|p| p.to_string()).unwrap_or_else(|| "-".into()),
        ));
    }

    fn rejected(&mut self, message: &str) {
        if self.json {
            self.json_line(&serde_json::json!({ "type": "Rejected", "message": message }));
        } else {
            self.line(message);
        }
    }
}

/// Read stdin on a plain thread so a pending read never blocks shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn rejection_for(input: &Input, snapshot: &SessionSnapshot) -> &'static str {
    match input {
        Input::Start => "a session is already in progress",
        Input::Stop => "no running session to stop",
        Input::Dismiss => "no check-in to dismiss",
        Input::Answer(_) => "answers are taken during reflection",
        Input::Finish if snapshot.phase != SessionPhase::Reflection => "nothing to finish",
        Input::Finish => "answer both 'meaningful' and 'perfectionism' first",
        _ => "",
    }
}

fn apply<S: KvStore>(
    controller: &mut SessionController<S>,
    input: Input,
    renderer: &mut Renderer,
) {
    let snapshot = controller.snapshot();
    let accepted = match &input {
        Input::Start => controller.start_session().is_some(),
        Input::Stop => controller.stop_session().is_some(),
        Input::Dismiss => controller.dismiss_prompt().is_some(),
        Input::Answer(field) => controller.set_reflection_field(field.clone()).is_some(),
        Input::Finish => match controller.finish_reflection() {
            Ok(event) => event.is_some(),
            Err(e) => {
                tracing::error!(error = %e, "failed to save session");
                renderer.rejected(&format!("could not save session: {e} (try 'finish' again)"));
                return;
            }
        },
        Input::Status => {
            let event = controller.engine().snapshot_event();
            renderer.event(&event);
            true
        }
        Input::Help => {
            if !renderer.json {
                renderer.line(HELP);
            }
            true
        }
        Input::Quit => true,
    };
    if !accepted {
        renderer.rejected(rejection_for(&input, &snapshot));
    }
}

fn flush_events(events: &mut broadcast::Receiver<Event>, renderer: &mut Renderer) {
    loop {
        match events.try_recv() {
            Ok(event) => renderer.event(&event),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "renderer fell behind, events dropped");
            }
            Err(_) => break,
        }
    }
}

pub async fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let engine_config = config.engine_config()?;
    let db = Database::open()?;

    let mut controller = SessionController::new(engine_config, db);
    let mut events = controller.subscribe();
    let mut renderer = Renderer {
        json: args.json,
        bell: config.checkin.bell,
        clock_pending: false,
    };
    let mut lines = spawn_stdin_reader();

    if !args.json {
        renderer.line("Momentum: beat procrastination, avoid perfectionism. Type 'help' for commands.");
    }
    if args.start {
        controller.start_session();
        flush_events(&mut events, &mut renderer);
    }

    loop {
        tokio::select! {
            _ = controller.next_tick() => {
                controller.tick();
                flush_events(&mut events, &mut renderer);
                renderer.clock(&controller.snapshot());
            }
            line = lines.recv() => {
                let Some(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<Input>() {
                    Ok(Input::Quit) => break,
                    Ok(input) => apply(&mut controller, input, &mut renderer),
                    Err(message) => renderer.rejected(&message),
                }
                flush_events(&mut events, &mut renderer);
            }
        }
    }

    if controller.snapshot().phase != SessionPhase::Idle {
        tracing::info!(phase = %controller.snapshot().phase, "exiting with an unfinished session");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!("start".parse::<Input>().unwrap(), Input::Start);
        assert_eq!("  OK ".parse::<Input>().unwrap(), Input::Dismiss);
        assert_eq!(
            "meaningful yes".parse::<Input>().unwrap(),
            Input::Answer(ReflectionField::Meaningful(Meaningful::Yes))
        );
        assert_eq!(
            "perfectionism Unsure".parse::<Input>().unwrap(),
            Input::Answer(ReflectionField::Perfectionism(Perfectionism::Unsure))
        );
        assert_eq!(
            "next  call the bank ".parse::<Input>().unwrap(),
            Input::Answer(ReflectionField::NextTask("call the bank".into()))
        );
        assert_eq!("q".parse::<Input>().unwrap(), Input::Quit);
    }

    #[test]
    fn rejects_bad_input() {
        assert!("meaningful maybe".parse::<Input>().is_err());
        assert!("perfectionism".parse::<Input>().is_err());
        assert!("dance".parse::<Input>().is_err());
    }

    #[test]
    fn finish_rejection_depends_on_phase() {
        let mut snapshot = momentum_core::SessionEngine::default().snapshot();
        assert_eq!(rejection_for(&Input::Finish, &snapshot), "nothing to finish");
        snapshot.phase = SessionPhase::Reflection;
        assert!(rejection_for(&Input::Finish, &snapshot).contains("meaningful"));
    }
}
