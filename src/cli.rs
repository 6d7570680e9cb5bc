//! Line commands for interactive annotation.
//!
//! Each input line is parsed into a [`Command`] and run against a
//! [`SessionController`]. The reply is plain text for the terminal.

use std::path::PathBuf;
use std::str::FromStr;

use crate::controller::{SessionController, SessionError};
use crate::model::SliceIndex;
use crate::render::RenderSurface;

/// Usage shown by `help`.
pub const HELP: &str = "\
Commands:
  add X Y      place a landmark on the current slice
  undo         remove the last landmark of the current slice
  next, prev   move one slice forward or back
  goto N       show slice N (counting from 1)
  save         persist a complete sequence
  clear        remove every landmark (and persisted ones if saved)
  list         show placed landmarks
  open PATH    open a sequence directory
  open-next    open the next sequence still to annotate
  status       show progress over all sequences
  help         show this text
  quit         leave";

/// Errors raised while parsing a command line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// Line holds no command
    #[error("Empty command")]
    Empty,

    /// Command word not recognized
    #[error("Unknown command '{0}' (try 'help')")]
    Unknown(String),

    /// A required argument is missing
    #[error("'{command}' needs {argument}")]
    MissingArgument {
        /// Command word
        command: &'static str,
        /// Argument description
        argument: &'static str,
    },

    /// Argument is not a number
    #[error("'{value}' is not a valid {argument}")]
    InvalidNumber {
        /// Argument description
        argument: &'static str,
        /// Text given
        value: String,
    },

    /// More arguments than the command takes
    #[error("'{0}' takes fewer arguments")]
    TooManyArguments(&'static str),
}

/// One parsed line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Place a landmark on the active slice
    Add {
        /// Horizontal position
        x: f32,
        /// Vertical position
        y: f32,
    },
    /// Undo on the active slice
    Undo,
    /// Next slice
    Next,
    /// Previous slice
    Prev,
    /// Jump to a slice (zero-based)
    Goto(SliceIndex),
    /// Persist the session
    Save,
    /// Remove every landmark
    Clear,
    /// List placed landmarks
    List,
    /// Open a sequence directory
    Open(PathBuf),
    /// Open the next incomplete sequence
    OpenNext,
    /// Show dataset progress
    Status,
    /// Show usage
    Help,
    /// Leave
    Quit,
}

impl Command {
    /// Parse one input line.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut words = line.split_whitespace();
        let word = words.next().ok_or(CommandError::Empty)?;

        let command = match word.to_ascii_lowercase().as_str() {
            "add" | "a" => {
                let x = number(words.next(), "add", "x")?;
                let y = number(words.next(), "add", "y")?;
                Command::Add { x, y }
            }
            "undo" | "u" => Command::Undo,
            "next" | "n" => Command::Next,
            "prev" | "p" => Command::Prev,
            "goto" | "g" => {
                let slice: SliceIndex = number(words.next(), "goto", "slice number")?;
                if slice == 0 {
                    return Err(CommandError::InvalidNumber {
                        argument: "slice number",
                        value: slice.to_string(),
                    });
                }
                Command::Goto(slice - 1)
            }
            "save" | "s" => Command::Save,
            "clear" => Command::Clear,
            "list" | "l" => Command::List,
            "open" | "o" => {
                // Paths may contain spaces
                let rest = line.trim_start()[word.len()..].trim();
                if rest.is_empty() {
                    return Err(CommandError::MissingArgument {
                        command: "open",
                        argument: "a sequence path",
                    });
                }
                return Ok(Command::Open(PathBuf::from(rest)));
            }
            "open-next" => Command::OpenNext,
            "status" => Command::Status,
            "help" | "h" | "?" => Command::Help,
            "quit" | "q" | "exit" => Command::Quit,
            _ => return Err(CommandError::Unknown(word.to_string())),
        };

        if words.next().is_some() {
            return Err(CommandError::TooManyArguments(command.name()));
        }
        Ok(command)
    }

    /// Command word.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Add { .. } => "add",
            Command::Undo => "undo",
            Command::Next => "next",
            Command::Prev => "prev",
            Command::Goto(_) => "goto",
            Command::Save => "save",
            Command::Clear => "clear",
            Command::List => "list",
            Command::Open(_) => "open",
            Command::OpenNext => "open-next",
            Command::Status => "status",
            Command::Help => "help",
            Command::Quit => "quit",
        }
    }
}

fn number<T: FromStr>(
    word: Option<&str>,
    command: &'static str,
    argument: &'static str,
) -> Result<T, CommandError> {
    let word = word.ok_or(CommandError::MissingArgument { command, argument })?;
    word.parse().map_err(|_| CommandError::InvalidNumber {
        argument,
        value: word.to_string(),
    })
}

/// What the prompt loop should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Print the text and keep reading
    Continue(String),
    /// Stop reading
    Quit,
}

/// Run a command against the controller.
pub fn execute<S: RenderSurface>(
    controller: &mut SessionController<S>,
    command: &Command,
) -> Result<Reply, SessionError> {
    let text = match command {
        Command::Add { x, y } => {
            let landmark = controller.add_landmark(*x, *y)?;
            format!(
                "Landmark {} on slice {} at ({}, {}). {}",
                landmark.order_index,
                landmark.slice_index + 1,
                landmark.x,
                landmark.y,
                progress(controller)
            )
        }
        Command::Undo => match controller.undo_landmark()? {
            Some(landmark) => format!(
                "Removed ({}, {}) from slice {}. {}",
                landmark.x,
                landmark.y,
                landmark.slice_index + 1,
                progress(controller)
            ),
            None => "No landmark on this slice".to_string(),
        },
        Command::Next => {
            let slice = controller.next_slice()?;
            slice_label(controller, slice)
        }
        Command::Prev => {
            let slice = controller.prev_slice()?;
            slice_label(controller, slice)
        }
        Command::Goto(slice) => {
            let slice = controller.goto_slice(*slice)?;
            slice_label(controller, slice)
        }
        Command::Save => {
            let report = controller.save()?;
            format!(
                "Saved {} landmarks to {} and {}",
                report.landmarks,
                report.record_path.display(),
                report.table_path.display()
            )
        }
        Command::Clear => {
            let report = controller.clear()?;
            if report.persisted_cleared {
                format!("Cleared {} landmarks and the saved record", report.removed)
            } else {
                format!("Cleared {} landmarks", report.removed)
            }
        }
        Command::List => list(controller)?,
        Command::Open(path) => {
            let session = controller.open(path)?;
            format!(
                "Opened {} ({} slices). {}",
                session.identity(),
                session.slice_count(),
                session.store
            )
        }
        Command::OpenNext => match controller.open_next()? {
            Some(path) => format!("Opened {}. {}", path.display(), progress(controller)),
            None => "Every sequence is annotated".to_string(),
        },
        Command::Status => {
            let counts = controller.status().counts();
            format!(
                "{} of {} sequences complete, {} to annotate",
                counts.complete,
                counts.total(),
                counts.incomplete
            )
        }
        Command::Help => HELP.to_string(),
        Command::Quit => return Ok(Reply::Quit),
    };
    Ok(Reply::Continue(text))
}

fn progress<S: RenderSurface>(controller: &SessionController<S>) -> String {
    controller
        .session()
        .map(|session| session.store.to_string())
        .unwrap_or_default()
}

fn slice_label<S: RenderSurface>(controller: &SessionController<S>, slice: SliceIndex) -> String {
    match controller.session() {
        Some(session) => format!(
            "Slice {}/{} ({} landmarks here)",
            slice + 1,
            session.slice_count(),
            session.store.visible_on(slice).len()
        ),
        None => format!("Slice {}", slice + 1),
    }
}

fn list<S: RenderSurface>(controller: &SessionController<S>) -> Result<String, SessionError> {
    let session = controller.session().ok_or(SessionError::NoSequenceLoaded)?;
    let mut text = format!("{} on slice {}", session.store, session.active_slice() + 1);
    for group in session.store.groups() {
        text.push_str(&format!("\n  slice {}:", group.slice_index() + 1));
        for landmark in group {
            text.push_str(&format!(
                " #{} ({}, {})",
                landmark.order_index, landmark.x, landmark.y
            ));
        }
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TablePaths;
    use crate::format::PersistenceAdapter;
    use crate::render::HeadlessSurface;
    use crate::status::StatusIndex;
    use tempfile::TempDir;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("add 10 20.5").unwrap(), Command::Add { x: 10.0, y: 20.5 });
        assert_eq!(Command::parse("  UNDO ").unwrap(), Command::Undo);
        assert_eq!(Command::parse("g 4").unwrap(), Command::Goto(3));
        assert_eq!(Command::parse("open-next").unwrap(), Command::OpenNext);
        assert_eq!(Command::parse("q").unwrap(), Command::Quit);
        assert_eq!(
            Command::parse("open /data/My Scans/DATASET_AXIAL/1/LEFT/a ").unwrap(),
            Command::Open(PathBuf::from("/data/My Scans/DATASET_AXIAL/1/LEFT/a"))
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Command::parse("   "), Err(CommandError::Empty));
        assert_eq!(Command::parse("jump"), Err(CommandError::Unknown("jump".into())));
        assert!(matches!(
            Command::parse("add 1"),
            Err(CommandError::MissingArgument { argument: "y", .. })
        ));
        for line in ["goto -1", "goto 0", "add x 2"] {
            assert!(
                matches!(Command::parse(line), Err(CommandError::InvalidNumber { .. })),
                "{line}"
            );
        }
        assert_eq!(Command::parse("save now"), Err(CommandError::TooManyArguments("save")));
        assert!(matches!(Command::parse("open"), Err(CommandError::MissingArgument { .. })));
    }

    #[test]
    fn test_execute_session() {
        let dir = TempDir::new().unwrap();
        let seq = dir.path().join("DATASET_SAGITTAL/4/RIGHT/t2");
        std::fs::create_dir_all(&seq).unwrap();
        for i in 0..2 {
            std::fs::write(seq.join(format!("{}.dcm", i)), b"").unwrap();
        }
        let adapter = PersistenceAdapter::new(TablePaths::under(dir.path()));
        let status = StatusIndex::empty(dir.path().join("status.json"));
        let mut controller = SessionController::new(adapter, status, HeadlessSurface::new());

        let run = |controller: &mut SessionController<HeadlessSurface>, line: &str| {
            match execute(controller, &Command::parse(line).unwrap()) {
                Ok(Reply::Continue(text)) => text,
                Ok(Reply::Quit) => "quit".to_string(),
                Err(e) => format!("error: {e}"),
            }
        };

        assert_eq!(run(&mut controller, "list"), "error: No sequence loaded");
        let opened = run(&mut controller, &format!("open {}", seq.display()));
        assert!(opened.contains("2 slices"), "{opened}");

        assert!(run(&mut controller, "add 1 2").ends_with("Points: 1 - MAX: 7"));
        assert_eq!(run(&mut controller, "next"), "Slice 2/2 (0 landmarks here)");
        assert_eq!(run(&mut controller, "undo"), "No landmark on this slice");
        run(&mut controller, "add 3 4");

        let listed = run(&mut controller, "list");
        assert_eq!(
            listed,
            "Points: 2 - MAX: 7 on slice 2\n  slice 1: #1 (1, 2)\n  slice 2: #2 (3, 4)"
        );

        assert_eq!(
            run(&mut controller, "save"),
            "error: 2 of 7 landmarks placed, place the rest before saving"
        );
        assert_eq!(run(&mut controller, "clear"), "Cleared 2 landmarks");
        assert_eq!(run(&mut controller, "quit"), "quit");
    }
}
