//! Console interaction: the cleanup confirmation prompt and the exit pause.

use std::io::{self, BufRead, IsTerminal, Write};

use bytesize::ByteSize;
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::terminal;

use crate::actions::{CleanupCandidate, CleanupChoice, CleanupPrompt};

/// Line-oriented prompt over any reader/writer pair.
///
/// End of input counts as cancel, so a closed stdin never deletes anything.
pub struct TerminalPrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    /// Create a prompt reading answers from `input` and writing to `output`.
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Consume the prompt, returning the output sink.
    pub fn into_output(self) -> W {
        self.output
    }
}

impl TerminalPrompt<io::StdinLock<'static>, io::Stdout> {
    /// Prompt on the process's stdin and stdout.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

fn parse_choice(answer: &str) -> Option<CleanupChoice> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "d" | "delete" => Some(CleanupChoice::Delete),
        "l" | "list" => Some(CleanupChoice::List),
        "c" | "cancel" => Some(CleanupChoice::Cancel),
        _ => None,
    }
}

impl<R: BufRead, W: Write> CleanupPrompt for TerminalPrompt<R, W> {
    fn choose(&mut self, count: usize, total_bytes: u64) -> io::Result<CleanupChoice> {
        writeln!(
            self.output,
            "{} unreferenced file(s) in the library, {} in total.",
            count,
            ByteSize::b(total_bytes)
        )?;

        loop {
            write!(self.output, "[d]elete / [l]ist / [c]ancel: ")?;
            self.output.flush()?;

            let mut answer = String::new();
            if self.input.read_line(&mut answer)? == 0 {
                writeln!(self.output)?;
                return Ok(CleanupChoice::Cancel);
            }
            match parse_choice(&answer) {
                Some(choice) => return Ok(choice),
                None => writeln!(self.output, "Please answer d, l or c.")?,
            }
        }
    }

    fn show_list(&mut self, candidates: &[CleanupCandidate]) -> io::Result<()> {
        for candidate in candidates {
            writeln!(
                self.output,
                "  {:>10}  {}",
                ByteSize::b(candidate.size).to_string(),
                candidate.path.display()
            )?;
        }
        Ok(())
    }
}

/// Confirms deletion without asking (`cleanup --yes`).
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

impl CleanupPrompt for AutoConfirm {
    fn choose(&mut self, _count: usize, _total_bytes: u64) -> io::Result<CleanupChoice> {
        Ok(CleanupChoice::Delete)
    }

    fn show_list(&mut self, _candidates: &[CleanupCandidate]) -> io::Result<()> {
        Ok(())
    }
}

/// Wait for a single key press.
///
/// Does nothing when stdin is not a terminal.
///
/// # Errors
///
/// Returns an error if raw mode can't be entered or events can't be read.
pub fn pause_for_key() -> io::Result<()> {
    if !io::stdin().is_terminal() {
        log::debug!("stdin is not a terminal, skipping pause");
        return Ok(());
    }

    let mut stdout = io::stdout();
    write!(stdout, "Press any key to exit...")?;
    stdout.flush()?;

    terminal::enable_raw_mode()?;
    let result = wait_for_key_press();
    let _ = terminal::disable_raw_mode();
    writeln!(stdout)?;
    result
}

fn wait_for_key_press() -> io::Result<()> {
    loop {
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                return Ok(());
            }
        }
    }
}
