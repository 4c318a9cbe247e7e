//! Overwrite confirmation for extraction.
//!
//! The reader never decides on its own whether an existing file may be
//! replaced; it asks an [`OverwritePrompt`].

use std::io::{self, BufRead, Write};
use std::path::Path;

/// Answer to "file exists, overwrite?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Overwrite this file.
    Yes,
    /// Leave the existing file untouched.
    No,
    /// Overwrite this file and every later conflict in the same extraction.
    All,
}

impl Decision {
    /// Interpret a console answer: `y`/`yes`, `all`/`a`, anything else is no.
    pub fn parse(answer: &str) -> Self {
        match answer.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => Decision::Yes,
            "a" | "all" => Decision::All,
            _ => Decision::No,
        }
    }
}

pub trait OverwritePrompt {
    fn confirm(&mut self, path: &Path) -> Decision;
}

impl<F: FnMut(&Path) -> Decision> OverwritePrompt for F {
    fn confirm(&mut self, path: &Path) -> Decision {
        self(path)
    }
}

/// Never overwrite; every conflict is skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverOverwrite;

impl OverwritePrompt for NeverOverwrite {
    fn confirm(&mut self, _path: &Path) -> Decision {
        Decision::No
    }
}

/// Interactive `y/N/all` prompt over a line-based input and an output.
#[derive(Debug)]
pub struct ConsolePrompt<I, O> {
    input: I,
    output: O,
}

impl ConsolePrompt<io::StdinLock<'static>, io::Stderr> {
    /// Prompt on stderr and read answers from stdin.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<I: BufRead, O: Write> ConsolePrompt<I, O> {
    pub fn new(input: I, output: O) -> Self {
        Self { input, output }
    }
}

impl<I: BufRead, O: Write> OverwritePrompt for ConsolePrompt<I, O> {
    fn confirm(&mut self, path: &Path) -> Decision {
        let _ = write!(
            self.output,
            "File already exists: {}\nOverwrite? (y/N/all): ",
            path.display()
        );
        let _ = self.output.flush();

        let mut answer = String::new();
        match self.input.read_line(&mut answer) {
            Ok(_) => Decision::parse(&answer),
            // unreadable input (closed stdin) means no
            Err(_) => Decision::No,
        }
    }
}
