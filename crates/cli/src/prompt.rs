//! Interactive prompts for names that were not given on the command line

use anyhow::{bail, Result};
use bypasser_common::{validate_name, PeerRef};
use std::fmt::Display;
use std::io::{self, BufRead, StdinLock, Stdout, Write};

pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl Prompter<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_line(&mut self, prompt: &str) -> Result<String> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            bail!("no input (end of file)");
        }
        Ok(line.trim().to_string())
    }

    fn complain(&mut self, err: impl Display) -> Result<()> {
        writeln!(self.output, "Error: {}", err)?;
        Ok(())
    }

    /// Ask until a valid `[a-z0-9]+` name is entered
    pub fn name(&mut self, kind: &'static str) -> Result<String> {
        loop {
            let text = self.read_line(&format!("Enter {} name: ", kind))?;
            match validate_name(kind, &text) {
                Ok(()) => return Ok(text),
                Err(e) => self.complain(e)?,
            }
        }
    }

    /// Ask until a valid `vpn:peer` reference is entered
    pub fn peer_ref(&mut self) -> Result<PeerRef> {
        loop {
            let text = self.read_line("Enter peer name (vpn:peer): ")?;
            match text.parse() {
                Ok(peer_ref) => return Ok(peer_ref),
                Err(e) => self.complain(e)?,
            }
        }
    }

    /// Numbered menu; accepts an index or anything `parse` understands
    pub fn select<T, E, F>(&mut self, title: &str, hint: &str, choices: &[T], parse: F) -> Result<T>
    where
        T: Display + Clone,
        E: Display,
        F: Fn(&str) -> std::result::Result<T, E>,
    {
        writeln!(self.output, "{}", title)?;
        for (i, choice) in choices.iter().enumerate() {
            writeln!(self.output, "  {}. {}", i + 1, choice)?;
        }
        loop {
            let text = self.read_line(&format!("Choice (number or {}): ", hint))?;
            if let Ok(n) = text.parse::<usize>() {
                if (1..=choices.len()).contains(&n) {
                    return Ok(choices[n - 1].clone());
                }
            }
            match parse(&text) {
                Ok(choice) => return Ok(choice),
                Err(e) => self.complain(e)?,
            }
        }
    }
}
