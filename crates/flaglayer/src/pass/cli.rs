//! Command-line pass.

use std::collections::VecDeque;

use super::{SourcePass, is_help};
use crate::error::Error;
use crate::flag::FlagSet;
use crate::source::Source;

/// Applies `-name`, `-name=value`, `-name value` and `--name` arguments.
///
/// Scanning stops at the first non-flag argument or after a standalone `--`;
/// everything left becomes positional. Boolean flags never consume the next
/// argument. `-help` and `-h`, unless declared, print usage and return
/// [`Error::HelpRequested`].
pub struct CliPass {
    args: Vec<String>,
}

impl CliPass {
    /// Creates a pass over the arguments, without the program name.
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

enum Step {
    Flag,
    Done,
}

fn parse_one(flags: &mut FlagSet, rest: &mut VecDeque<String>) -> Result<Step, Error> {
    let Some(token) = rest.front() else {
        return Ok(Step::Done);
    };
    if token.len() < 2 || !token.starts_with('-') {
        return Ok(Step::Done);
    }

    let dashes = if token.starts_with("--") { 2 } else { 1 };
    if token.len() == 2 && dashes == 2 {
        rest.pop_front();
        return Ok(Step::Done);
    }

    let body = &token[dashes..];
    if body.is_empty() || body.starts_with(['-', '=']) {
        return Err(Error::Syntax {
            token: token.clone(),
        });
    }

    let (name, inline) = match body.split_once('=') {
        Some((name, value)) => (name.to_string(), Some(value.to_string())),
        None => (body.to_string(), None),
    };
    rest.pop_front();

    let Some(flag) = flags.lookup(&name) else {
        if is_help(&name) {
            flags.usage();
            return Err(Error::HelpRequested);
        }
        return Err(Error::UnknownFlag {
            name,
            origin: Source::Cli,
        });
    };

    let raw = if flag.value().is_bool_flag() {
        inline.unwrap_or_else(|| "true".to_string())
    } else {
        match inline.or_else(|| rest.pop_front()) {
            Some(value) => value,
            None => return Err(Error::MissingArgument { name }),
        }
    };

    flags.assign(&name, &raw, Source::Cli)?;
    Ok(Step::Flag)
}

impl SourcePass for CliPass {
    fn source(&self) -> Source {
        Source::Cli
    }

    fn apply(&self, flags: &mut FlagSet) -> Result<usize, Error> {
        let mut rest: VecDeque<String> = self.args.iter().cloned().collect();
        let mut applied = 0;

        let result = loop {
            match parse_one(flags, &mut rest) {
                Ok(Step::Flag) => applied += 1,
                Ok(Step::Done) => break Ok(applied),
                Err(err) => break Err(err),
            }
        };

        flags.args = rest.into_iter().collect();
        result
    }
}
