use std::{path::PathBuf, str::FromStr};

use debugger::BreakpointId;

/// A `file:line` source position as typed by the user (1-based line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub file: PathBuf,
    pub line: usize,
}

impl FromStr for SourceLine {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (file, line) = s
            .rsplit_once(':')
            .ok_or_else(|| eyre::eyre!("expected file:line, got {s:?}"))?;
        if file.is_empty() {
            eyre::bail!("missing file in {s:?}");
        }
        let line: usize = line
            .parse()
            .map_err(|_| eyre::eyre!("invalid line number {line:?}"))?;
        if line == 0 {
            eyre::bail!("line numbers start at 1");
        }
        Ok(Self {
            file: PathBuf::from(file),
            line,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Break {
        at: SourceLine,
        name: Option<String>,
    },
    BreakPattern(String),
    Condition {
        id: BreakpointId,
        expression: String,
    },
    Clear(BreakpointId),
    ClearAll,
    Continue,
    Next,
    Step,
    StepInstruction,
    Restart,
    Print(String),
    Where,
    Backtrace,
    Threads,
    Goroutines,
    Locals,
    Args,
    ListBreakpoints,
    Help,
    Quit,
}

pub const HELP: &str = "\
b file:line [name]   set a breakpoint
bp pattern           set breakpoints on every location matching pattern
cond id expr         only stop at breakpoint id when expr holds
clear id             remove a breakpoint
clearall             remove every breakpoint
c | n | s | si       continue, next line, step into, step one instruction
r                    restart the program
p expr               evaluate expr, or assign with `p x = 5`
w                    show the current position
bt                   show the stacktrace
threads, goroutines  list threads or goroutines
locals, args         show variables of the current function
bl                   list breakpoints
q                    quit";

fn breakpoint_id(s: &str) -> eyre::Result<BreakpointId> {
    s.parse()
        .map_err(|_| eyre::eyre!("invalid breakpoint id {s:?}"))
}

fn required<'a>(rest: &'a str, what: &str) -> eyre::Result<&'a str> {
    let rest = rest.trim();
    if rest.is_empty() {
        eyre::bail!("missing {what}");
    }
    Ok(rest)
}

impl FromStr for Command {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (head, rest) = s.split_once(char::is_whitespace).unwrap_or((s, ""));

        let command = match head {
            "b" | "break" => {
                let mut parts = required(rest, "location")?.split_whitespace();
                let at = parts.next().unwrap_or_default().parse()?;
                let name = parts.next().map(str::to_string);
                if let Some(extra) = parts.next() {
                    eyre::bail!("unexpected argument {extra:?}");
                }
                Command::Break { at, name }
            }
            "bp" => Command::BreakPattern(required(rest, "pattern")?.to_string()),
            "cond" => {
                let rest = required(rest, "breakpoint id")?;
                let (id, expression) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                Command::Condition {
                    id: breakpoint_id(id)?,
                    expression: required(expression, "condition")?.to_string(),
                }
            }
            "clear" => Command::Clear(breakpoint_id(required(rest, "breakpoint id")?)?),
            "clearall" => Command::ClearAll,
            "c" | "continue" => Command::Continue,
            "n" | "next" => Command::Next,
            "s" | "step" => Command::Step,
            "si" => Command::StepInstruction,
            "r" | "restart" => Command::Restart,
            "p" | "print" => Command::Print(required(rest, "expression")?.to_string()),
            "w" | "where" => Command::Where,
            "bt" => Command::Backtrace,
            "threads" => Command::Threads,
            "goroutines" => Command::Goroutines,
            "locals" => Command::Locals,
            "args" => Command::Args,
            "bl" => Command::ListBreakpoints,
            "h" | "help" => Command::Help,
            "q" | "quit" => Command::Quit,
            other => eyre::bail!("unknown command {other:?}, try `help`"),
        };
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakpoints() {
        assert_eq!(
            "b main.go:12".parse::<Command>().unwrap(),
            Command::Break {
                at: SourceLine {
                    file: PathBuf::from("main.go"),
                    line: 12
                },
                name: None
            }
        );
        assert_eq!(
            "b  ~/src/app/main.go:3  entry".parse::<Command>().unwrap(),
            Command::Break {
                at: SourceLine {
                    file: PathBuf::from("~/src/app/main.go"),
                    line: 3
                },
                name: Some("entry".to_string())
            }
        );
        assert!("b main.go".parse::<Command>().is_err());
        assert!("b main.go:0".parse::<Command>().is_err());
        assert!("b".parse::<Command>().is_err());
    }

    #[test]
    fn expressions_keep_their_spacing() {
        assert_eq!(
            "cond 4 x > 5 && y == \"a b\"".parse::<Command>().unwrap(),
            Command::Condition {
                id: 4,
                expression: "x > 5 && y == \"a b\"".to_string()
            }
        );
        assert_eq!(
            "p x = 5".parse::<Command>().unwrap(),
            Command::Print("x = 5".to_string())
        );
        assert!("cond 4".parse::<Command>().is_err());
        assert!("cond x y".parse::<Command>().is_err());
    }

    #[test]
    fn simple_commands() {
        let cases = [
            ("c", Command::Continue),
            ("n", Command::Next),
            ("s", Command::Step),
            ("si", Command::StepInstruction),
            ("r", Command::Restart),
            ("w", Command::Where),
            ("bt", Command::Backtrace),
            ("bl", Command::ListBreakpoints),
            ("clearall", Command::ClearAll),
            ("clear 3", Command::Clear(3)),
            ("bp main.handler", Command::BreakPattern("main.handler".to_string())),
            ("  q  ", Command::Quit),
        ];
        for (input, expected) in cases {
            assert_eq!(input.parse::<Command>().unwrap(), expected, "{input}");
        }
        assert!("frobnicate".parse::<Command>().is_err());
    }
}
