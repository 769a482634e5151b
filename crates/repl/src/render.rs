//! Plain-text views of store snapshots.

use std::fmt::Write;

use debugger::{Annotated, Breakpoint, Evaluation, Frame, Goroutine, Scope, Thread, Variable};

fn marker(active: bool) -> &'static str {
    if active { "=>" } else { "  " }
}

pub fn scope(scope: Option<&Scope>) -> String {
    match scope {
        Some(scope) => format!("stopped at {}:{}", scope.file.display(), scope.line),
        None => "not stopped".to_string(),
    }
}

pub fn breakpoints(breakpoints: &[Breakpoint]) -> String {
    if breakpoints.is_empty() {
        return "no breakpoints".to_string();
    }
    let mut out = String::new();
    for bp in breakpoints {
        let id = if bp.is_confirmed() {
            bp.id.to_string()
        } else {
            "?".to_string()
        };
        let _ = write!(out, "{id:>4} {:<8} {}", bp.name, bp.location.to_pattern());
        if let Some(condition) = &bp.condition {
            let _ = write!(out, " if {condition}");
        }
        if bp.pending_change {
            out.push_str(" (pending)");
        }
        out.push('\n');
    }
    out.truncate(out.trim_end().len());
    out
}

fn function_name(function: Option<&debugger::Function>) -> &str {
    function.map(|f| f.name.as_str()).unwrap_or("??")
}

pub fn frames(frames: &[Annotated<Frame>]) -> String {
    frames
        .iter()
        .enumerate()
        .map(|(i, f)| {
            format!(
                "{} {i:>3} {:#x} {} at {}:{}",
                marker(f.active),
                f.value.pc,
                function_name(f.value.function.as_ref()),
                f.value.file.display(),
                f.value.line
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn threads(threads: &[Annotated<Thread>]) -> String {
    threads
        .iter()
        .map(|t| {
            format!(
                "{} thread {} at {}:{} {} (goroutine {})",
                marker(t.active),
                t.value.id,
                t.value.file.display(),
                t.value.line,
                function_name(t.value.function.as_ref()),
                t.value.goroutine_id
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn goroutines(goroutines: &[Annotated<Goroutine>]) -> String {
    goroutines
        .iter()
        .map(|g| {
            let location = match &g.value.user_current_location {
                Some(frame) => format!(
                    "{}:{} {}",
                    frame.file.display(),
                    frame.line,
                    function_name(frame.function.as_ref())
                ),
                None => "??".to_string(),
            };
            format!("{} goroutine {} {location}", marker(g.active), g.value.id)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn variables(variables: &[Variable]) -> String {
    if variables.is_empty() {
        return "(none)".to_string();
    }
    variables
        .iter()
        .map(|v| format!("{} {} = {}", v.name, v.type_name, v.value))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn evaluation(evaluation: &Evaluation) -> String {
    match evaluation {
        Evaluation::Value(v) => {
            let mut out = format!("{} = {}", v.type_name, v.value);
            for child in &v.children {
                let _ = write!(out, "\n  {}: {} = {}", child.name, child.type_name, child.value);
            }
            out
        }
        Evaluation::Assigned { symbol, value } => format!("{symbol} = {value}"),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use debugger::{Function, Location, PENDING_ID};

    use super::*;

    #[test]
    fn breakpoint_listing() {
        let bps = vec![
            Breakpoint {
                id: 1,
                name: "0".into(),
                location: Location::new("/src/main.go", 5),
                pending_change: false,
                condition: Some("x > 5".into()),
            },
            Breakpoint::pending("1", Location::new("/src/main.go", 9)),
        ];

        let out = breakpoints(&bps);

        assert_eq!(
            out,
            "   1 0        /src/main.go:5 if x > 5\n   ? 1        /src/main.go:9 (pending)"
        );
        assert_eq!(bps[1].id, PENDING_ID);
        assert_eq!(breakpoints(&[]), "no breakpoints");
    }

    #[test]
    fn active_frame_is_marked() {
        let frame = |pc, active| Annotated {
            value: Frame {
                pc,
                file: PathBuf::from("main.go"),
                line: 3,
                function: Some(Function {
                    name: "main.main".into(),
                    ..Function::default()
                }),
            },
            active,
        };

        let out = frames(&[frame(0x10, true), frame(0x20, false)]);

        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[0], "=>   0 0x10 main.main at main.go:3");
        assert_eq!(lines[1], "     1 0x20 main.main at main.go:3");
    }

    #[test]
    fn scope_line() {
        assert_eq!(scope(None), "not stopped");
        let current = Scope {
            file: PathBuf::from("a.go"),
            line: 10,
        };
        assert_eq!(scope(Some(&current)), "stopped at a.go:10");
    }

    #[test]
    fn evaluations() {
        let value = Evaluation::Value(Variable {
            name: "p".into(),
            type_name: "main.Point".into(),
            value: "".into(),
            children: vec![Variable {
                name: "X".into(),
                type_name: "int".into(),
                value: "1".into(),
                children: Vec::new(),
            }],
        });
        assert_eq!(evaluation(&value), "main.Point = \n  X: int = 1");

        let assigned = Evaluation::Assigned {
            symbol: "x".into(),
            value: "5".into(),
        };
        assert_eq!(evaluation(&assigned), "x = 5");
    }
}
