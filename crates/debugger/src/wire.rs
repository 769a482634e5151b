//! delve API v2 payloads, as sent and received by `RPCServer.*` calls.
//!
//! Only the fields the client reads are modelled; delve sends more.

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

use crate::types;

/// Go encodes nil slices as `null`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoadConfig {
    pub follow_pointers: bool,
    pub max_variable_recurse: i64,
    pub max_string_len: i64,
    pub max_array_values: i64,
    pub max_struct_fields: i64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            follow_pointers: true,
            max_variable_recurse: 1,
            max_string_len: 64,
            max_array_values: 64,
            max_struct_fields: -1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Breakpoint {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr: Option<u64>,
    #[serde(default)]
    pub file: PathBuf,
    #[serde(default)]
    pub line: usize,
    #[serde(rename = "Cond", default, skip_serializing_if = "String::is_empty")]
    pub cond: String,
    #[serde(
        rename = "LoadArgs",
        default,
        skip_deserializing,
        skip_serializing_if = "Option::is_none"
    )]
    pub load_args: Option<LoadConfig>,
    #[serde(
        rename = "LoadLocals",
        default,
        skip_deserializing,
        skip_serializing_if = "Option::is_none"
    )]
    pub load_locals: Option<LoadConfig>,
    /// Everything else delve sends, carried through untouched so that
    /// `AmendBreakpoint` does not reset it.
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

impl From<Breakpoint> for types::Breakpoint {
    fn from(bp: Breakpoint) -> Self {
        types::Breakpoint {
            id: bp.id,
            name: bp.name,
            location: types::Location::new(bp.file, bp.line),
            pending_change: false,
            condition: (!bp.cond.is_empty()).then_some(bp.cond),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct Variable {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub children: Vec<Variable>,
}

impl From<Variable> for types::Variable {
    fn from(v: Variable) -> Self {
        types::Variable {
            name: v.name,
            type_name: v.type_name,
            value: v.value,
            children: v.children.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct Function {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct BreakpointInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub arguments: Vec<Variable>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub locals: Vec<Variable>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Thread {
    pub id: i64,
    #[serde(default)]
    pub pc: u64,
    #[serde(default)]
    pub file: PathBuf,
    #[serde(default)]
    pub line: usize,
    #[serde(default)]
    pub function: Option<Function>,
    #[serde(rename = "goroutineID", default)]
    pub goroutine_id: i64,
    #[serde(rename = "breakPointInfo", default)]
    pub breakpoint_info: Option<BreakpointInfo>,
}

fn function(name: Option<Function>, info: Option<BreakpointInfo>) -> Option<types::Function> {
    let name = name?.name;
    let info = info.unwrap_or_default();
    Some(types::Function {
        name,
        locals: info.locals.into_iter().map(Into::into).collect(),
        args: info.arguments.into_iter().map(Into::into).collect(),
    })
}

impl From<Thread> for types::Thread {
    fn from(t: Thread) -> Self {
        types::Thread {
            id: t.id,
            file: t.file,
            line: t.line,
            pc: t.pc,
            function: function(t.function, t.breakpoint_info),
            goroutine_id: t.goroutine_id,
        }
    }
}

/// `api.Location`, also the embedded part of `api.Stackframe`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct Location {
    #[serde(default)]
    pub pc: u64,
    #[serde(default)]
    pub file: PathBuf,
    #[serde(default)]
    pub line: usize,
    #[serde(default)]
    pub function: Option<Function>,
}

impl From<Location> for types::Frame {
    fn from(l: Location) -> Self {
        types::Frame {
            pc: l.pc,
            file: l.file,
            line: l.line,
            function: function(l.function, None),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Stackframe {
    #[serde(flatten)]
    pub location: Location,
    #[serde(rename = "Locals", default)]
    pub locals: Option<Vec<Variable>>,
    #[serde(rename = "Arguments", default)]
    pub arguments: Option<Vec<Variable>>,
}

impl From<Stackframe> for types::Frame {
    fn from(f: Stackframe) -> Self {
        let mut frame = types::Frame::from(f.location);
        if let Some(function) = frame.function.as_mut() {
            function.locals = f.locals.unwrap_or_default().into_iter().map(Into::into).collect();
            function.args = f
                .arguments
                .unwrap_or_default()
                .into_iter()
                .map(Into::into)
                .collect();
        }
        frame
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Goroutine {
    pub id: i64,
    #[serde(default)]
    pub user_current_loc: Option<Location>,
}

impl From<Goroutine> for types::Goroutine {
    fn from(g: Goroutine) -> Self {
        types::Goroutine {
            id: g.id,
            user_current_location: g.user_current_loc.map(Into::into),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct DebuggerState {
    #[serde(rename = "currentThread", default)]
    pub current_thread: Option<Thread>,
    #[serde(rename = "currentGoroutine", default)]
    pub current_goroutine: Option<Goroutine>,
    #[serde(rename = "Threads", default)]
    pub threads: Option<Vec<Thread>>,
    #[serde(default)]
    pub exited: bool,
    #[serde(rename = "exitStatus", default)]
    pub exit_status: i32,
}

impl DebuggerState {
    pub(crate) fn into_state(self, goroutines: Vec<types::Goroutine>) -> types::DebuggerState {
        types::DebuggerState {
            current_thread: self.current_thread.map(Into::into),
            current_goroutine: self.current_goroutine.map(Into::into),
            threads: self
                .threads
                .unwrap_or_default()
                .into_iter()
                .map(Into::into)
                .collect(),
            goroutines,
            exited: self.exited,
            exit_status: self.exited.then_some(self.exit_status),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub(crate) struct EvalScope {
    #[serde(rename = "GoroutineID")]
    pub goroutine_id: i64,
    #[serde(rename = "Frame")]
    pub frame: i64,
}

impl From<types::EvalScope> for EvalScope {
    fn from(s: types::EvalScope) -> Self {
        Self {
            goroutine_id: s.goroutine_id,
            frame: s.frame_id,
        }
    }
}

// Call arguments

#[derive(Debug, Serialize)]
pub(crate) struct CreateBreakpointIn {
    #[serde(rename = "Breakpoint")]
    pub breakpoint: Breakpoint,
}

#[derive(Debug, Serialize)]
pub(crate) struct FindLocationIn {
    #[serde(rename = "Scope")]
    pub scope: EvalScope,
    #[serde(rename = "Loc")]
    pub loc: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct BreakpointIdIn {
    #[serde(rename = "Id")]
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct AmendBreakpointIn {
    #[serde(rename = "Breakpoint")]
    pub breakpoint: Breakpoint,
}

#[derive(Debug, Serialize)]
pub(crate) struct CommandIn {
    pub name: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct RestartIn {}

#[derive(Debug, Serialize)]
pub(crate) struct StateIn {
    #[serde(rename = "NonBlocking")]
    pub non_blocking: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct ListGoroutinesIn {
    #[serde(rename = "Start")]
    pub start: i64,
    #[serde(rename = "Count")]
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct StacktraceIn {
    #[serde(rename = "Id")]
    pub id: i64,
    #[serde(rename = "Depth")]
    pub depth: usize,
    #[serde(rename = "Full")]
    pub full: bool,
    #[serde(rename = "Cfg", skip_serializing_if = "Option::is_none")]
    pub cfg: Option<LoadConfig>,
}

#[derive(Debug, Serialize)]
pub(crate) struct EvalIn<'a> {
    #[serde(rename = "Scope")]
    pub scope: EvalScope,
    #[serde(rename = "Expr")]
    pub expr: &'a str,
    #[serde(rename = "Cfg")]
    pub cfg: LoadConfig,
}

#[derive(Debug, Serialize)]
pub(crate) struct SetIn<'a> {
    #[serde(rename = "Scope")]
    pub scope: EvalScope,
    #[serde(rename = "Symbol")]
    pub symbol: &'a str,
    #[serde(rename = "Value")]
    pub value: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct DetachIn {
    #[serde(rename = "Kill")]
    pub kill: bool,
}

// Call results

#[derive(Debug, Deserialize)]
pub(crate) struct BreakpointOut {
    #[serde(rename = "Breakpoint")]
    pub breakpoint: Breakpoint,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FindLocationOut {
    #[serde(rename = "Locations", default)]
    pub locations: Vec<Location>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StateOut {
    #[serde(rename = "State")]
    pub state: DebuggerState,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListGoroutinesOut {
    #[serde(rename = "Goroutines", default)]
    pub goroutines: Option<Vec<Goroutine>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StacktraceOut {
    #[serde(rename = "Locations", default)]
    pub locations: Option<Vec<Stackframe>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EvalOut {
    #[serde(rename = "Variable")]
    pub variable: Variable,
}

/// Results whose payload the client does not read.
#[derive(Debug, Deserialize)]
pub(crate) struct Ignored {}
