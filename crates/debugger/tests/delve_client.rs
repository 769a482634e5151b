use std::io::IsTerminal;

use debugger::{Backend, BackendError, DelveClient, EvalScope, RunCommand};
use futures::StreamExt;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;
use transport::{Message, Request, Response, split, testing::MemoryTransport};

#[ctor::ctor]
fn init() {
    let in_ci = std::env::var("CI")
        .map(|val| val == "true")
        .unwrap_or(false);

    if std::io::stderr().is_terminal() || in_ci {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .json()
            .try_init();
    }

    // error traces
    let _ = color_eyre::install();
}

/// Answer every request with `handler` until the client hangs up, then
/// return the requests seen.
fn fake_delve<F>(transport: MemoryTransport, mut handler: F) -> JoinHandle<Vec<Request>>
where
    F: FnMut(&Request) -> Response + Send + 'static,
{
    let (mut reader, mut writer) = split(transport);
    tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Some(Ok(Message::Request(request))) = reader.next().await {
            let response = handler(&request);
            seen.push(request);
            if writer.send(Message::Response(response)).await.is_err() {
                break;
            }
        }
        seen
    })
}

fn client_with<F>(handler: F) -> (
    DelveClient<tokio::io::DuplexStream>,
    JoinHandle<Vec<Request>>,
)
where
    F: FnMut(&Request) -> Response + Send + 'static,
{
    let (client_side, server_side) = MemoryTransport::pair();
    let server = fake_delve(server_side, handler);
    let (reader, writer) = split(client_side);
    (DelveClient::from_transport(reader, writer), server)
}

fn arg(request: &Request) -> &Value {
    &request.params[0]
}

fn paused_state() -> Value {
    json!({
        "Running": false,
        "currentThread": {
            "id": 11,
            "pc": 4660,
            "file": "/src/main.go",
            "line": 7,
            "function": {"name": "main.main"},
            "goroutineID": 1,
            "breakPointInfo": {
                "arguments": null,
                "locals": [{"name": "x", "type": "int", "value": "5", "children": null}]
            }
        },
        "currentGoroutine": {"id": 1},
        "Threads": [{"id": 11, "pc": 4660, "file": "/src/main.go", "line": 7, "goroutineID": 1}],
        "exited": false,
        "exitStatus": 0
    })
}

fn goroutines() -> Value {
    json!({
        "Goroutines": [
            {"id": 1, "userCurrentLoc": {"pc": 4660, "file": "/src/main.go", "line": 7, "function": {"name": "main.main"}}},
            {"id": 2, "userCurrentLoc": null}
        ],
        "Nextg": -1
    })
}

#[tokio::test]
async fn file_line_breakpoint_is_created_directly() {
    let (client, server) = client_with(|request| {
        let bp = &arg(request)["Breakpoint"];
        Response::ok(
            request.id,
            json!({"Breakpoint": {
                "id": 3,
                "name": bp["name"],
                "file": bp["file"],
                "line": bp["line"],
                "Cond": ""
            }}),
        )
    });

    let created = client
        .create_breakpoints(Some("bp1"), "/src/main.go:5")
        .await
        .unwrap();
    drop(client);
    let requests = server.await.unwrap();

    assert_eq!(created.len(), 1);
    assert_eq!(created[0].id, 3);
    assert_eq!(created[0].name, "bp1");
    assert_eq!(created[0].location.line, 5);
    assert!(!created[0].pending_change);

    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "RPCServer.CreateBreakpoint");
    assert_eq!(arg(&requests[0])["Breakpoint"]["file"], "/src/main.go");
    assert_eq!(arg(&requests[0])["Breakpoint"]["line"], 5);
    assert!(arg(&requests[0])["Breakpoint"]["LoadLocals"].is_object());
}

#[tokio::test]
async fn other_patterns_are_expanded_first() {
    let mut next_id = 10;
    let (client, server) = client_with(move |request| match request.method.as_str() {
        "RPCServer.FindLocation" => Response::ok(
            request.id,
            json!({"Locations": [
                {"pc": 100, "file": "/src/a.go", "line": 3},
                {"pc": 200, "file": "/src/b.go", "line": 8}
            ]}),
        ),
        "RPCServer.CreateBreakpoint" => {
            next_id += 1;
            let bp = &arg(request)["Breakpoint"];
            Response::ok(
                request.id,
                json!({"Breakpoint": {"id": next_id, "name": "", "file": bp["file"], "line": bp["line"]}}),
            )
        }
        other => Response::err(request.id, format!("unexpected {other}")),
    });

    let created = client.create_breakpoints(None, "main.handler").await.unwrap();
    drop(client);
    let requests = server.await.unwrap();

    let ids: Vec<_> = created.iter().map(|bp| bp.id).collect();
    assert_eq!(ids, vec![11, 12]);
    assert_eq!(arg(&requests[0])["Loc"], "main.handler");
    assert_eq!(arg(&requests[0])["Scope"]["GoroutineID"], -1);
}

#[tokio::test]
async fn failed_expansion_clears_breakpoints_already_created() {
    let mut creates = 0;
    let (client, server) = client_with(move |request| match request.method.as_str() {
        "RPCServer.FindLocation" => Response::ok(
            request.id,
            json!({"Locations": [
                {"pc": 100, "file": "/src/a.go", "line": 3},
                {"pc": 200, "file": "/src/b.go", "line": 8}
            ]}),
        ),
        "RPCServer.CreateBreakpoint" if creates == 0 => {
            creates += 1;
            let bp = &arg(request)["Breakpoint"];
            Response::ok(
                request.id,
                json!({"Breakpoint": {"id": 11, "name": "", "file": bp["file"], "line": bp["line"]}}),
            )
        }
        "RPCServer.CreateBreakpoint" => Response::err(request.id, "could not set breakpoint"),
        "RPCServer.ClearBreakpoint" => Response::ok(
            request.id,
            json!({"Breakpoint": {"id": arg(request)["Id"], "name": "", "file": "/src/a.go", "line": 3}}),
        ),
        other => Response::err(request.id, format!("unexpected {other}")),
    });

    let result = client.create_breakpoints(None, "main.handler").await;
    drop(client);
    let requests = server.await.unwrap();

    assert_eq!(
        result,
        Err(BackendError::Rejected("could not set breakpoint".to_string()))
    );
    let methods: Vec<_> = requests.iter().map(|r| r.method.as_str()).collect();
    assert_eq!(
        methods,
        vec![
            "RPCServer.FindLocation",
            "RPCServer.CreateBreakpoint",
            "RPCServer.CreateBreakpoint",
            "RPCServer.ClearBreakpoint",
        ]
    );
    assert_eq!(arg(&requests[3])["Id"], 11);
}

#[tokio::test]
async fn unresolvable_pattern_is_rejected() {
    let (client, _server) = client_with(|request| {
        Response::ok(request.id, json!({"Locations": []}))
    });

    let result = client.create_breakpoints(None, "nope.nothing").await;

    assert!(matches!(result, Err(BackendError::Rejected(_))));
}

#[tokio::test]
async fn condition_amends_the_current_breakpoint() {
    let (client, server) = client_with(|request| match request.method.as_str() {
        "RPCServer.GetBreakpoint" => Response::ok(
            request.id,
            json!({"Breakpoint": {"id": 4, "name": "bp", "file": "/src/main.go", "line": 5, "Cond": "", "totalHitCount": 1}}),
        ),
        _ => Response::ok(request.id, json!({})),
    });

    client.set_breakpoint_condition(4, "x > 5").await.unwrap();
    drop(client);
    let requests = server.await.unwrap();

    let methods: Vec<_> = requests.iter().map(|r| r.method.as_str()).collect();
    assert_eq!(methods, vec!["RPCServer.GetBreakpoint", "RPCServer.AmendBreakpoint"]);
    let amended = &arg(&requests[1])["Breakpoint"];
    assert_eq!(amended["Cond"], "x > 5");
    assert_eq!(amended["id"], 4);
    assert_eq!(amended["totalHitCount"], 1);
}

#[tokio::test]
async fn command_returns_snapshot_with_goroutines() {
    let (client, server) = client_with(|request| match request.method.as_str() {
        "RPCServer.Command" => Response::ok(request.id, json!({"State": paused_state()})),
        "RPCServer.ListGoroutines" => Response::ok(request.id, goroutines()),
        other => Response::err(request.id, format!("unexpected {other}")),
    });

    let state = client.run(RunCommand::Continue).await.unwrap();
    drop(client);
    let requests = server.await.unwrap();

    assert_eq!(arg(&requests[0])["name"], "continue");
    let thread = state.current_thread.unwrap();
    assert_eq!(thread.id, 11);
    assert_eq!(thread.goroutine_id, 1);
    let function = thread.function.unwrap();
    assert_eq!(function.locals[0].name, "x");
    assert!(function.args.is_empty());
    assert_eq!(state.goroutines.len(), 2);
    assert_eq!(state.threads.len(), 1);
}

#[tokio::test]
async fn exited_state_is_classified() {
    let (client, _server) = client_with(|request| {
        Response::ok(
            request.id,
            json!({"State": {"Running": false, "exited": true, "exitStatus": 2}}),
        )
    });

    let result = client.run(RunCommand::Next).await;

    assert_eq!(result, Err(BackendError::Exited { status: 2 }));
}

#[tokio::test]
async fn exit_error_text_is_classified() {
    let (client, _server) = client_with(|request| {
        Response::err(request.id, "Process 4242 has exited with status 1")
    });

    let result = client.run(RunCommand::StepInstruction).await;

    assert_eq!(result, Err(BackendError::Exited { status: 1 }));
}

#[tokio::test]
async fn errors_are_rejections() {
    let (client, _server) = client_with(|request| {
        Response::err(request.id, "could not find symbol value for y")
    });

    let result = client.eval_symbol("y", EvalScope::default()).await;

    assert_eq!(
        result,
        Err(BackendError::Rejected(
            "could not find symbol value for y".to_string()
        ))
    );
}

#[tokio::test]
async fn restart_fetches_fresh_state() {
    let (client, server) = client_with(|request| match request.method.as_str() {
        "RPCServer.Restart" => Response::ok(request.id, json!({"DiscardedBreakpoints": null})),
        "RPCServer.State" => Response::ok(request.id, json!({"State": paused_state()})),
        "RPCServer.ListGoroutines" => Response::ok(request.id, goroutines()),
        other => Response::err(request.id, format!("unexpected {other}")),
    });

    let state = client.restart().await.unwrap();
    drop(client);
    let requests = server.await.unwrap();

    assert!(state.current_thread.is_some());
    assert_eq!(arg(&requests[1])["NonBlocking"], true);
}

#[tokio::test]
async fn stacktrace_and_set_use_delve_argument_names() {
    let (client, server) = client_with(|request| match request.method.as_str() {
        "RPCServer.Stacktrace" => Response::ok(
            request.id,
            json!({"Locations": [
                {"pc": 4660, "file": "/src/main.go", "line": 7, "function": {"name": "main.main"}, "Locals": null, "Arguments": null},
                {"pc": 4000, "file": "/usr/lib/go/src/runtime/proc.go", "line": 250, "function": {"name": "runtime.main"}}
            ]}),
        ),
        _ => Response::ok(request.id, json!({})),
    });

    let frames = client.stacktrace(1, 50, false).await.unwrap();
    client
        .set_symbol(
            "x",
            "6",
            EvalScope {
                goroutine_id: 1,
                frame_id: 0,
            },
        )
        .await
        .unwrap();
    drop(client);
    let requests = server.await.unwrap();

    assert_eq!(frames.len(), 2);
    assert_eq!(frames[1].function.as_ref().unwrap().name, "runtime.main");
    assert_eq!(arg(&requests[0])["Id"], 1);
    assert_eq!(arg(&requests[0])["Depth"], 50);
    assert_eq!(arg(&requests[1])["Symbol"], "x");
    assert_eq!(arg(&requests[1])["Value"], "6");
    assert_eq!(arg(&requests[1])["Scope"]["GoroutineID"], 1);
}

#[tokio::test]
async fn closed_connection_fails_outstanding_calls() {
    let (client_side, server_side) = MemoryTransport::pair();
    let (mut server_reader, server_writer) = split(server_side);
    let server = tokio::spawn(async move {
        // read one request, then hang up without answering
        let _ = server_reader.next().await;
        drop(server_writer);
        drop(server_reader);
    });
    let (reader, writer) = split(client_side);
    let client = DelveClient::from_transport(reader, writer);

    let result = client.run(RunCommand::Continue).await;
    server.await.unwrap();

    assert!(matches!(result, Err(BackendError::Transport(_))));
    let after = client.clear_breakpoint(1).await;
    assert!(matches!(after, Err(BackendError::Transport(_))));
}

#[tokio::test]
async fn abandoned_call_leaves_nothing_pending() {
    let (client_side, server_side) = MemoryTransport::pair();
    let (mut server_reader, server_writer) = split(server_side);
    let (seen_tx, seen_rx) = tokio::sync::oneshot::channel();
    let server = tokio::spawn(async move {
        // take the request but never answer it
        let request = server_reader.next().await;
        let _ = seen_tx.send(());
        let _ = server_reader.next().await;
        drop(server_writer);
        request
    });
    let (reader, writer) = split(client_side);
    let client = DelveClient::from_transport(reader, writer);

    tokio::select! {
        _ = client.run(RunCommand::Continue) => panic!("continue should not finish"),
        _ = seen_rx => {}
    }
    assert_eq!(client.pending_requests(), 0);

    drop(client);
    let request = server.await.unwrap();
    assert!(matches!(request, Some(Ok(Message::Request(r))) if r.method == "RPCServer.Command"));
}
