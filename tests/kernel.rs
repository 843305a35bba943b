//! End-to-end scenarios: real shell children driven through the public
//! kernel API, stepping the supervisor loop by hand.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use toolvisor::control::ControlTransport;
use toolvisor::{
    BackoffPolicy, Config, ControlRequest, Kernel, OverflowPolicy, RestartPolicy, SocketBinding,
    ToolSpec, ToolState,
};

fn test_config() -> Config {
    let mut cfg = Config::default();
    cfg.tick = Duration::from_millis(10);
    cfg.grace = Duration::from_millis(500);
    cfg.backoff = BackoffPolicy {
        first: Duration::from_millis(50),
        max: Duration::from_secs(1),
        factor: 2.0,
    };
    cfg
}

async fn step(kernel: &mut Kernel) {
    kernel.iterate().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Steps the loop until `done` holds, up to `max` iterations.
async fn step_until(
    kernel: &mut Kernel,
    max: usize,
    mut done: impl FnMut(&Kernel) -> bool,
) -> bool {
    for _ in 0..max {
        step(kernel).await;
        if done(kernel) {
            return true;
        }
    }
    false
}

#[tokio::test]
async fn echo_chain_round_trips_through_two_tools() {
    let mut kernel = Kernel::new(test_config());
    kernel
        .register(ToolSpec::new("gen", r"printf 'PING|gen|p1\nPING|gen|p2\n'"))
        .unwrap();
    kernel
        .register(
            ToolSpec::new(
                "echo",
                r#"while IFS= read -r line; do printf 'PONG|echo|%s\n' "${line##*|}"; done"#,
            )
            .subscribe("PING"),
        )
        .unwrap();
    kernel
        .register(ToolSpec::new("sink", "cat >/dev/null").subscribe("PONG"))
        .unwrap();

    kernel.start_tool("echo").unwrap();
    kernel.start_tool("gen").unwrap();

    let ok = step_until(&mut kernel, 400, |k| {
        k.registry().find("sink").unwrap().inbox().len() >= 2
    })
    .await;
    assert!(ok, "sink never saw both PONG events");

    let sink = kernel.registry().find("sink").unwrap();
    let lines: Vec<&str> = sink.inbox().iter().collect();
    assert_eq!(lines, vec!["PONG|echo|p1\n", "PONG|echo|p2\n"]);

    kernel.stop_tool("echo").await.unwrap();
}

#[tokio::test]
async fn wildcard_subscriber_sees_every_publisher() {
    let mut kernel = Kernel::new(test_config());
    kernel
        .register(ToolSpec::new("a", r"printf 'X|A|1\n'"))
        .unwrap();
    kernel
        .register(ToolSpec::new("b", r"printf 'Y|B|2\n'"))
        .unwrap();
    kernel
        .register(ToolSpec::new("l", "cat >/dev/null").subscribe("*"))
        .unwrap();

    kernel.start_tool("a").unwrap();
    kernel.start_tool("b").unwrap();

    let ok = step_until(&mut kernel, 400, |k| {
        k.registry().find("l").unwrap().inbox().len() >= 2
    })
    .await;
    assert!(ok, "wildcard listener missed a publisher");

    let lines: Vec<String> = kernel
        .registry()
        .find("l")
        .unwrap()
        .inbox()
        .iter()
        .map(str::to_string)
        .collect();
    assert_eq!(lines.len(), 2);
    assert!(lines.contains(&"X|A|1\n".to_string()));
    assert!(lines.contains(&"Y|B|2\n".to_string()));
}

#[tokio::test]
async fn crash_restart_respects_backoff_and_the_attempt_bound() {
    let mut kernel = Kernel::new(test_config());
    kernel
        .register(
            ToolSpec::new("crasher", r"printf 'HELLO|crasher|\n'; exit 1").restart_on_crash(2),
        )
        .unwrap();
    kernel
        .register(ToolSpec::new("watch", "cat >/dev/null").subscribe("HELLO"))
        .unwrap();

    kernel.start_tool("crasher").unwrap();

    let ok = step_until(&mut kernel, 600, |k| {
        k.registry().find("crasher").unwrap().state() == ToolState::Error
            && k.registry().find("watch").unwrap().inbox().len() == 3
    })
    .await;
    assert!(ok, "crasher never exhausted its restarts");

    let crasher = kernel.registry().find("crasher").unwrap();
    // Initial start plus exactly max_restarts attempts.
    assert_eq!(crasher.restart_count(), 2);
    assert_eq!(crasher.events_sent(), 3);
    assert_eq!(kernel.registry().find("watch").unwrap().inbox().len(), 3);
}

#[tokio::test]
async fn drop_oldest_inbox_keeps_the_newest_events() {
    let mut kernel = Kernel::new(test_config());
    kernel
        .register(ToolSpec::new(
            "producer",
            r#"for n in 1 2 3 4 5 6 7 8 9 10; do printf 'M|producer|%s\n' "$n"; done"#,
        ))
        .unwrap();
    kernel
        .register(
            ToolSpec::new("consumer", "cat >/dev/null")
                .subscribe("M")
                .queue(3, OverflowPolicy::DropOldest),
        )
        .unwrap();

    kernel.start_tool("producer").unwrap();

    let ok = step_until(&mut kernel, 400, |k| {
        let inbox = k.registry().find("consumer").unwrap().inbox();
        inbox.dropped() == 7 && inbox.len() == 3
    })
    .await;
    assert!(ok, "overflow accounting never settled");

    let consumer = kernel.registry().find("consumer").unwrap();
    let lines: Vec<&str> = consumer.inbox().iter().collect();
    assert_eq!(
        lines,
        vec!["M|producer|8\n", "M|producer|9\n", "M|producer|10\n"]
    );

    // Now let the consumer read what survived.
    kernel.start_tool("consumer").unwrap();
    let ok = step_until(&mut kernel, 200, |k| {
        k.registry().find("consumer").unwrap().inbox().delivered() == 3
    })
    .await;
    assert!(ok, "consumer never drained its inbox");
    assert_eq!(
        kernel.registry().find("consumer").unwrap().events_received(),
        3
    );
}

#[tokio::test]
async fn list_reports_states_in_registration_order() {
    let mut kernel = Kernel::new(test_config());
    for name in ["a", "b", "c"] {
        kernel.register(ToolSpec::new(name, "sleep 30")).unwrap();
    }
    kernel.start_tool("a").unwrap();
    kernel.start_tool("c").unwrap();

    let infos = kernel.list();
    let names: Vec<&str> = infos.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    assert_eq!(infos[0].state, ToolState::Running);
    assert_eq!(infos[1].state, ToolState::Stopped);
    assert_eq!(infos[2].state, ToolState::Running);
    assert_eq!(kernel.count(), 3);

    let response = kernel
        .execute(ControlRequest::parse("LIST").unwrap())
        .await;
    assert!(response.success);
    assert!(response.text.starts_with("Tools Status:"));

    kernel.stop_tool("a").await.unwrap();
    kernel.stop_tool("c").await.unwrap();
}

#[tokio::test]
async fn shutdown_stops_every_running_tool() {
    let mut kernel = Kernel::new(test_config());
    kernel.register(ToolSpec::new("one", "sleep 30")).unwrap();
    kernel.register(ToolSpec::new("two", "sleep 30")).unwrap();
    kernel.start_tool("one").unwrap();
    kernel.start_tool("two").unwrap();

    let handle = kernel.handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let _ = handle.submit(ControlRequest::Shutdown).await;
    });

    kernel.run().await.unwrap();

    for name in ["one", "two"] {
        let tool = kernel.registry().find(name).unwrap();
        assert_eq!(tool.state(), ToolState::Stopped);
        assert!(tool.pid().is_none());
    }
    assert!(!kernel.is_running());
}

#[tokio::test]
async fn on_demand_tools_start_when_a_subscribed_event_arrives() {
    let mut kernel = Kernel::new(test_config());
    kernel
        .register(
            ToolSpec::new("worker", "cat >/dev/null")
                .restart_policy(RestartPolicy::OnDemand)
                .subscribe("JOB"),
        )
        .unwrap();
    assert_eq!(
        kernel.registry().find("worker").unwrap().state(),
        ToolState::Stopped
    );

    kernel.bus().publish("JOB", "embedder", "payload").unwrap();

    let ok = step_until(&mut kernel, 200, |k| {
        let worker = k.registry().find("worker").unwrap();
        worker.state() == ToolState::Running && worker.inbox().delivered() == 1
    })
    .await;
    assert!(ok, "on-demand worker never came up");

    kernel.stop_tool("worker").await.unwrap();
}

#[tokio::test]
async fn configured_tools_register_subscribe_and_autostart() {
    let text = "\
[core]
max_tools = 5

[tool:pinger]
command = sleep 30
autostart = yes

[tool:sink]
command = cat
subscribe_to = PING
";
    let mut cfg = Config::parse(text).unwrap();
    cfg.tick = Duration::from_millis(10);
    cfg.grace = Duration::from_millis(500);

    let mut kernel = Kernel::new(cfg);
    kernel.init().unwrap();

    assert_eq!(kernel.count(), 2);
    assert_eq!(
        kernel.registry().find("pinger").unwrap().state(),
        ToolState::Running
    );
    assert!(kernel.registry().find("sink").unwrap().matches("PING"));

    kernel.stop_tool("pinger").await.unwrap();
}

#[tokio::test]
async fn socket_binding_answers_commands() {
    let mut kernel = Kernel::new(test_config());
    kernel.register(ToolSpec::new("a", "true")).unwrap();

    let socket = SocketBinding::bind(0).await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(socket.serve(kernel.handle(), kernel.shutdown_token()));

    let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
    client.write_all(b"count\n").await.unwrap();

    let (mut read_half, _write_half) = client.into_split();
    let reader = tokio::spawn(async move {
        let mut buf = vec![0u8; 256];
        let n = read_half.read(&mut buf).await.unwrap();
        String::from_utf8_lossy(&buf[..n]).into_owned()
    });

    for _ in 0..200 {
        kernel.iterate().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        if reader.is_finished() {
            break;
        }
    }
    let response = reader.await.unwrap();
    assert_eq!(response, "Success: 1 tools registered\n");
}
