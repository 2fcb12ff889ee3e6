//! A client created before fork() keeps delivering from the child process
#![cfg(unix)]

use logdock::client::{ClientConfig, LogClient, QueueConfig, TransportConfig};
use logdock::model::Level;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult};
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test]
fn test_child_delivers_after_fork() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let server = runtime.block_on(MockServer::start());
    runtime.block_on(
        Mock::given(method("POST"))
            .and(path("/logs/ingest"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server),
    );

    let client = LogClient::new(ClientConfig {
        application_id: "forked".to_string(),
        queue: QueueConfig {
            flush_interval: Duration::from_millis(50),
            ..Default::default()
        },
        transport: TransportConfig {
            endpoint: format!("{}/logs/ingest", server.uri()),
            ..Default::default()
        },
        ..Default::default()
    });

    // Bind the queue in the parent so the child inherits a live binding
    client.log(Level::Info, "parent", "before fork");

    match unsafe { fork() }.unwrap() {
        ForkResult::Child => {
            let delivered = std::panic::catch_unwind(AssertUnwindSafe(|| {
                client.log(Level::Info, "child", "from child");
                client.shutdown(Duration::from_secs(10))
            }))
            .unwrap_or(false);
            unsafe { nix::libc::_exit(if delivered { 0 } else { 1 }) }
        }
        ForkResult::Parent { child } => {
            let status = waitpid(child, None).unwrap();
            assert_eq!(status, WaitStatus::Exited(child, 0));
            assert!(client.shutdown(Duration::from_secs(10)));

            let requests = runtime.block_on(server.received_requests()).unwrap();
            let bodies: Vec<String> = requests
                .iter()
                .map(|r| String::from_utf8_lossy(&r.body).into_owned())
                .collect();
            assert!(bodies.iter().any(|b| b.contains("from child")));
            // The child never resends what the parent had buffered
            assert_eq!(bodies.iter().filter(|b| b.contains("before fork")).count(), 1);
        }
    }
}
