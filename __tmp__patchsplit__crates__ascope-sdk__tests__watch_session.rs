use ascope_sdk::MonitorEvent;
use ascope_testing::fixtures::ToolCall;
use ascope_testing::providers::TestProvider;
use ascope_testing::TestWorld;
use futures::StreamExt;
use std::time::Duration;

#[tokio::test]
async fn watch_discovers_and_replays_an_existing_session() {
    let world = TestWorld::new();
    world
        .add_session(TestProvider::Claude, "sess-1", "/home/dev/project", &[ToolCall::new("call-1", "Bash")])
        .unwrap();

    let client = world.client();
    let mut stream = client.watch("proj-a").unwrap();

    let mut saw_discovery = false;
    let mut saw_update = false;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline && !(saw_discovery && saw_update) {
        let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(500), stream.next()).await else {
            continue;
        };
        match event {
            MonitorEvent::SessionDiscovered { session_id, .. } if session_id == "sess-1" => {
                saw_discovery = true;
            }
            MonitorEvent::Updated { session_id, aggregator } if session_id == "sess-1" => {
                saw_update = true;
                assert!(aggregator.event_count > 0);
            }
            _ => {}
        }
    }

    assert!(saw_discovery, "expected a SessionDiscovered event for sess-1");
    assert!(saw_update, "expected at least one Updated event for sess-1");
}


