use ascope_testing::fixtures::ToolCall;
use ascope_testing::providers::TestProvider;
use ascope_testing::TestWorld;

#[test]
fn replaying_a_claude_session_counts_one_tool_call_and_usage() {
    let world = TestWorld::new();
    let path = world
        .add_session(TestProvider::Claude, "sess-1", "/home/dev/project", &[ToolCall::new("call-1", "Bash").with_output("done")])
        .unwrap();

    let aggregator = world.replay(TestProvider::Claude, &path).unwrap();

    assert_eq!(aggregator.error_count, 0);
    assert_eq!(aggregator.tools.total_completed(), 1);
    assert!(aggregator.tokens.per_model.values().any(|m| m.total_tokens() > 0));
}

#[test]
fn replaying_a_codex_session_with_an_error_increments_failure_count() {
    let world = TestWorld::new();
    let path = world
        .add_session(TestProvider::Codex, "sess-2", "/home/dev/project", &[ToolCall::new("call-1", "shell").with_error("command not found")])
        .unwrap();

    let aggregator = world.replay(TestProvider::Codex, &path).unwrap();

    assert_eq!(aggregator.error_count, 1);
    assert_eq!(aggregator.tools.per_tool["shell"].failure, 1);
}

#[test]
fn truncated_tool_output_is_detected_across_the_full_reader_pipeline() {
    let world = TestWorld::new();
    let path = world
        .add_session(
            TestProvider::Claude,
            "sess-3",
            "/home/dev/project",
            &[ToolCall::new("call-1", "Read").with_output("... [truncated]")],
        )
        .unwrap();

    let aggregator = world.replay(TestProvider::Claude, &path).unwrap();
    assert_eq!(aggregator.truncation_count, 1);
}
