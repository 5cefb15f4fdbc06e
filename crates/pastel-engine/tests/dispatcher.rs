use std::{sync::Arc, time::Duration};

use config::{Ai, AiEndpoint, Config, UserCommand};
use pastel_engine::{
    Dispatcher, Error, TaskRequest, TaskState,
    test_support::{MemoryClipboard, RecordingPaste, recv_outcome, recv_until},
};
use pastel_protocol::{
    FailureKind, MsgToUI,
    ipc::{UiRx, ui_channel},
};
use serde_json::json;
use tokio::time::sleep;
use wiremock::{Mock, MockServer, ResponseTemplate, matchers::method};

struct Harness {
    dispatcher: Dispatcher,
    clip: Arc<MemoryClipboard>,
    paste: Arc<RecordingPaste>,
    rx: UiRx,
}

fn harness_with(cfg: &Config, clip: MemoryClipboard, paste: RecordingPaste) -> Harness {
    let clip = Arc::new(clip);
    let paste = Arc::new(paste);
    let (tx, rx) = ui_channel();
    let dispatcher = Dispatcher::from_config(cfg, clip.clone(), paste.clone(), tx).unwrap();
    Harness {
        dispatcher,
        clip,
        paste,
        rx,
    }
}

fn harness(cfg: &Config) -> Harness {
    harness_with(cfg, MemoryClipboard::default(), RecordingPaste::default())
}

/// Config pointing the AI provider at `server` with short delays.
fn ai_config(server: &MockServer) -> Config {
    Config {
        paste_delay: 0.01,
        ai: Ai {
            base_url: server.uri(),
            endpoint: AiEndpoint::Direct,
            ..Ai::default()
        },
        ..Config::default()
    }
}

fn failure(state: &TaskState) -> Option<FailureKind> {
    match state {
        TaskState::Failed { kind, .. } => Some(*kind),
        _ => None,
    }
}

#[tokio::test(start_paused = true)]
async fn upper_is_written_then_pasted_after_delay() {
    let h = harness(&Config::default());
    let handle = h
        .dispatcher
        .submit(TaskRequest::new("text:upper", "hello world"));
    assert_eq!(
        handle.wait().await,
        TaskState::Completed {
            answers: vec!["HELLO WORLD".into()]
        }
    );
    assert_eq!(h.clip.writes(), vec!["HELLO WORLD".to_string()]);
    let calls = h.paste.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "shift+Insert");
    let written = h.clip.last_write_at().unwrap();
    assert!(calls[0].1.duration_since(written) >= Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn evaluate_pastes_the_result() {
    let h = harness(&Config::default());
    let handle = h
        .dispatcher
        .submit(TaskRequest::new("math:evaluate", "2 + 2 * 3"));
    assert_eq!(
        handle.wait().await,
        TaskState::Completed {
            answers: vec!["8".into()]
        }
    );
    assert_eq!(h.clip.contents(), "8");
}

#[tokio::test(start_paused = true)]
async fn lifecycle_is_reported_to_the_ui() {
    let mut h = harness(&Config::default());
    let handle = h
        .dispatcher
        .submit(TaskRequest::new("text:lower", "ABC"));
    assert!(
        recv_until(&mut h.rx, 1000, |m| matches!(
            m,
            MsgToUI::TaskStarted { command, .. } if command == "text:lower"
        ))
        .await
    );
    let outcome = recv_outcome(&mut h.rx, handle.id(), 1000).await;
    assert!(matches!(
        outcome,
        Some(MsgToUI::TaskSucceeded { ref answers, .. }) if answers == &["abc".to_string()]
    ));
}

#[tokio::test(start_paused = true)]
async fn unknown_command_fails_without_touching_the_clipboard() {
    let mut h = harness(&Config::default());
    let handle = h.dispatcher.submit(TaskRequest::new("nope", "text"));
    assert_eq!(
        failure(&handle.wait().await),
        Some(FailureKind::UnknownCommand)
    );
    assert!(h.clip.writes().is_empty());
    let outcome = recv_outcome(&mut h.rx, handle.id(), 1000).await;
    assert!(matches!(
        outcome,
        Some(MsgToUI::TaskFailed {
            kind: FailureKind::UnknownCommand,
            ..
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn empty_input_is_surfaced_not_committed() {
    let h = harness(&Config::default());
    let handle = h.dispatcher.submit(TaskRequest::new("text:upper", ""));
    assert_eq!(
        failure(&handle.wait().await),
        Some(FailureKind::EmptyInput)
    );
    assert!(h.paste.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn blank_answer_is_an_empty_result() {
    let cfg = Config {
        commands: vec![UserCommand {
            id: "blank".into(),
            label: "Blank".into(),
            query: None,
            answer: Some("   ".into()),
        }],
        ..Config::default()
    };
    let h = harness(&cfg);
    let handle = h.dispatcher.submit(TaskRequest::new("blank", "x"));
    assert_eq!(
        failure(&handle.wait().await),
        Some(FailureKind::EmptyResult)
    );
    assert!(h.clip.writes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn fixed_answer_user_command_is_pasted() {
    let cfg = Config {
        commands: vec![UserCommand {
            id: "sig".into(),
            label: "Signature".into(),
            query: None,
            answer: Some("-- Ada".into()),
        }],
        ..Config::default()
    };
    let h = harness(&cfg);
    let handle = h.dispatcher.submit(TaskRequest::new("sig", ""));
    assert!(matches!(handle.wait().await, TaskState::Completed { .. }));
    assert_eq!(h.clip.contents(), "-- Ada");
}

#[tokio::test(start_paused = true)]
async fn paste_failure_keeps_the_clipboard() {
    let h = harness_with(
        &Config::default(),
        MemoryClipboard::default(),
        RecordingPaste::failing(),
    );
    let handle = h
        .dispatcher
        .submit(TaskRequest::new("text:upper", "keep me"));
    assert_eq!(
        failure(&handle.wait().await),
        Some(FailureKind::PasteDelivery)
    );
    assert_eq!(h.clip.contents(), "KEEP ME");
}

#[tokio::test(start_paused = true)]
async fn clipboard_write_failure_is_a_delivery_failure() {
    let h = harness_with(
        &Config::default(),
        MemoryClipboard::failing_writes(),
        RecordingPaste::default(),
    );
    let handle = h.dispatcher.submit(TaskRequest::new("text:upper", "x"));
    assert_eq!(
        failure(&handle.wait().await),
        Some(FailureKind::PasteDelivery)
    );
    assert!(h.paste.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn submitting_moves_the_command_to_the_front() {
    let h = harness(&Config::default());
    let handle = h
        .dispatcher
        .submit(TaskRequest::new("text:reverse", "a\nb"));
    handle.wait().await;
    assert_eq!(h.dispatcher.registry().list()[0].id, "text:reverse");
}

#[tokio::test(start_paused = true)]
async fn commit_answer_accepts_only_known_answers() {
    let h = harness(&Config::default());
    let handle = h
        .dispatcher
        .submit(TaskRequest::new("text:title", "hello world"));
    handle.wait().await;
    assert_eq!(h.dispatcher.last_answers(), vec!["Hello World".to_string()]);

    h.dispatcher.commit_answer("Hello World").await.unwrap();
    assert_eq!(h.clip.writes().len(), 2);
    assert!(matches!(
        h.dispatcher.commit_answer("other").await,
        Err(Error::NoSuchAnswer(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn activate_shows_the_palette_over_the_selection() {
    let mut h = harness_with(
        &Config::default(),
        MemoryClipboard::with_selection("picked"),
        RecordingPaste::default(),
    );
    assert_eq!(h.dispatcher.activate().await, "picked");
    assert_eq!(
        h.rx.try_recv().unwrap(),
        MsgToUI::ShowPalette {
            selection: "picked".into()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn shutdown_refuses_new_work() {
    let h = harness(&Config::default());
    h.dispatcher.shutdown();
    let handle = h.dispatcher.submit(TaskRequest::new("text:upper", "x"));
    assert_eq!(handle.wait().await, TaskState::Cancelled);
    assert!(matches!(
        h.dispatcher.commit_answer("X").await,
        Err(Error::ShutDown)
    ));
    assert!(h.clip.writes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn superseding_during_the_paste_delay_drops_the_stale_paste() {
    let mut h = harness(&Config::default());
    let first = h.dispatcher.submit(TaskRequest::new("text:upper", "first"));
    // Inside the 300ms paste delay: FIRST is on the clipboard, not yet pasted.
    sleep(Duration::from_millis(100)).await;
    assert_eq!(first.state(), TaskState::Running);
    assert_eq!(h.clip.writes(), vec!["FIRST".to_string()]);

    let second = h.dispatcher.submit(TaskRequest::new("text:lower", "SECOND"));
    assert_eq!(first.wait().await, TaskState::Cancelled);
    assert_eq!(
        second.wait().await,
        TaskState::Completed {
            answers: vec!["second".into()]
        }
    );
    let calls = h.paste.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(h.clip.contents(), "second");
    assert!(matches!(
        recv_outcome(&mut h.rx, first.id(), 1000).await,
        Some(MsgToUI::TaskCancelled { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn dismissing_during_the_paste_delay_skips_the_paste() {
    let mut h = harness(&Config::default());
    let handle = h.dispatcher.submit(TaskRequest::new("text:upper", "x"));
    sleep(Duration::from_millis(100)).await;
    assert!(h.dispatcher.cancel_active());

    assert_eq!(handle.wait().await, TaskState::Cancelled);
    assert!(h.paste.calls().is_empty());
    assert!(h.dispatcher.last_answers().is_empty());
    assert!(matches!(
        recv_outcome(&mut h.rx, handle.id(), 1000).await,
        Some(MsgToUI::TaskCancelled { .. })
    ));
    assert!(!h.dispatcher.cancel_active());
}

#[tokio::test(start_paused = true)]
async fn cancel_with_nothing_running_is_a_no_op() {
    let h = harness(&Config::default());
    assert!(!h.dispatcher.cancel_active());
    let handle = h.dispatcher.submit(TaskRequest::new("text:upper", "x"));
    handle.wait().await;
    assert!(!h.dispatcher.cancel_active());
    assert_eq!(h.paste.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn preview_returns_answers_without_committing() {
    let h = harness(&Config::default());
    assert_eq!(
        h.dispatcher
            .preview(TaskRequest::new("text:upper", "abc"))
            .await,
        TaskState::Completed {
            answers: vec!["ABC".into()]
        }
    );
    assert!(h.clip.writes().is_empty());
    assert!(h.paste.calls().is_empty());
    assert!(h.dispatcher.active().is_none());
}

#[tokio::test(start_paused = true)]
async fn preview_reports_failures_like_submit() {
    let h = harness(&Config::default());
    let unknown = h.dispatcher.preview(TaskRequest::new("nope", "x")).await;
    assert_eq!(failure(&unknown), Some(FailureKind::UnknownCommand));
    let empty = h.dispatcher.preview(TaskRequest::new("text:upper", "")).await;
    assert_eq!(failure(&empty), Some(FailureKind::EmptyInput));
}

#[tokio::test(flavor = "multi_thread")]
async fn second_submit_cancels_the_first() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "success", "answers": ["stale"]}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    let mut h = harness(&ai_config(&server));

    let first = h
        .dispatcher
        .submit(TaskRequest::new("ai:ask", "a").with_query("slow"));
    let second = h.dispatcher.submit(TaskRequest::new("text:upper", "b"));

    assert_eq!(first.wait().await, TaskState::Cancelled);
    assert!(matches!(second.wait().await, TaskState::Completed { .. }));
    assert_eq!(h.clip.writes(), vec!["B".to_string()]);
    let cancelled = recv_until(&mut h.rx, 1000, |m| {
        matches!(m, MsgToUI::TaskCancelled { task, .. } if *task == first.id())
    })
    .await;
    assert!(cancelled);
}

#[tokio::test(flavor = "multi_thread")]
async fn ai_error_leaves_clipboard_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "error", "error_message": "Task unclear"})),
        )
        .mount(&server)
        .await;
    let h = harness(&ai_config(&server));
    let handle = h
        .dispatcher
        .submit(TaskRequest::new("ai:ask", "text").with_query("???"));
    assert_eq!(
        handle.wait().await,
        TaskState::Failed {
            kind: FailureKind::AiProviderError,
            message: "Task unclear".into()
        }
    );
    assert!(h.clip.writes().is_empty());
    assert!(h.paste.calls().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_provider_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "success", "answers": ["late"]}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    let cfg = Config {
        task_timeout: 0.2,
        ..ai_config(&server)
    };
    let h = harness(&cfg);
    let handle = h
        .dispatcher
        .submit(TaskRequest::new("ai:ask", "text").with_query("anything"));
    assert_eq!(failure(&handle.wait().await), Some(FailureKind::Timeout));
    assert!(handle.token().is_cancelled());
    assert!(h.clip.writes().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn alternative_answers_can_be_committed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "success", "answers": ["first", "second"]})),
        )
        .mount(&server)
        .await;
    let h = harness(&ai_config(&server));
    let handle = h
        .dispatcher
        .submit(TaskRequest::new("ai:ask", "text").with_query("options"));
    assert!(matches!(handle.wait().await, TaskState::Completed { .. }));
    assert_eq!(h.clip.contents(), "first");

    h.dispatcher.commit_answer("second").await.unwrap();
    assert_eq!(
        h.clip.writes(),
        vec!["first".to_string(), "second".to_string()]
    );
    assert_eq!(h.paste.calls().len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn dismissing_while_the_provider_runs_cancels_the_task() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "success", "answers": ["late"]}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    let mut h = harness(&ai_config(&server));
    let handle = h
        .dispatcher
        .submit(TaskRequest::new("ai:ask", "text").with_query("slow"));
    sleep(Duration::from_millis(200)).await;
    assert!(h.dispatcher.cancel_active());

    assert_eq!(handle.wait().await, TaskState::Cancelled);
    assert!(h.clip.writes().is_empty());
    assert!(h.paste.calls().is_empty());
    assert!(matches!(
        recv_outcome(&mut h.rx, handle.id(), 1000).await,
        Some(MsgToUI::TaskCancelled { .. })
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn preview_times_out_like_submit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "success", "answers": ["late"]}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    let cfg = Config {
        task_timeout: 0.2,
        ..ai_config(&server)
    };
    let h = harness(&cfg);
    let state = h
        .dispatcher
        .preview(TaskRequest::new("ai:ask", "text").with_query("anything"))
        .await;
    assert_eq!(failure(&state), Some(FailureKind::Timeout));
    assert!(h.clip.writes().is_empty());
}
