#![allow(clippy::unwrap_used, clippy::expect_used)]

mod support;

use std::{sync::Arc, time::Duration};

use {
    courier_channels::Error as TransportError,
    courier_common::{AgentId, ChatId, MessageId},
    courier_config::{
        AgentConfig, AgentKind, BacklogSettings, ForwardSpec, InMemoryOffsetStore, OffsetStore,
    },
    courier_pipeline::MessagePipeline,
    courier_sync::{BacklogSyncEngine, correlation},
};

use support::{FakeStager, FakeTransport, grouped, raw};

const SRC: ChatId = ChatId(-1001);
const DEST_B: ChatId = ChatId(-2001);
const DEST_C: ChatId = ChatId(-2002);

fn user_agent(delay_ms: u64) -> AgentConfig {
    AgentConfig {
        kind: AgentKind::User,
        backlog: BacklogSettings {
            delay_ms,
            retry_budget: 5,
        },
        ..AgentConfig::default()
    }
}

fn spec(offset: i64) -> ForwardSpec {
    ForwardSpec {
        source: SRC,
        destinations: vec![DEST_B, DEST_C],
        chain: 0,
        offset: MessageId(offset),
        end: None,
    }
}

fn engine(
    transport: &Arc<FakeTransport>,
    offsets: &Arc<InMemoryOffsetStore>,
    delay_ms: u64,
) -> BacklogSyncEngine {
    let pipeline = Arc::new(MessagePipeline::new(
        vec![vec![]],
        Arc::new(FakeStager::default()),
    ));
    BacklogSyncEngine::new(
        AgentId(0),
        Arc::clone(transport) as Arc<dyn courier_channels::Transport>,
        pipeline,
        correlation::shared(100),
        Arc::clone(offsets) as Arc<dyn OffsetStore>,
        BacklogSettings {
            delay_ms,
            retry_budget: 5,
        },
    )
}

/// The end-to-end scenario: one plain message, then a two-item group whose
/// caption sits on the first item.
#[tokio::test(start_paused = true)]
async fn forwards_backlog_with_grouping_and_offsets() {
    let transport = Arc::new(FakeTransport::with_backlog(SRC, vec![
        raw(SRC, 101, "hi"),
        grouped(SRC, 102, "vacation", 1),
        grouped(SRC, 103, "", 1),
    ]));
    let offsets = Arc::new(InMemoryOffsetStore::new());
    let engine = engine(&transport, &offsets, 0);

    let mut specs = vec![spec(100)];
    engine.run(&user_agent(0), &mut specs).await;

    assert_eq!(transport.sent_texts(DEST_B), vec!["hi", "vacation"]);
    assert_eq!(transport.sent_texts(DEST_C), vec!["hi", "vacation"]);
    let albums: Vec<usize> = transport
        .sent
        .lock()
        .unwrap()
        .iter()
        .map(|post| post.items)
        .collect();
    assert_eq!(albums, vec![1, 1, 2, 2]);

    assert_eq!(specs[0].offset, MessageId(103));
    assert_eq!(offsets.get(SRC), Some(MessageId(103)));
}

#[tokio::test(start_paused = true)]
async fn resuming_from_offset_skips_already_forwarded_ids() {
    let transport = Arc::new(FakeTransport::with_backlog(SRC, vec![
        raw(SRC, 99, "old"),
        raw(SRC, 100, "older"),
        raw(SRC, 101, "new"),
    ]));
    let offsets = Arc::new(InMemoryOffsetStore::new());
    let engine = engine(&transport, &offsets, 0);

    let mut specs = vec![spec(100)];
    engine.run(&user_agent(0), &mut specs).await;

    assert_eq!(transport.sent_texts(DEST_B), vec!["new"]);
    assert_eq!(specs[0].offset, MessageId(101));
}

#[tokio::test(start_paused = true)]
async fn rate_limit_sleeps_once_and_resumes_without_skips() {
    let transport = Arc::new(FakeTransport::with_backlog(SRC, vec![
        raw(SRC, 101, "hi"),
        raw(SRC, 102, "yo"),
    ]));
    transport.fail_next_send(TransportError::rate_limited(Duration::from_secs(7)));
    let offsets = Arc::new(InMemoryOffsetStore::new());
    let engine = engine(&transport, &offsets, 0);

    let started = tokio::time::Instant::now();
    let mut specs = vec![spec(100)];
    engine.run(&user_agent(0), &mut specs).await;

    // Exactly one sleep of the signaled duration; nothing skipped or sent
    // twice.
    assert_eq!(started.elapsed(), Duration::from_secs(7));
    assert_eq!(transport.sent_texts(DEST_B), vec!["hi", "yo"]);
    assert_eq!(transport.sent_texts(DEST_C), vec!["hi", "yo"]);
    assert_eq!(specs[0].offset, MessageId(102));
}

#[tokio::test(start_paused = true)]
async fn failed_forward_leaves_offset_unchanged() {
    let transport = Arc::new(FakeTransport::with_backlog(SRC, vec![
        raw(SRC, 101, "doomed"),
        raw(SRC, 102, "fine"),
    ]));
    transport.fail_next_send(TransportError::external(
        "send message",
        std::io::Error::other("boom"),
    ));
    let offsets = Arc::new(InMemoryOffsetStore::new());
    let engine = engine(&transport, &offsets, 0);

    let mut specs = vec![spec(100)];
    engine.run(&user_agent(0), &mut specs).await;

    // 101 failed and was not retried within the pass; 102 still went out
    // and the offset reflects only the success.
    assert_eq!(transport.sent_texts(DEST_B), vec!["fine"]);
    assert_eq!(specs[0].offset, MessageId(102));
    assert_eq!(offsets.get(SRC), Some(MessageId(102)));
}

#[tokio::test(start_paused = true)]
async fn service_messages_and_end_bound_are_respected() {
    let mut service = raw(SRC, 102, "user joined");
    service.service = true;
    let transport = Arc::new(FakeTransport::with_backlog(SRC, vec![
        raw(SRC, 101, "first"),
        service,
        raw(SRC, 103, "second"),
        raw(SRC, 104, "past the end"),
    ]));
    let offsets = Arc::new(InMemoryOffsetStore::new());
    let engine = engine(&transport, &offsets, 0);

    let mut specs = vec![ForwardSpec {
        end: Some(MessageId(103)),
        ..spec(100)
    }];
    engine.run(&user_agent(0), &mut specs).await;

    assert_eq!(transport.sent_texts(DEST_B), vec!["first", "second"]);
    assert_eq!(specs[0].offset, MessageId(103));
}

#[tokio::test(start_paused = true)]
async fn bot_agents_are_refused() {
    let transport = Arc::new(FakeTransport::with_backlog(SRC, vec![raw(
        SRC, 101, "hi",
    )]));
    let offsets = Arc::new(InMemoryOffsetStore::new());
    let engine = engine(&transport, &offsets, 0);

    let mut specs = vec![spec(100)];
    engine
        .run(&AgentConfig::default(), &mut specs)
        .await;

    assert_eq!(transport.sent_count(), 0);
    assert_eq!(
        transport
            .history_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        0
    );
}

#[tokio::test(start_paused = true)]
async fn inter_message_delay_paces_forwards() {
    let transport = Arc::new(FakeTransport::with_backlog(SRC, vec![
        raw(SRC, 101, "a"),
        raw(SRC, 102, "b"),
        raw(SRC, 103, "c"),
    ]));
    let offsets = Arc::new(InMemoryOffsetStore::new());
    let engine = engine(&transport, &offsets, 250);

    let started = tokio::time::Instant::now();
    let mut specs = vec![spec(100)];
    engine.run(&user_agent(250), &mut specs).await;

    // Three forwarded units, one mandatory delay after each.
    assert_eq!(started.elapsed(), Duration::from_millis(750));
    assert_eq!(specs[0].offset, MessageId(103));
}
