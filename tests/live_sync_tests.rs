// tests/live_sync_tests.rs
//
// End-to-end live session flows over the in-process realtime fabric.
// No database needed: these exercise the hub, presence, content sync and
// the teardown broadcasts exactly as participants experience them.

use std::time::Duration;

use aula_backend::live::content::Direction;
use aula_backend::live::hub::LiveHub;
use aula_backend::live::protocol::{
    BroadcastEvent, Envelope, PresenceEvent, Role, SlideKind, TimerAction,
};
use aula_backend::live::session::ChannelSession;

/// Lets the spawned receive loops drain their channels.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn spectator_mirrors_pdf_navigation() {
    let hub = LiveHub::new();
    hub.open_topic("AULAPUDU-12345").await;

    let mut presenter =
        ChannelSession::open(&hub, "AULAPUDU-12345", Role::Presenter, "profe").await;
    let mut spectator = ChannelSession::open(&hub, "AULAPUDU-12345", Role::Spectator, "Ana").await;

    presenter
        .load_pdf("Historia de Chile", "https://files.example/chile.pdf", 10)
        .await
        .unwrap();
    settle().await;

    let view = spectator.spectator_view().await;
    assert_eq!(view.kind, Some(SlideKind::Pdf));
    assert_eq!(view.current_slide, 1);
    assert_eq!(view.total_slides, 10);
    assert_eq!(
        view.presentation_title.as_deref(),
        Some("Historia de Chile")
    );

    for _ in 0..3 {
        presenter.advance(Direction::Next).await;
    }
    settle().await;

    let view = spectator.spectator_view().await;
    assert_eq!(view.current_slide, 4);
    // The document handle is cached: three page turns, one load.
    assert_eq!(view.pdf_loads, 1);

    // Navigating past the last page mutates nothing.
    for _ in 0..20 {
        presenter.advance(Direction::Next).await;
    }
    settle().await;
    assert_eq!(spectator.spectator_view().await.current_slide, 10);

    presenter.close().await;
    spectator.close().await;
}

#[tokio::test]
async fn late_joiner_catches_up_via_sync_request() {
    let hub = LiveHub::new();
    hub.open_topic("AULAPUDU-54321").await;

    let mut presenter =
        ChannelSession::open(&hub, "AULAPUDU-54321", Role::Presenter, "profe").await;
    presenter
        .load_pdf("Geometria", "https://files.example/geo.pdf", 8)
        .await
        .unwrap();
    presenter.advance(Direction::Next).await;
    presenter.advance(Direction::Next).await;
    presenter.start_timer(300).await.unwrap();
    settle().await;

    // Joins after all of the above already happened; the channel has no
    // history, so the opening handshake requests a full sync.
    let mut late = ChannelSession::open(&hub, "AULAPUDU-54321", Role::Spectator, "Benja").await;
    settle().await;

    let view = late.spectator_view().await;
    assert_eq!(view.current_slide, 3);
    assert_eq!(view.total_slides, 8);
    assert_eq!(view.presentation_title.as_deref(), Some("Geometria"));

    let timer = view.timer.expect("timer state should have been re-emitted");
    assert_eq!(timer.total_seconds, 300);

    presenter.close().await;
    late.close().await;
}

#[tokio::test]
async fn handshake_frames_reach_a_receiver_subscribed_before_open() {
    let hub = LiveHub::new();
    hub.open_topic("AULAPUDU-66666").await;

    let mut presenter =
        ChannelSession::open(&hub, "AULAPUDU-66666", Role::Presenter, "profe").await;
    presenter
        .load_pdf("Biologia", "https://files.example/bio.pdf", 6)
        .await
        .unwrap();
    settle().await;

    // The socket handler subscribes its wire forwarder first, then opens
    // the channel session. Everything the opening handshake produces --
    // the joiner's own presence frames and the presenter's immediate
    // answer to the automatic sync request -- must already land in a
    // receiver created in that order.
    let (_, mut wire) = hub
        .subscribe("AULAPUDU-66666")
        .await
        .expect("topic is open");
    let mut spectator = ChannelSession::open(&hub, "AULAPUDU-66666", Role::Spectator, "Ana").await;
    settle().await;

    let mut saw_own_join = false;
    let mut saw_roster_snapshot = false;
    let mut saw_slide_answer = false;
    while let Ok(envelope) = wire.try_recv() {
        match envelope {
            Envelope::Presence {
                event: PresenceEvent::Join { new_presences },
            } => {
                saw_own_join |= new_presences.iter().any(|p| p.name == "Ana");
            }
            Envelope::Presence {
                event: PresenceEvent::Sync { state },
            } => {
                saw_roster_snapshot |= state.iter().any(|p| p.name == "Ana");
            }
            Envelope::Broadcast {
                event: BroadcastEvent::Slide(_),
            } => {
                saw_slide_answer = true;
            }
            _ => {}
        }
    }

    assert!(saw_own_join, "joiner should see its own join frame");
    assert!(saw_roster_snapshot, "joiner should see the roster snapshot");
    assert!(
        saw_slide_answer,
        "the sync answer should not outrun the wire receiver"
    );

    presenter.close().await;
    spectator.close().await;
}

#[tokio::test]
async fn presence_roster_tracks_joins_and_leaves() {
    let hub = LiveHub::new();
    hub.open_topic("AULAPUDU-11111").await;

    let mut presenter =
        ChannelSession::open(&hub, "AULAPUDU-11111", Role::Presenter, "profe").await;
    let mut ana = ChannelSession::open(&hub, "AULAPUDU-11111", Role::Spectator, "Ana").await;
    let mut benja = ChannelSession::open(&hub, "AULAPUDU-11111", Role::Spectator, "Benja").await;
    settle().await;

    let roster = presenter.roster().await;
    assert_eq!(roster.spectator_count(), 2);

    ana.close().await;
    settle().await;
    assert_eq!(presenter.roster().await.spectator_count(), 1);

    presenter.close().await;
    benja.close().await;
}

#[tokio::test]
async fn reactions_aggregate_on_the_presenter_side() {
    let hub = LiveHub::new();
    hub.open_topic("AULAPUDU-22222").await;

    let mut presenter =
        ChannelSession::open(&hub, "AULAPUDU-22222", Role::Presenter, "profe").await;
    let mut ana = ChannelSession::open(&hub, "AULAPUDU-22222", Role::Spectator, "Ana").await;
    settle().await;

    ana.send_reaction("clap").unwrap();
    ana.send_reaction("clap").unwrap();
    ana.send_reaction("love").unwrap();
    settle().await;

    let counts = presenter.reaction_counts().await;
    assert_eq!(counts.get("clap"), Some(&2));
    assert_eq!(counts.get("love"), Some(&1));

    presenter.close().await;
    ana.close().await;
}

#[tokio::test]
async fn timer_start_reaches_spectators() {
    let hub = LiveHub::new();
    hub.open_topic("AULAPUDU-33333").await;

    let mut presenter =
        ChannelSession::open(&hub, "AULAPUDU-33333", Role::Presenter, "profe").await;
    let mut spectator = ChannelSession::open(&hub, "AULAPUDU-33333", Role::Spectator, "Ana").await;

    presenter.start_timer(120).await.unwrap();
    settle().await;

    let timer = spectator
        .spectator_view()
        .await
        .timer
        .expect("start broadcast should arrive");
    assert_eq!(timer.action, TimerAction::Start);
    assert_eq!(timer.seconds, 120);
    assert_eq!(timer.total_seconds, 120);

    presenter.close().await;
    spectator.close().await;
}

#[tokio::test]
async fn session_delete_evicts_spectators() {
    let hub = LiveHub::new();
    hub.open_topic("AULAPUDU-44444").await;

    let mut presenter =
        ChannelSession::open(&hub, "AULAPUDU-44444", Role::Presenter, "profe").await;
    let mut spectator = ChannelSession::open(&hub, "AULAPUDU-44444", Role::Spectator, "Ana").await;
    settle().await;

    presenter.announce_session_delete("The presenter has ended this session.");
    settle().await;

    assert!(spectator.spectator_view().await.session_deleted);

    presenter.close().await;
    spectator.close().await;
}

#[tokio::test]
async fn ending_a_presentation_clears_the_mirror() {
    let hub = LiveHub::new();
    hub.open_topic("AULAPUDU-55555").await;

    let mut presenter =
        ChannelSession::open(&hub, "AULAPUDU-55555", Role::Presenter, "profe").await;
    let mut spectator = ChannelSession::open(&hub, "AULAPUDU-55555", Role::Spectator, "Ana").await;

    presenter
        .load_pdf("Quimica", "https://files.example/quimica.pdf", 5)
        .await
        .unwrap();
    settle().await;
    assert_eq!(
        spectator.spectator_view().await.kind,
        Some(SlideKind::Pdf)
    );

    presenter.end_presentation().await;
    settle().await;

    let view = spectator.spectator_view().await;
    assert!(view.presentation_ended);
    assert_eq!(view.kind, None);
    assert_eq!(view.cached_pdf_url, None);

    presenter.close().await;
    spectator.close().await;
}
