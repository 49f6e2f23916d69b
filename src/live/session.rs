// src/live/session.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;

use crate::config::REACTION_KINDS;
use crate::error::AppError;
use crate::live::content::{ContentError, Direction, Synchronizer};
use crate::live::hub::LiveHub;
use crate::live::presence::PresenceRoster;
use crate::live::protocol::{
    BroadcastEvent, Envelope, EventKind, PresenceEntry, PresentationEnd, QuestionPush, Reaction,
    Role, SessionDelete, SlideBroadcast, SlideKind, SlideSyncRequest, TimerBroadcast,
};
use crate::live::timer::{Countdown, TimerError, TimerState};
use crate::models::presentation::InteractiveSlide;

/// Broadcast event kinds each role reacts to. Built once, at channel-open
/// time, so no handler can be registered after subscription and miss a
/// race window.
pub fn handled_events(role: Role) -> &'static [EventKind] {
    match role {
        Role::Presenter => &[EventKind::Reaction, EventKind::RequestSlideSync],
        Role::Spectator => &[
            EventKind::Slide,
            EventKind::Timer,
            EventKind::Question,
            EventKind::PresentationEnd,
            EventKind::SessionDelete,
        ],
    }
}

/// Either a live connection to a topic, or a harmless stub when the
/// transport was unavailable at open time. Presenter workflow continuity
/// wins over hard correctness: sends on a stub are silent no-ops.
#[derive(Clone)]
enum ChannelHandle {
    Live { sender: broadcast::Sender<Envelope> },
    Stub,
}

impl ChannelHandle {
    fn send(&self, envelope: Envelope) {
        match self {
            ChannelHandle::Live { sender } => {
                // A send error only means no subscriber is listening.
                let _ = sender.send(envelope);
            }
            ChannelHandle::Stub => {}
        }
    }
}

/// Presenter-owned mutable state: the single writer-of-record for timer
/// and content on this session's topic.
#[derive(Default)]
struct PresenterState {
    countdown: Countdown,
    synchronizer: Synchronizer,
    reaction_counts: HashMap<String, u64>,
}

/// A spectator's read-only mirror of the presenter's state, refreshed
/// wholesale on every broadcast.
#[derive(Debug, Clone, Default)]
pub struct SpectatorView {
    pub presentation_title: Option<String>,
    pub kind: Option<SlideKind>,
    pub current_slide: u32,
    pub total_slides: u32,
    pub slide_content: Option<Vec<crate::live::protocol::SlideElement>>,
    pub file_url: Option<String>,
    pub timer: Option<TimerBroadcast>,
    pub last_question: Option<QuestionPush>,
    pub presentation_ended: bool,
    pub session_deleted: bool,
    /// URL of the PDF document currently held open. Re-opening the same
    /// document is skipped; `pdf_loads` counts actual opens.
    pub cached_pdf_url: Option<String>,
    pub pdf_loads: u32,
}

impl SpectatorView {
    fn apply_slide(&mut self, slide: SlideBroadcast) {
        if slide.kind == SlideKind::Pdf {
            // Idempotent per document handle: only a new URL forces a load.
            if self.cached_pdf_url.as_deref() != slide.file_url.as_deref() {
                self.cached_pdf_url = slide.file_url.clone();
                self.pdf_loads += 1;
            }
        } else {
            self.cached_pdf_url = None;
        }

        self.presentation_title = Some(slide.presentation_title);
        self.kind = Some(slide.kind);
        self.current_slide = slide.current_slide;
        self.total_slides = slide.total_slides;
        self.slide_content = slide.slide_content;
        self.file_url = slide.file_url;
        self.presentation_ended = false;
    }
}

/// One participant's connection to a live session: owns the subscription,
/// the role's typed dispatch, presence tracking and (for the presenter)
/// the countdown and content synchronizer.
pub struct ChannelSession {
    session_code: String,
    name: String,
    role: Role,
    hub: LiveHub,
    handle: ChannelHandle,
    presenter: Arc<Mutex<PresenterState>>,
    spectator: Arc<Mutex<SpectatorView>>,
    roster: Arc<Mutex<PresenceRoster>>,
    recv_task: Option<JoinHandle<()>>,
    tick_task: Option<JoinHandle<()>>,
}

impl ChannelSession {
    /// Opens one logical channel bound to the topic derived from the
    /// session code. Subscribing registers the role's handlers before the
    /// subscription goes live; on success the local client's presence is
    /// tracked, and a spectator immediately requests a slide sync since
    /// the channel has no message history.
    pub async fn open(hub: &LiveHub, session_code: &str, role: Role, name: &str) -> ChannelSession {
        let presenter = Arc::new(Mutex::new(PresenterState::default()));
        let spectator = Arc::new(Mutex::new(SpectatorView::default()));
        let roster = Arc::new(Mutex::new(PresenceRoster::new()));

        let mut session = ChannelSession {
            session_code: session_code.to_string(),
            name: name.to_string(),
            role,
            hub: hub.clone(),
            handle: ChannelHandle::Stub,
            presenter,
            spectator,
            roster,
            recv_task: None,
            tick_task: None,
        };

        let Some((sender, receiver)) = hub.subscribe(session_code).await else {
            tracing::warn!(
                "Realtime unavailable for session {}; degrading to local stub",
                session_code
            );
            return session;
        };

        session.handle = ChannelHandle::Live {
            sender: sender.clone(),
        };
        session.recv_task = Some(tokio::spawn(recv_loop(
            receiver,
            sender,
            role,
            Arc::clone(&session.presenter),
            Arc::clone(&session.spectator),
            Arc::clone(&session.roster),
        )));

        hub.track(
            session_code,
            PresenceEntry {
                name: name.to_string(),
                role,
            },
        )
        .await;

        if role == Role::Spectator {
            session.handle.send(Envelope::Broadcast {
                event: BroadcastEvent::RequestSlideSync(SlideSyncRequest {
                    requesting_spectator: name.to_string(),
                }),
            });
        }

        session
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn session_code(&self) -> &str {
        &self.session_code
    }

    pub fn is_stub(&self) -> bool {
        matches!(self.handle, ChannelHandle::Stub)
    }

    // ------------------------------------------------------------------
    // Timer (presenter-only)
    // ------------------------------------------------------------------

    /// Starts the countdown; while running this toggles to pause, and
    /// while paused it resumes (single-button overload).
    pub async fn start_timer(&mut self, total_seconds: u32) -> Result<(), AppError> {
        let broadcast = {
            let mut state = self.presenter.lock().await;
            state.countdown.start(total_seconds).map_err(timer_error)?
        };
        self.publish_timer(broadcast);

        if broadcast.action == crate::live::protocol::TimerAction::Start {
            self.spawn_tick();
        }
        Ok(())
    }

    pub async fn pause_timer(&mut self) -> Result<(), AppError> {
        let broadcast = {
            let mut state = self.presenter.lock().await;
            state
                .countdown
                .pause()
                .ok_or_else(|| AppError::BadRequest("Timer is not running.".to_string()))?
        };
        self.publish_timer(broadcast);
        Ok(())
    }

    pub async fn resume_timer(&mut self) -> Result<(), AppError> {
        let broadcast = {
            let mut state = self.presenter.lock().await;
            state
                .countdown
                .resume()
                .ok_or_else(|| AppError::BadRequest("Timer is not paused.".to_string()))?
        };
        self.publish_timer(broadcast);
        Ok(())
    }

    pub async fn reset_timer(&mut self) {
        if let Some(task) = self.tick_task.take() {
            task.abort();
        }
        let broadcast = {
            let mut state = self.presenter.lock().await;
            state.reaction_counts.clear();
            state.countdown.reset()
        };
        self.publish_timer(broadcast);
    }

    fn publish_timer(&self, broadcast: TimerBroadcast) {
        self.handle.send(Envelope::Broadcast {
            event: BroadcastEvent::Timer(broadcast),
        });
    }

    /// One tick per simulated second until the countdown leaves Running
    /// for good. The pure state machine decides which ticks broadcast.
    fn spawn_tick(&mut self) {
        if let Some(previous) = self.tick_task.take() {
            previous.abort();
        }

        let presenter = Arc::clone(&self.presenter);
        let handle = self.handle.clone();
        self.tick_task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            // The first interval tick fires immediately; skip it.
            interval.tick().await;
            loop {
                interval.tick().await;
                let (broadcast, state) = {
                    let mut presenter = presenter.lock().await;
                    let b = presenter.countdown.tick();
                    (b, presenter.countdown.state())
                };
                if let Some(b) = broadcast {
                    handle.send(Envelope::Broadcast {
                        event: BroadcastEvent::Timer(b),
                    });
                }
                if matches!(state, TimerState::Finished | TimerState::Idle) {
                    break;
                }
            }
        }));
    }

    // ------------------------------------------------------------------
    // Content (presenter-only)
    // ------------------------------------------------------------------

    pub async fn load_pdf(
        &mut self,
        title: &str,
        file_url: &str,
        total_pages: u32,
    ) -> Result<(), AppError> {
        let broadcast = {
            let mut state = self.presenter.lock().await;
            state
                .synchronizer
                .load_pdf(title, file_url, total_pages)
                .map_err(content_error)?
        };
        self.publish_slide(broadcast);
        Ok(())
    }

    pub async fn load_interactive(
        &mut self,
        title: &str,
        slides: Vec<InteractiveSlide>,
    ) -> Result<(), AppError> {
        let broadcast = {
            let mut state = self.presenter.lock().await;
            state
                .synchronizer
                .load_interactive(title, slides)
                .map_err(content_error)?
        };
        self.publish_slide(broadcast);
        Ok(())
    }

    pub async fn load_video(&mut self, title: &str, url: &str) -> Result<(), AppError> {
        let broadcast = {
            let mut state = self.presenter.lock().await;
            state
                .synchronizer
                .load_video(title, url)
                .map_err(content_error)?
        };
        self.publish_slide(broadcast);
        Ok(())
    }

    /// Clamped navigation: at the bounds nothing mutates, nothing is sent.
    pub async fn advance(&mut self, direction: Direction) {
        let broadcast = {
            let mut state = self.presenter.lock().await;
            state.synchronizer.advance(direction)
        };
        if let Some(b) = broadcast {
            self.publish_slide(b);
        }
    }

    pub async fn end_presentation(&mut self) {
        let title = {
            let mut state = self.presenter.lock().await;
            state.synchronizer.end_presentation()
        };
        if let Some(title) = title {
            self.handle.send(Envelope::Broadcast {
                event: BroadcastEvent::PresentationEnd(PresentationEnd { title }),
            });
        }
    }

    fn publish_slide(&self, broadcast: SlideBroadcast) {
        self.handle.send(Envelope::Broadcast {
            event: BroadcastEvent::Slide(broadcast),
        });
    }

    // ------------------------------------------------------------------
    // Questions and teardown broadcasts (presenter-only)
    // ------------------------------------------------------------------

    pub fn push_question(&self, question: QuestionPush) {
        self.handle.send(Envelope::Broadcast {
            event: BroadcastEvent::Question(question),
        });
    }

    /// Announces the end of the whole session, evicting spectators.
    pub fn announce_session_delete(&self, message: &str) {
        self.handle.send(Envelope::Broadcast {
            event: BroadcastEvent::SessionDelete(SessionDelete {
                message: message.to_string(),
            }),
        });
    }

    // ------------------------------------------------------------------
    // Any role
    // ------------------------------------------------------------------

    pub fn send_reaction(&self, kind: &str) -> Result<(), AppError> {
        if !REACTION_KINDS.contains(&kind) {
            return Err(AppError::BadRequest(format!("Unknown reaction: {}", kind)));
        }
        self.handle.send(Envelope::Broadcast {
            event: BroadcastEvent::Reaction(Reaction {
                kind: kind.to_string(),
            }),
        });
        Ok(())
    }

    /// Asks the presenter to re-emit full content and timer state.
    pub fn request_slide_sync(&self) {
        self.handle.send(Envelope::Broadcast {
            event: BroadcastEvent::RequestSlideSync(SlideSyncRequest {
                requesting_spectator: self.name.clone(),
            }),
        });
    }

    // ------------------------------------------------------------------
    // Read access for the dashboard and for tests
    // ------------------------------------------------------------------

    pub async fn spectator_view(&self) -> SpectatorView {
        self.spectator.lock().await.clone()
    }

    pub async fn roster(&self) -> PresenceRoster {
        self.roster.lock().await.clone()
    }

    pub async fn reaction_counts(&self) -> HashMap<String, u64> {
        self.presenter.lock().await.reaction_counts.clone()
    }

    pub async fn timer_state(&self) -> TimerState {
        self.presenter.lock().await.countdown.state()
    }

    /// Cleanup, in order: stop the local tick, untrack presence,
    /// unsubscribe, clear handles. Each step is guarded independently so
    /// a failure in one never prevents the later ones.
    pub async fn close(&mut self) {
        if let Some(task) = self.tick_task.take() {
            task.abort();
        }

        if !matches!(self.handle, ChannelHandle::Stub) {
            self.hub.untrack(&self.session_code, &self.name).await;
        }

        if let Some(task) = self.recv_task.take() {
            task.abort();
        }

        self.handle = ChannelHandle::Stub;
    }
}

fn timer_error(err: TimerError) -> AppError {
    match err {
        TimerError::InvalidDuration => {
            AppError::BadRequest("Timer duration must be positive.".to_string())
        }
        TimerError::InvalidTransition => {
            AppError::BadRequest("Invalid timer transition.".to_string())
        }
    }
}

fn content_error(err: ContentError) -> AppError {
    AppError::BadRequest(err.message().to_string())
}

/// Per-connection receive loop. Presence events always feed the roster;
/// broadcast events go through the role's subscription table.
async fn recv_loop(
    mut receiver: broadcast::Receiver<Envelope>,
    sender: broadcast::Sender<Envelope>,
    role: Role,
    presenter: Arc<Mutex<PresenterState>>,
    spectator: Arc<Mutex<SpectatorView>>,
    roster: Arc<Mutex<PresenceRoster>>,
) {
    let handled = handled_events(role);
    loop {
        let envelope = match receiver.recv().await {
            Ok(envelope) => envelope,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                // Lossy by design; the next presence sync or slide
                // broadcast self-heals what was missed.
                tracing::warn!("Receiver lagged, {} broadcasts dropped", skipped);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        match envelope {
            Envelope::Presence { event } => {
                roster.lock().await.apply(&event);
            }
            Envelope::Broadcast { event } => {
                if !handled.contains(&event.kind()) {
                    continue;
                }
                match event {
                    BroadcastEvent::Reaction(reaction) => {
                        let mut state = presenter.lock().await;
                        *state.reaction_counts.entry(reaction.kind).or_insert(0) += 1;
                    }
                    BroadcastEvent::RequestSlideSync(request) => {
                        // Answer a late joiner with the full current state.
                        tracing::debug!(
                            "Slide sync requested by {}",
                            request.requesting_spectator
                        );
                        let (slide, timer) = {
                            let state = presenter.lock().await;
                            (
                                state.synchronizer.current_broadcast(),
                                state.countdown.snapshot(),
                            )
                        };
                        if let Some(slide) = slide {
                            let _ = sender.send(Envelope::Broadcast {
                                event: BroadcastEvent::Slide(slide),
                            });
                        }
                        if let Some(timer) = timer {
                            let _ = sender.send(Envelope::Broadcast {
                                event: BroadcastEvent::Timer(timer),
                            });
                        }
                    }
                    BroadcastEvent::Slide(slide) => {
                        spectator.lock().await.apply_slide(slide);
                    }
                    BroadcastEvent::Timer(timer) => {
                        spectator.lock().await.timer = Some(timer);
                    }
                    BroadcastEvent::Question(question) => {
                        spectator.lock().await.last_question = Some(question);
                    }
                    BroadcastEvent::PresentationEnd(_) => {
                        let mut view = spectator.lock().await;
                        view.presentation_ended = true;
                        view.cached_pdf_url = None;
                        view.kind = None;
                        view.slide_content = None;
                    }
                    BroadcastEvent::SessionDelete(_) => {
                        spectator.lock().await.session_deleted = true;
                    }
                }
            }
        }
    }
}
