// src/live/protocol.rs

use serde::{Deserialize, Serialize};

/// Participant role on a topic. Exactly one presenter per session is the
/// writer-of-record for content and timer state; spectators only emit
/// reactions, presence and sync requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Presenter,
    Spectator,
}

/// Message envelope delivered on a session topic:
/// `{"type": "broadcast"|"presence", "event": <kind>, "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Envelope {
    Broadcast {
        #[serde(flatten)]
        event: BroadcastEvent,
    },
    Presence {
        #[serde(flatten)]
        event: PresenceEvent,
    },
}

/// Broadcast event kinds multiplexed over one topic. No ordering is
/// guaranteed across distinct kinds; consumers treat each stream
/// independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum BroadcastEvent {
    Timer(TimerBroadcast),
    Slide(SlideBroadcast),
    Reaction(Reaction),
    Question(QuestionPush),
    RequestSlideSync(SlideSyncRequest),
    PresentationEnd(PresentationEnd),
    SessionDelete(SessionDelete),
}

/// Discriminant-only view of `BroadcastEvent`, used for the per-role
/// subscription table built at channel-open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Timer,
    Slide,
    Reaction,
    Question,
    RequestSlideSync,
    PresentationEnd,
    SessionDelete,
}

impl BroadcastEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            BroadcastEvent::Timer(_) => EventKind::Timer,
            BroadcastEvent::Slide(_) => EventKind::Slide,
            BroadcastEvent::Reaction(_) => EventKind::Reaction,
            BroadcastEvent::Question(_) => EventKind::Question,
            BroadcastEvent::RequestSlideSync(_) => EventKind::RequestSlideSync,
            BroadcastEvent::PresentationEnd(_) => EventKind::PresentationEnd,
            BroadcastEvent::SessionDelete(_) => EventKind::SessionDelete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerAction {
    Start,
    Pause,
    Resume,
    Reset,
    Update,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerBroadcast {
    pub action: TimerAction,
    pub seconds: u32,
    pub total_seconds: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlideKind {
    Pdf,
    Interactive,
    Video,
}

/// Full content state, re-broadcast wholesale on every change.
/// Pdf carries only index + file reference (spectators render the page
/// themselves); interactive carries the fully resolved element list so
/// spectators need no separate fetch; video carries the embed URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideBroadcast {
    #[serde(rename = "type")]
    pub kind: SlideKind,
    pub current_slide: u32,
    pub total_slides: u32,
    pub presentation_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slide_content: Option<Vec<SlideElement>>,
}

/// One positioned element of an interactive slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideElement {
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Text,
    Image,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub kind: String,
}

/// A live question pushed from the presenter's question bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPush {
    pub question_id: i64,
    pub title: String,
    pub qtype: String,
    pub options: Option<Vec<String>>,
}

/// Emitted by a spectator right after subscribing; addressed to the whole
/// topic since the transport has no direct addressing or message replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideSyncRequest {
    pub requesting_spectator: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationEnd {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDelete {
    pub message: String,
}

/// Presence protocol: `sync` carries the transport's full roster snapshot,
/// `join`/`leave` are best-effort deltas keyed by display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum PresenceEvent {
    Sync {
        state: Vec<PresenceEntry>,
    },
    Join {
        #[serde(rename = "newPresences")]
        new_presences: Vec<PresenceEntry>,
    },
    Leave {
        #[serde(rename = "leftPresences")]
        left_presences: Vec<PresenceEntry>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub role: Role,
}

/// Inbound commands a connected client may send over its socket.
/// Role authorization happens at dispatch: only the presenter may drive
/// content, timer, questions and session teardown.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Starts the countdown; while running this toggles to pause
    /// (intentional overload, mirrored from the presenter UI).
    StartTimer { total_seconds: u32 },
    PauseTimer,
    ResumeTimer,
    ResetTimer,
    NextSlide,
    PrevSlide,
    LoadPdf {
        title: String,
        file_url: String,
        total_pages: u32,
    },
    LoadInteractive {
        presentation_id: i64,
    },
    LoadVideo {
        title: String,
        url: String,
    },
    EndPresentation,
    PushQuestion {
        question_id: i64,
    },
    DeleteSession,
    SendReaction {
        kind: String,
    },
    RequestSlideSync,
}
