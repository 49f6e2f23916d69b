// src/live/content.rs

use url::Url;

use crate::live::protocol::{SlideBroadcast, SlideElement, SlideKind};
use crate::models::presentation::InteractiveSlide;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    /// Only YouTube and Vimeo links are accepted for video presentations.
    UnsupportedVideoUrl,
    /// The PDF reports no pages, or the interactive deck has no slides.
    EmptyPresentation,
}

impl ContentError {
    pub fn message(&self) -> &'static str {
        match self {
            ContentError::UnsupportedVideoUrl => "Only YouTube and Vimeo links are supported.",
            ContentError::EmptyPresentation => "The presentation has no slides.",
        }
    }
}

/// The presenter's active content, as a tagged union over the three
/// presentation kinds. Replaces the source's DOM-driven dispatch with
/// exhaustive matching.
#[derive(Debug, Clone)]
pub enum ContentKind {
    Pdf { file_url: String },
    Interactive { slides: Vec<InteractiveSlide> },
    Video { embed_url: String },
}

#[derive(Debug, Clone)]
struct ActiveContent {
    title: String,
    kind: ContentKind,
    /// 1-based; invariant `1 <= current <= total`.
    current: u32,
    total: u32,
}

/// Computes and emits the presenter's display state. All mutations return
/// the full `SlideBroadcast` to publish; spectators refresh their mirror
/// wholesale, there is no incremental diffing.
#[derive(Debug, Clone, Default)]
pub struct Synchronizer {
    active: Option<ActiveContent>,
}

impl Synchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_active_presentation(&self) -> bool {
        self.active.is_some()
    }

    pub fn current_slide(&self) -> Option<u32> {
        self.active.as_ref().map(|a| a.current)
    }

    pub fn total_slides(&self) -> Option<u32> {
        self.active.as_ref().map(|a| a.total)
    }

    pub fn title(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.title.as_str())
    }

    /// Loads a PDF presentation, replacing any active content atomically.
    /// Re-loading the document currently active under the same URL keeps
    /// the loaded handle and only rewinds to the first page.
    pub fn load_pdf(
        &mut self,
        title: &str,
        file_url: &str,
        total_pages: u32,
    ) -> Result<SlideBroadcast, ContentError> {
        if total_pages == 0 {
            return Err(ContentError::EmptyPresentation);
        }

        let same_document = matches!(
            &self.active,
            Some(ActiveContent { kind: ContentKind::Pdf { file_url: active_url }, .. })
                if active_url == file_url
        );
        if !same_document {
            self.active = Some(ActiveContent {
                title: title.to_string(),
                kind: ContentKind::Pdf {
                    file_url: file_url.to_string(),
                },
                current: 1,
                total: total_pages,
            });
        } else if let Some(active) = &mut self.active {
            active.current = 1;
            active.total = total_pages;
            active.title = title.to_string();
        }

        Ok(self.broadcast())
    }

    /// Activates an interactive deck (index 1, total = slide count).
    pub fn load_interactive(
        &mut self,
        title: &str,
        slides: Vec<InteractiveSlide>,
    ) -> Result<SlideBroadcast, ContentError> {
        if slides.is_empty() {
            return Err(ContentError::EmptyPresentation);
        }
        let total = slides.len() as u32;
        self.active = Some(ActiveContent {
            title: title.to_string(),
            kind: ContentKind::Interactive { slides },
            current: 1,
            total,
        });
        Ok(self.broadcast())
    }

    /// Activates a single-slide video presentation. The raw link is
    /// validated and normalized to its embed form.
    pub fn load_video(&mut self, title: &str, raw_url: &str) -> Result<SlideBroadcast, ContentError> {
        let embed_url = embed_url_for(raw_url)?;
        self.active = Some(ActiveContent {
            title: title.to_string(),
            kind: ContentKind::Video { embed_url },
            current: 1,
            total: 1,
        });
        Ok(self.broadcast())
    }

    /// Moves one slide forward or back, clamped at the bounds: at the first
    /// or last index the call is a no-op and nothing is broadcast.
    pub fn advance(&mut self, direction: Direction) -> Option<SlideBroadcast> {
        let active = self.active.as_mut()?;
        match direction {
            Direction::Next if active.current < active.total => active.current += 1,
            Direction::Previous if active.current > 1 => active.current -= 1,
            _ => return None,
        }
        Some(self.broadcast())
    }

    /// Clears the active content. Returns the title so the caller can
    /// announce `presentation_end`.
    pub fn end_presentation(&mut self) -> Option<String> {
        self.active.take().map(|a| a.title)
    }

    /// Re-emits the full current state, for answering a late joiner's sync
    /// request. None when nothing is being presented.
    pub fn current_broadcast(&self) -> Option<SlideBroadcast> {
        self.active.as_ref().map(|_| self.broadcast())
    }

    fn broadcast(&self) -> SlideBroadcast {
        let active = self.active.as_ref().expect("broadcast requires active content");
        match &active.kind {
            // Index + file reference only; spectators fetch and render the
            // page themselves (they already carry the rendering capability,
            // and pages are potentially large).
            ContentKind::Pdf { file_url } => SlideBroadcast {
                kind: SlideKind::Pdf,
                current_slide: active.current,
                total_slides: active.total,
                presentation_title: active.title.clone(),
                file_url: Some(file_url.clone()),
                slide_content: None,
            },
            // Fully resolved element list: small, and must render on
            // spectators without a PDF engine.
            ContentKind::Interactive { slides } => SlideBroadcast {
                kind: SlideKind::Interactive,
                current_slide: active.current,
                total_slides: active.total,
                presentation_title: active.title.clone(),
                file_url: None,
                slide_content: Some(current_elements(slides, active.current)),
            },
            ContentKind::Video { embed_url } => SlideBroadcast {
                kind: SlideKind::Video,
                current_slide: 1,
                total_slides: 1,
                presentation_title: active.title.clone(),
                file_url: Some(embed_url.clone()),
                slide_content: None,
            },
        }
    }
}

fn current_elements(slides: &[InteractiveSlide], current: u32) -> Vec<SlideElement> {
    slides
        .get(current as usize - 1)
        .map(|s| s.content.clone())
        .unwrap_or_default()
}

/// Normalizes a YouTube/Vimeo link to its embed URL; rejects anything else.
pub fn embed_url_for(raw: &str) -> Result<String, ContentError> {
    let url = Url::parse(raw).map_err(|_| ContentError::UnsupportedVideoUrl)?;
    let host = url.host_str().unwrap_or_default().trim_start_matches("www.");

    match host {
        "youtube.com" | "m.youtube.com" => {
            if url.path().starts_with("/embed/") {
                return Ok(raw.to_string());
            }
            let video_id = url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned())
                .ok_or(ContentError::UnsupportedVideoUrl)?;
            Ok(format!("https://www.youtube.com/embed/{}", video_id))
        }
        "youtu.be" => {
            let video_id = url
                .path_segments()
                .and_then(|mut s| s.next().map(str::to_string))
                .filter(|s| !s.is_empty())
                .ok_or(ContentError::UnsupportedVideoUrl)?;
            Ok(format!("https://www.youtube.com/embed/{}", video_id))
        }
        "vimeo.com" => {
            let video_id = url
                .path_segments()
                .and_then(|mut s| s.next().map(str::to_string))
                .filter(|s| s.chars().all(|c| c.is_ascii_digit()) && !s.is_empty())
                .ok_or(ContentError::UnsupportedVideoUrl)?;
            Ok(format!("https://player.vimeo.com/video/{}", video_id))
        }
        "player.vimeo.com" => Ok(raw.to_string()),
        _ => Err(ContentError::UnsupportedVideoUrl),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::protocol::ElementKind;

    fn deck(n: usize) -> Vec<InteractiveSlide> {
        (0..n)
            .map(|i| InteractiveSlide {
                content: vec![SlideElement {
                    kind: ElementKind::Text,
                    x: 10.0,
                    y: 20.0,
                    width: 200.0,
                    height: 50.0,
                    value: Some(format!("slide {}", i + 1)),
                    font_size: Some(24.0),
                    src: None,
                }],
            })
            .collect()
    }

    #[test]
    fn load_pdf_starts_at_page_one() {
        let mut sync = Synchronizer::new();
        let b = sync.load_pdf("Historia", "https://files.example/deck.pdf", 10).unwrap();
        assert_eq!(b.kind, SlideKind::Pdf);
        assert_eq!(b.current_slide, 1);
        assert_eq!(b.total_slides, 10);
        assert_eq!(b.file_url.as_deref(), Some("https://files.example/deck.pdf"));
        assert!(b.slide_content.is_none());
    }

    #[test]
    fn advance_clamps_at_both_ends() {
        let mut sync = Synchronizer::new();
        sync.load_pdf("Historia", "https://files.example/deck.pdf", 3).unwrap();

        // Already at the first page.
        assert!(sync.advance(Direction::Previous).is_none());

        assert_eq!(sync.advance(Direction::Next).unwrap().current_slide, 2);
        assert_eq!(sync.advance(Direction::Next).unwrap().current_slide, 3);

        // At the last page: no mutation, no broadcast.
        assert!(sync.advance(Direction::Next).is_none());
        assert_eq!(sync.current_slide(), Some(3));
    }

    #[test]
    fn advance_without_content_is_a_noop() {
        let mut sync = Synchronizer::new();
        assert!(sync.advance(Direction::Next).is_none());
    }

    #[test]
    fn reloading_the_same_pdf_rewinds_to_page_one() {
        let mut sync = Synchronizer::new();
        sync.load_pdf("Historia", "https://files.example/deck.pdf", 10).unwrap();
        sync.advance(Direction::Next);
        sync.advance(Direction::Next);

        let b = sync.load_pdf("Historia", "https://files.example/deck.pdf", 10).unwrap();
        assert_eq!(b.current_slide, 1);
    }

    #[test]
    fn interactive_broadcast_resolves_current_slide_elements() {
        let mut sync = Synchronizer::new();
        let b = sync.load_interactive("Células", deck(3)).unwrap();
        assert_eq!(b.kind, SlideKind::Interactive);
        assert_eq!(
            b.slide_content.unwrap()[0].value.as_deref(),
            Some("slide 1")
        );

        let b = sync.advance(Direction::Next).unwrap();
        assert_eq!(
            b.slide_content.unwrap()[0].value.as_deref(),
            Some("slide 2")
        );
    }

    #[test]
    fn empty_decks_are_rejected() {
        let mut sync = Synchronizer::new();
        assert_eq!(
            sync.load_interactive("vacío", Vec::new()),
            Err(ContentError::EmptyPresentation)
        );
        assert_eq!(
            sync.load_pdf("vacío", "https://files.example/x.pdf", 0),
            Err(ContentError::EmptyPresentation)
        );
    }

    #[test]
    fn end_presentation_clears_state() {
        let mut sync = Synchronizer::new();
        sync.load_pdf("Historia", "https://files.example/deck.pdf", 3).unwrap();
        assert_eq!(sync.end_presentation().as_deref(), Some("Historia"));
        assert!(!sync.has_active_presentation());
        assert!(sync.current_broadcast().is_none());
    }

    #[test]
    fn video_urls_normalize_to_embed_form() {
        assert_eq!(
            embed_url_for("https://www.youtube.com/watch?v=abc123").unwrap(),
            "https://www.youtube.com/embed/abc123"
        );
        assert_eq!(
            embed_url_for("https://youtu.be/abc123").unwrap(),
            "https://www.youtube.com/embed/abc123"
        );
        assert_eq!(
            embed_url_for("https://vimeo.com/987654").unwrap(),
            "https://player.vimeo.com/video/987654"
        );
        assert!(embed_url_for("https://example.com/video.mp4").is_err());
        assert!(embed_url_for("not a url").is_err());
    }

    #[test]
    fn video_load_is_a_single_slide() {
        let mut sync = Synchronizer::new();
        let b = sync
            .load_video("Documental", "https://www.youtube.com/watch?v=abc123")
            .unwrap();
        assert_eq!(b.kind, SlideKind::Video);
        assert_eq!(b.total_slides, 1);
        assert!(sync.advance(Direction::Next).is_none());
    }
}
