/// Overlay session
///
/// Wires the detection store, the renderer and the host together. Host
/// notifications are queued and handled in `pump`; detection results go
/// through `finish_detection`. Every handled event triggers at most one full
/// repaint.
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use log::{debug, error, info, warn};

use crate::detection::{DetectionSet, ImageFrame};
use crate::detection_store::{DetectionStore, StoreSnapshot};
use crate::detector::{DetectorClient, DetectorError};
use crate::host::{HostEvent, SurfaceProvider};
use crate::overlay::{OverlayRenderer, RenderOutcome};
use crate::subscription::Subscription;
use crate::surface::Surface;

/// Identifies one detection request and the frame it was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionTicket {
    id: u64,
    frame: ImageFrame,
}

pub struct OverlaySession<H: SurfaceProvider> {
    store: DetectionStore,
    renderer: OverlayRenderer,
    host: H,
    queue: Rc<RefCell<VecDeque<HostEvent>>>,
    _host_subscription: Subscription,
    latest_ticket: u64,
}

impl<H: SurfaceProvider> OverlaySession<H> {
    pub fn new(host: H, renderer: OverlayRenderer) -> Self {
        let queue = Rc::new(RefCell::new(VecDeque::new()));
        let sink = Rc::clone(&queue);
        let subscription = host.subscribe(Box::new(move |event: &HostEvent| {
            sink.borrow_mut().push_back(*event);
        }));

        Self {
            store: DetectionStore::new(),
            renderer,
            host,
            queue,
            _host_subscription: subscription,
            latest_ticket: 0,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable host access; events it emits are queued until the next `pump`
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.store.snapshot()
    }

    /// Start a detection for the host's current image.
    ///
    /// Issuing a new ticket makes every older outstanding ticket stale.
    pub fn begin_detection(&mut self) -> Result<DetectionTicket, DetectorError> {
        let frame = self.host.natural_size().ok_or(DetectorError::NoImage)?;
        self.latest_ticket += 1;
        debug!(
            "Detection #{} started for {}x{} image",
            self.latest_ticket, frame.width, frame.height
        );
        Ok(DetectionTicket {
            id: self.latest_ticket,
            frame,
        })
    }

    /// Apply a detection result.
    ///
    /// `Ok(None)` means the result was stale and dropped: a newer ticket was
    /// issued, or the host no longer shows the image it was computed for. On
    /// error the store and the painted overlay are left exactly as they were.
    pub fn finish_detection(
        &mut self,
        ticket: DetectionTicket,
        result: Result<DetectionSet, DetectorError>,
    ) -> Result<Option<RenderOutcome>, DetectorError> {
        if ticket.id != self.latest_ticket {
            info!(
                "Discarding stale detection #{} (latest is #{})",
                ticket.id, self.latest_ticket
            );
            return Ok(None);
        }
        if self.host.natural_size() != Some(ticket.frame) {
            info!("Discarding detection #{}: image changed while it was running", ticket.id);
            return Ok(None);
        }

        match result {
            Ok(detections) => {
                info!("Detection #{} finished with {} result(s)", ticket.id, detections.len());
                let generation = self.store.set_frame(ticket.frame, detections);
                debug!("Store now at generation {}", generation);
                Ok(Some(self.repaint()))
            }
            Err(e) => {
                error!("Detection #{} failed: {}", ticket.id, e);
                Err(e)
            }
        }
    }

    /// Upload, wait for the detector and apply the result
    pub async fn submit(
        &mut self,
        client: &dyn DetectorClient,
        image: &[u8],
    ) -> Result<Option<RenderOutcome>, DetectorError> {
        let ticket = self.begin_detection()?;
        let result = match client.detect(image).await {
            Ok(response) => response
                .into_detection_set()
                .map_err(DetectorError::InvalidResponse),
            Err(e) => Err(e),
        };
        self.finish_detection(ticket, result)
    }

    /// Handle one host event with a single repaint
    pub fn update(&mut self, event: HostEvent) -> RenderOutcome {
        match event {
            HostEvent::Resized { width, height } => {
                debug!("Repainting after resize to {}x{}", width, height);
            }
            HostEvent::ScaleFactorChanged(ratio) => {
                debug!("Repainting after device pixel ratio change to {}", ratio);
            }
            HostEvent::ImageChanged(frame) => {
                debug!("Image changed to {:?}", frame);
                // Queued events can lag behind the host; compare against what it shows now
                let current = self.host.natural_size();
                if self.store.snapshot().frame().copied() != current {
                    let generation = self.store.clear();
                    debug!("Cleared results for the previous image (generation {})", generation);
                }
            }
        }
        self.repaint()
    }

    /// Handle every queued host event in arrival order
    pub fn pump(&mut self) -> Vec<RenderOutcome> {
        let mut outcomes = Vec::new();
        loop {
            // Release the queue borrow before handling; a repaint may emit more events
            let next = self.queue.borrow_mut().pop_front();
            let Some(event) = next else { break };
            outcomes.push(self.update(event));
        }
        outcomes
    }

    /// Full clear-and-redraw from the current store snapshot
    pub fn repaint(&mut self) -> RenderOutcome {
        let snapshot = self.store.snapshot();
        let (width, height) = self.host.displayed_size();
        let ratio = self.host.device_pixel_ratio();
        debug!("Repainting store generation {}", snapshot.generation());

        let outcome = self.renderer.render(
            self.host.surface_mut(),
            snapshot.frame(),
            snapshot.detection_slice(),
            width,
            height,
            ratio,
        );

        if outcome == RenderOutcome::SurfaceUnavailable {
            warn!("Overlay surface not mounted yet; waiting for the next event");
        }
        outcome
    }

    /// Render the current state onto another surface (e.g. for export)
    pub fn render_onto(&self, surface: &mut dyn Surface) -> RenderOutcome {
        let snapshot = self.store.snapshot();
        let (width, height) = self.host.displayed_size();
        self.renderer.render(
            Some(surface),
            snapshot.frame(),
            snapshot.detection_slice(),
            width,
            height,
            self.host.device_pixel_ratio(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::detection::{BoundingBox, DetectResponse, Detection};
    use crate::font::LabelFont;
    use crate::host::HeadlessHost;
    use crate::overlay::geometry::PixelRect;
    use crate::surface::raster::RasterSurface;
    use crate::surface::recording::{DrawCommand, RecordingSurface};

    impl<H: SurfaceProvider> OverlaySession<H> {
        fn into_host(self) -> H {
            self.host
        }
    }

    struct FixedDetector {
        body: Option<&'static str>,
    }

    #[async_trait]
    impl DetectorClient for FixedDetector {
        async fn detect(&self, _image: &[u8]) -> Result<DetectResponse, DetectorError> {
            match self.body {
                Some(body) => Ok(DetectResponse::from_str(body)?),
                None => Err(DetectorError::Unavailable("connection refused".to_string())),
            }
        }
    }

    const CAT: &str = r#"{"results": [{"label": "cat", "confidence": 0.97, "bbox": [0.1, 0.2, 0.5, 0.6]}]}"#;
    const DOG: &str = r#"{"results": [{"label": "dog", "confidence": 0.5, "bbox": [0.0, 0.0, 1.0, 1.0]}]}"#;

    fn recording_session(frame: ImageFrame) -> OverlaySession<HeadlessHost<RecordingSurface>> {
        let mut host = HeadlessHost::new(800.0, 600.0, 1.0);
        host.set_natural_size(Some(frame));
        host.mount(RecordingSurface::new(LabelFont::Bitmap));
        OverlaySession::new(host, OverlayRenderer::default())
    }

    fn painted_texts(session: &OverlaySession<HeadlessHost<RecordingSurface>>) -> Vec<String> {
        session
            .host()
            .surface()
            .map(|s| {
                s.commands()
                    .iter()
                    .filter_map(|c| match c {
                        DrawCommand::FillText { text, .. } => Some(text.clone()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_submit_paints_detections() {
        let mut session = recording_session(ImageFrame::new(400, 300));
        let outcome = session
            .submit(&FixedDetector { body: Some(CAT) }, b"img")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.painted().len(), 1);
        assert_eq!(painted_texts(&session), vec!["cat (97.00%)".to_string()]);
        assert_eq!(session.snapshot().frame(), Some(&ImageFrame::new(400, 300)));
    }

    #[tokio::test]
    async fn test_failed_detection_keeps_previous_overlay() {
        let mut session = recording_session(ImageFrame::new(400, 300));
        session.submit(&FixedDetector { body: Some(CAT) }, b"img").await.unwrap();
        let generation = session.snapshot().generation();
        let painted_before = session.host().surface().unwrap().commands().to_vec();

        let err = session
            .submit(&FixedDetector { body: None }, b"img")
            .await
            .unwrap_err();

        assert!(matches!(err, DetectorError::Unavailable(_)));
        assert_eq!(session.snapshot().generation(), generation);
        assert_eq!(session.host().surface().unwrap().commands(), &painted_before[..]);
    }

    #[tokio::test]
    async fn test_invalid_response_is_rejected_whole() {
        let mut session = recording_session(ImageFrame::new(400, 300));
        let body = r#"{"results": [
            {"label": "cat", "confidence": 0.9, "bbox": [0.1, 0.1, 0.2, 0.2]},
            {"label": "", "confidence": 0.9, "bbox": [0.1, 0.1, 0.2, 0.2]}
        ]}"#;

        let err = session.submit(&FixedDetector { body: Some(body) }, b"img").await.unwrap_err();
        assert!(matches!(err, DetectorError::InvalidResponse(_)));
        assert!(session.snapshot().frame().is_none());
    }

    #[tokio::test]
    async fn test_submit_without_image_fails() {
        let mut host: HeadlessHost<RecordingSurface> = HeadlessHost::new(800.0, 600.0, 1.0);
        host.mount(RecordingSurface::new(LabelFont::Bitmap));
        let mut session = OverlaySession::new(host, OverlayRenderer::default());

        let err = session.submit(&FixedDetector { body: Some(CAT) }, b"img").await.unwrap_err();
        assert!(matches!(err, DetectorError::NoImage));
    }

    #[test]
    fn test_stale_ticket_is_discarded() {
        let mut session = recording_session(ImageFrame::new(400, 300));
        let first = session.begin_detection().unwrap();
        let second = session.begin_detection().unwrap();

        let dog = DetectResponse::from_str(DOG).unwrap().into_detection_set().unwrap();
        let cat = DetectResponse::from_str(CAT).unwrap().into_detection_set().unwrap();

        assert!(session.finish_detection(second, Ok(dog)).unwrap().is_some());
        assert!(session.finish_detection(first, Ok(cat)).unwrap().is_none());
        assert_eq!(painted_texts(&session), vec!["dog (50.00%)".to_string()]);
    }

    #[test]
    fn test_new_frame_replaces_old_boxes() {
        let mut session = recording_session(ImageFrame::new(400, 300));
        let ticket = session.begin_detection().unwrap();
        let cat = DetectResponse::from_str(CAT).unwrap().into_detection_set().unwrap();
        session.finish_detection(ticket, Ok(cat)).unwrap();

        session.host_mut().set_natural_size(Some(ImageFrame::new(100, 50)));
        let ticket = session.begin_detection().unwrap();
        let dog = DetectResponse::from_str(DOG).unwrap().into_detection_set().unwrap();
        session.finish_detection(ticket, Ok(dog)).unwrap();

        let surface = session.host().surface().unwrap();
        assert_eq!(surface.backing_size(), (100, 50));
        assert_eq!(painted_texts(&session), vec!["dog (50.00%)".to_string()]);
        assert!(matches!(
            surface.commands()[0],
            DrawCommand::StrokeRect { rect, .. } if rect == PixelRect::new(0.0, 0.0, 100.0, 50.0)
        ));
    }

    #[test]
    fn test_resize_event_triggers_single_repaint() {
        let mut session = recording_session(ImageFrame::new(400, 300));
        let ticket = session.begin_detection().unwrap();
        let cat = DetectResponse::from_str(CAT).unwrap().into_detection_set().unwrap();
        let before = session.finish_detection(ticket, Ok(cat)).unwrap().unwrap();

        session.host_mut().resize(400.0, 300.0);
        let outcomes = session.pump();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].painted()[0].rect, before.painted()[0].rect);
        let surface = session.host().surface().unwrap();
        assert_eq!(surface.css_size(), (400.0, 300.0));
        assert_eq!(surface.backing_size(), (400, 300));

        // Unchanged size: no event, no repaint
        session.host_mut().resize(400.0, 300.0);
        assert!(session.pump().is_empty());
    }

    #[test]
    fn test_scale_factor_change_restrokes() {
        let mut session = recording_session(ImageFrame::new(400, 300));
        let ticket = session.begin_detection().unwrap();
        let cat = DetectResponse::from_str(CAT).unwrap().into_detection_set().unwrap();
        session.finish_detection(ticket, Ok(cat)).unwrap();

        session.host_mut().set_device_pixel_ratio(3.0);
        session.pump();

        let surface = session.host().surface().unwrap();
        assert!(matches!(surface.commands()[0], DrawCommand::StrokeRect { line_width, .. } if line_width == 6.0));
    }

    #[test]
    fn test_unmounted_surface_retries_on_next_event() {
        let mut host: HeadlessHost<RecordingSurface> = HeadlessHost::new(800.0, 600.0, 1.0);
        host.set_natural_size(Some(ImageFrame::new(400, 300)));
        let mut session = OverlaySession::new(host, OverlayRenderer::default());

        let ticket = session.begin_detection().unwrap();
        let cat = DetectResponse::from_str(CAT).unwrap().into_detection_set().unwrap();
        let outcome = session.finish_detection(ticket, Ok(cat)).unwrap();
        assert_eq!(outcome, Some(RenderOutcome::SurfaceUnavailable));

        session.host_mut().mount(RecordingSurface::new(LabelFont::Bitmap));
        session.host_mut().resize(640.0, 480.0);
        let outcomes = session.pump();
        assert_eq!(outcomes[0].painted().len(), 1);
    }

    #[test]
    fn test_clear_image_empties_overlay() {
        let mut session = recording_session(ImageFrame::new(400, 300));
        let ticket = session.begin_detection().unwrap();
        let cat = DetectResponse::from_str(CAT).unwrap().into_detection_set().unwrap();
        session.finish_detection(ticket, Ok(cat)).unwrap();

        session.host_mut().set_natural_size(None);
        let outcomes = session.pump();

        assert_eq!(outcomes, vec![RenderOutcome::Cleared]);
        assert!(session.snapshot().frame().is_none());
        assert!(session.host().surface().unwrap().commands().is_empty());
    }

    #[test]
    fn test_result_for_replaced_image_is_dropped() {
        let mut session = recording_session(ImageFrame::new(400, 300));
        let ticket = session.begin_detection().unwrap();

        session.host_mut().set_natural_size(Some(ImageFrame::new(640, 480)));
        let cat = DetectResponse::from_str(CAT).unwrap().into_detection_set().unwrap();

        assert!(session.finish_detection(ticket, Ok(cat)).unwrap().is_none());
        assert!(session.snapshot().frame().is_none());
    }

    #[test]
    fn test_stale_image_event_keeps_newer_results() {
        let mut session = recording_session(ImageFrame::new(400, 300));
        session.host_mut().set_natural_size(Some(ImageFrame::new(640, 480)));

        // Results for the new image land before the queued event is handled
        let ticket = session.begin_detection().unwrap();
        let cat = DetectResponse::from_str(CAT).unwrap().into_detection_set().unwrap();
        session.finish_detection(ticket, Ok(cat)).unwrap();

        let outcomes = session.pump();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].painted().len(), 1);
        assert_eq!(session.snapshot().frame(), Some(&ImageFrame::new(640, 480)));
    }

    #[test]
    fn test_resize_with_raster_keeps_pixels() {
        let mut host = HeadlessHost::new(800.0, 600.0, 1.0);
        host.set_natural_size(Some(ImageFrame::new(400, 300)));
        host.mount(RasterSurface::new(LabelFont::Bitmap));
        let mut session = OverlaySession::new(host, OverlayRenderer::default());

        let ticket = session.begin_detection().unwrap();
        let set = DetectionSet::new(vec![Detection::new("cat", 0.97, BoundingBox::new(0.1, 0.2, 0.5, 0.6))]);
        session.finish_detection(ticket, Ok(set)).unwrap();
        let large = session.host().surface().unwrap().pixels().clone();

        session.host_mut().resize(400.0, 300.0);
        session.pump();

        assert_eq!(session.host().surface().unwrap().pixels().as_raw(), large.as_raw());
    }

    #[test]
    fn test_session_releases_host_subscription() {
        let session = recording_session(ImageFrame::new(10, 10));
        assert_eq!(session.host().listener_count(), 1);

        let host = session.into_host();
        assert_eq!(host.listener_count(), 0);
    }
}
