/// Host surface provider
///
/// The host owns the displayed image and the overlay surface stacked on top
/// of it. It reports the image's natural and displayed sizes, the device pixel
/// ratio, and notifies subscribers when the display geometry changes.
use log::debug;

use crate::detection::ImageFrame;
use crate::subscription::{ListenerRegistry, Subscription};
use crate::surface::Surface;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    /// Displayed (CSS) size of the image changed
    Resized { width: f32, height: f32 },
    /// Device pixel ratio changed (monitor switch, zoom)
    ScaleFactorChanged(f32),
    /// A different image was loaded, or it was removed (`None`)
    ImageChanged(Option<ImageFrame>),
}

pub trait SurfaceProvider {
    /// Natural size of the loaded image, if any
    fn natural_size(&self) -> Option<ImageFrame>;

    /// Current on-screen size of the image in CSS pixels
    fn displayed_size(&self) -> (f32, f32);

    fn device_pixel_ratio(&self) -> f32;

    /// Drawing surface, or `None` while it is not mounted
    fn surface_mut(&mut self) -> Option<&mut dyn Surface>;

    /// Register for resize/density notifications; the guard unregisters on drop
    fn subscribe(&self, listener: Box<dyn FnMut(&HostEvent)>) -> Subscription;
}

/// In-memory host used by the CLI and tests
pub struct HeadlessHost<S: Surface> {
    natural: Option<ImageFrame>,
    displayed: (f32, f32),
    device_pixel_ratio: f32,
    surface: Option<S>,
    listeners: ListenerRegistry<HostEvent>,
}

impl<S: Surface> HeadlessHost<S> {
    pub fn new(displayed_width: f32, displayed_height: f32, device_pixel_ratio: f32) -> Self {
        Self {
            natural: None,
            displayed: (displayed_width, displayed_height),
            device_pixel_ratio,
            surface: None,
            listeners: ListenerRegistry::new(),
        }
    }

    /// Attach the overlay surface
    pub fn mount(&mut self, surface: S) {
        self.surface = Some(surface);
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    /// Load (or remove) the displayed image; notifies only when it actually changes
    pub fn set_natural_size(&mut self, frame: Option<ImageFrame>) -> bool {
        if self.natural == frame {
            return false;
        }
        debug!("Host image changed: {:?} -> {:?}", self.natural, frame);
        self.natural = frame;
        self.listeners.emit(&HostEvent::ImageChanged(frame));
        true
    }

    /// Change the displayed size; notifies only when it actually changes
    pub fn resize(&mut self, width: f32, height: f32) -> bool {
        if self.displayed == (width, height) {
            return false;
        }
        debug!(
            "Host resized: {}x{} -> {}x{}",
            self.displayed.0, self.displayed.1, width, height
        );
        self.displayed = (width, height);
        self.listeners.emit(&HostEvent::Resized { width, height });
        true
    }

    /// Change the device pixel ratio; notifies only when it actually changes
    pub fn set_device_pixel_ratio(&mut self, ratio: f32) -> bool {
        if self.device_pixel_ratio == ratio {
            return false;
        }
        debug!("Device pixel ratio changed: {} -> {}", self.device_pixel_ratio, ratio);
        self.device_pixel_ratio = ratio;
        self.listeners.emit(&HostEvent::ScaleFactorChanged(ratio));
        true
    }

    #[cfg(test)]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl<S: Surface> SurfaceProvider for HeadlessHost<S> {
    fn natural_size(&self) -> Option<ImageFrame> {
        self.natural
    }

    fn displayed_size(&self) -> (f32, f32) {
        self.displayed
    }

    fn device_pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio
    }

    fn surface_mut(&mut self) -> Option<&mut dyn Surface> {
        self.surface.as_mut().map(|s| s as &mut dyn Surface)
    }

    fn subscribe(&self, listener: Box<dyn FnMut(&HostEvent)>) -> Subscription {
        self.listeners.subscribe(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use crate::font::LabelFont;
    use crate::surface::recording::RecordingSurface;

    fn recording_host() -> HeadlessHost<RecordingSurface> {
        HeadlessHost::new(800.0, 600.0, 1.0)
    }

    #[test]
    fn test_events_only_on_change() {
        let mut host = recording_host();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        let _sub = host.subscribe(Box::new(move |e: &HostEvent| sink.borrow_mut().push(*e)));

        assert!(!host.resize(800.0, 600.0));
        assert!(host.resize(400.0, 300.0));
        assert!(!host.set_device_pixel_ratio(1.0));
        assert!(host.set_device_pixel_ratio(2.0));
        assert!(host.set_natural_size(Some(ImageFrame::new(40, 30))));
        assert!(!host.set_natural_size(Some(ImageFrame::new(40, 30))));

        assert_eq!(
            *events.borrow(),
            vec![
                HostEvent::Resized { width: 400.0, height: 300.0 },
                HostEvent::ScaleFactorChanged(2.0),
                HostEvent::ImageChanged(Some(ImageFrame::new(40, 30))),
            ]
        );
        assert_eq!(host.displayed_size(), (400.0, 300.0));
        assert_eq!(host.device_pixel_ratio(), 2.0);
    }

    #[test]
    fn test_surface_mount() {
        let mut host = recording_host();
        assert!(host.surface_mut().is_none());
        assert!(host.surface().is_none());

        host.mount(RecordingSurface::new(LabelFont::Bitmap));
        assert!(host.surface_mut().is_some());
    }

    #[test]
    fn test_subscription_released_on_drop() {
        let host = recording_host();
        let sub = host.subscribe(Box::new(|_: &HostEvent| {}));
        assert_eq!(host.listener_count(), 1);
        drop(sub);
        assert_eq!(host.listener_count(), 0);
    }
}
