//! Two-image display that alternates between a front and back sprite

use crate::handles::HandleRegistry;
use crate::types::ImageSource;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

pub const DEFAULT_ROTATE_INTERVAL: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Face {
    Front,
    Back,
}

impl Face {
    pub fn flip(self) -> Self {
        match self {
            Face::Front => Face::Back,
            Face::Back => Face::Front,
        }
    }

    fn index(self) -> usize {
        match self {
            Face::Front => 0,
            Face::Back => 1,
        }
    }
}

/// An image source that is either ready now or still resolving
pub enum SpriteInput {
    Ready(ImageSource),
    Pending(BoxFuture<'static, ImageSource>),
}

impl SpriteInput {
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = ImageSource> + Send + 'static,
    {
        SpriteInput::Pending(future.boxed())
    }
}

impl From<ImageSource> for SpriteInput {
    fn from(source: ImageSource) -> Self {
        SpriteInput::Ready(source)
    }
}

/// One image element in the rendered output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    pub face: Face,
    /// `None` while the input is still resolving
    pub src: Option<ImageSource>,
    pub visible: bool,
}

/// Both layers are always present; only visibility changes between ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub front: Layer,
    pub back: Layer,
}

#[derive(Default)]
struct Slot {
    source: Option<ImageSource>,
    /// Bumped on every input change so late resolutions can be discarded
    generation: u64,
    resolver: Option<JoinHandle<()>>,
}

type Slots = Arc<Mutex<[Slot; 2]>>;

fn lock(slots: &Slots) -> MutexGuard<'_, [Slot; 2]> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Revoke `source` if it is an object handle
fn release(handles: &HandleRegistry, source: Option<ImageSource>) {
    if let Some(ImageSource::Object(handle)) = source {
        handles.revoke(handle);
    }
}

/// Store `source` in the slot, releasing whatever it replaces
fn replace_source(handles: &HandleRegistry, slot: &mut Slot, source: ImageSource) {
    if slot.source.as_ref() == Some(&source) {
        return;
    }
    let old = slot.source.replace(source);
    release(handles, old);
}

/// Alternates between a front and back image on a fixed interval
///
/// Object handles given to the display are owned by it: they are revoked
/// when replaced and on teardown. Plain URLs are never released. Dropping
/// the display stops the timer and abandons any pending resolution.
pub struct RotatingDisplay {
    face: watch::Receiver<Face>,
    ticker: JoinHandle<()>,
    slots: Slots,
    handles: Arc<HandleRegistry>,
}

impl RotatingDisplay {
    /// Mount with the default three second interval
    pub fn mount(
        front: impl Into<SpriteInput>,
        back: impl Into<SpriteInput>,
        handles: Arc<HandleRegistry>,
    ) -> Self {
        Self::mount_with_interval(front, back, handles, DEFAULT_ROTATE_INTERVAL)
    }

    pub fn mount_with_interval(
        front: impl Into<SpriteInput>,
        back: impl Into<SpriteInput>,
        handles: Arc<HandleRegistry>,
        interval: Duration,
    ) -> Self {
        let (tx, rx) = watch::channel(Face::Front);
        let ticker = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                tx.send_modify(|face| *face = face.flip());
            }
        });

        let display = Self {
            face: rx,
            ticker,
            slots: Arc::new(Mutex::new(Default::default())),
            handles,
        };
        display.set(Face::Front, front.into());
        display.set(Face::Back, back.into());
        display
    }

    pub fn face(&self) -> Face {
        *self.face.borrow()
    }

    /// Watch visibility changes
    pub fn subscribe(&self) -> watch::Receiver<Face> {
        self.face.clone()
    }

    pub fn set_front(&self, input: impl Into<SpriteInput>) {
        self.set(Face::Front, input.into());
    }

    pub fn set_back(&self, input: impl Into<SpriteInput>) {
        self.set(Face::Back, input.into());
    }

    fn set(&self, face: Face, input: SpriteInput) {
        let mut slots = lock(&self.slots);
        let slot = &mut slots[face.index()];
        slot.generation += 1;
        if let Some(task) = slot.resolver.take() {
            task.abort();
        }

        match input {
            SpriteInput::Ready(source) => replace_source(&self.handles, slot, source),
            SpriteInput::Pending(future) => {
                let generation = slot.generation;
                let shared = self.slots.clone();
                let handles = self.handles.clone();
                slot.resolver = Some(tokio::spawn(async move {
                    let source = future.await;
                    let mut slots = lock(&shared);
                    let slot = &mut slots[face.index()];
                    if slot.generation != generation {
                        debug!(?face, "Discarding stale sprite resolution");
                        release(&handles, Some(source));
                        return;
                    }
                    replace_source(&handles, slot, source);
                    slot.resolver = None;
                }));
            }
        }
    }

    pub fn render(&self) -> Frame {
        let face = self.face();
        let slots = lock(&self.slots);
        Frame {
            front: Layer {
                face: Face::Front,
                src: slots[0].source.clone(),
                visible: face == Face::Front,
            },
            back: Layer {
                face: Face::Back,
                src: slots[1].source.clone(),
                visible: face == Face::Back,
            },
        }
    }

    /// Tear the display down
    pub fn unmount(self) {
        drop(self);
    }
}

impl Drop for RotatingDisplay {
    fn drop(&mut self) {
        self.ticker.abort();
        let mut slots = lock(&self.slots);
        for slot in slots.iter_mut() {
            slot.generation += 1;
            if let Some(task) = slot.resolver.take() {
                task.abort();
            }
            release(&self.handles, slot.source.take());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CacheEntry;
    use tokio::sync::oneshot;
    use tokio::time::sleep;

    fn registry() -> Arc<HandleRegistry> {
        Arc::new(HandleRegistry::new(8))
    }

    fn object(handles: &HandleRegistry) -> ImageSource {
        let entry = Arc::new(CacheEntry::new(b"GIF89a".to_vec(), "image/gif"));
        ImageSource::Object(handles.mint(entry).unwrap())
    }

    fn url(s: &str) -> ImageSource {
        ImageSource::Url(s.to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggles_every_interval() {
        let handles = registry();
        let display = RotatingDisplay::mount(url("front.png"), url("back.png"), handles);

        assert_eq!(display.face(), Face::Front);
        sleep(Duration::from_millis(2999)).await;
        assert_eq!(display.face(), Face::Front);

        sleep(Duration::from_millis(2)).await;
        assert_eq!(display.face(), Face::Back);

        sleep(Duration::from_millis(3000)).await;
        assert_eq!(display.face(), Face::Front);
    }

    #[tokio::test(start_paused = true)]
    async fn test_both_layers_always_rendered() {
        let handles = registry();
        let display = RotatingDisplay::mount(url("front.png"), url("back.png"), handles);

        for _ in 0..4 {
            let frame = display.render();
            assert_eq!(frame.front.src, Some(url("front.png")));
            assert_eq!(frame.back.src, Some(url("back.png")));
            assert_ne!(frame.front.visible, frame.back.visible);
            sleep(DEFAULT_ROTATE_INTERVAL).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_toggles_after_teardown() {
        let handles = registry();
        let display = RotatingDisplay::mount(url("front.png"), url("back.png"), handles);
        let rx = display.subscribe();

        sleep(Duration::from_millis(3500)).await;
        assert_eq!(*rx.borrow(), Face::Back);

        display.unmount();
        sleep(Duration::from_secs(10)).await;
        assert_eq!(*rx.borrow(), Face::Back);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_releases_only_owned_handles() {
        let handles = registry();
        let unrelated = object(&handles);
        let front = object(&handles);
        assert_eq!(handles.live_count(), 2);

        let display = RotatingDisplay::mount(
            front.clone(),
            url("https://example.com/back.png"),
            handles.clone(),
        );
        display.unmount();

        assert!(!handles.is_live(front.object_url().unwrap()));
        assert!(handles.is_live(unrelated.object_url().unwrap()));
        assert_eq!(handles.live_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_input_resolves() {
        let handles = registry();
        let (tx, rx) = oneshot::channel::<ImageSource>();
        let display = RotatingDisplay::mount(
            SpriteInput::pending(async move { rx.await.unwrap_or_else(|_| url("")) }),
            url("back.png"),
            handles,
        );

        assert_eq!(display.render().front.src, None);

        tx.send(url("front.png")).unwrap();
        sleep(Duration::from_millis(1)).await;
        assert_eq!(display.render().front.src, Some(url("front.png")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_changed_input_releases_previous_handle() {
        let handles = registry();
        let first = object(&handles);
        let display = RotatingDisplay::mount(first.clone(), url("back.png"), handles.clone());

        // Same identity: nothing released
        display.set_front(first.clone());
        assert!(handles.is_live(first.object_url().unwrap()));

        let second = object(&handles);
        display.set_front(second.clone());
        assert!(!handles.is_live(first.object_url().unwrap()));
        assert_eq!(display.render().front.src, Some(second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_resolution_is_discarded() {
        let handles = registry();
        let slow_handles = handles.clone();
        let display = RotatingDisplay::mount(url("front.png"), url("back.png"), handles.clone());

        display.set_front(SpriteInput::pending(async move {
            sleep(Duration::from_secs(5)).await;
            object(&slow_handles)
        }));
        display.set_front(url("newer.png"));

        sleep(Duration::from_secs(10)).await;
        assert_eq!(display.render().front.src, Some(url("newer.png")));
        assert_eq!(handles.live_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_abandons_pending_resolution() {
        let handles = registry();
        let slow_handles = handles.clone();
        let display = RotatingDisplay::mount(
            SpriteInput::pending(async move {
                sleep(Duration::from_secs(5)).await;
                object(&slow_handles)
            }),
            url("back.png"),
            handles.clone(),
        );

        sleep(Duration::from_secs(1)).await;
        display.unmount();
        sleep(Duration::from_secs(10)).await;

        assert_eq!(handles.live_count(), 0);
    }
}
