use super::{InputEvent, InputSource};
use crate::error::Result;
use crossbeam_channel::{bounded, select, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Last known pointer position, kept current by a background subscription.
/// Used where a position must be read on demand, e.g. when adding a marker.
pub struct PointerTracker {
    position: Arc<Mutex<Option<(f64, f64)>>>,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PointerTracker {
    pub fn start(source: &dyn InputSource) -> Result<Self> {
        let sub = source.subscribe()?;
        let position = Arc::new(Mutex::new(None));
        let (stop_tx, stop_rx) = bounded::<()>(0);

        let pos = position.clone();
        let handle = thread::Builder::new()
            .name("pointer-tracker".to_string())
            .spawn(move || loop {
                select! {
                    recv(sub.receiver()) -> msg => match msg {
                        Ok(InputEvent::PointerMoved { x, y }) => *pos.lock() = Some((x, y)),
                        Ok(_) => {}
                        Err(_) => break,
                    },
                    recv(stop_rx) -> _ => break,
                }
            })?;

        Ok(Self {
            position,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Rounded to whole pixels; `None` until the pointer has moved once
    pub fn position(&self) -> Option<(i32, i32)> {
        self.position
            .lock()
            .map(|(x, y)| (x.round() as i32, y.round() as i32))
    }

    pub fn stop(&mut self) {
        // Dropping the sender disconnects the stop channel
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PointerTracker {
    fn drop(&mut self) {
        self.stop();
    }
}
