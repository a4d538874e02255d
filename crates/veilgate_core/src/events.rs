use std::fmt;
use std::sync::mpsc;

/// Producer half of a frame event queue. Cloned into every publisher.
pub struct EventSender<T> {
    tx: mpsc::Sender<T>,
}

/// Consumer half. Events are drained once per frame by the host.
pub struct EventReceiver<T> {
    rx: mpsc::Receiver<T>,
}

pub fn channel<T>() -> (EventSender<T>, EventReceiver<T>) {
    let (tx, rx) = mpsc::channel();
    (EventSender { tx }, EventReceiver { rx })
}

impl<T> Clone for EventSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> fmt::Debug for EventSender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSender").finish_non_exhaustive()
    }
}

impl<T> EventSender<T> {
    /// Returns false when nobody listens anymore. Publishers never treat that as an error.
    pub fn publish(&self, event: T) -> bool {
        self.tx.send(event).is_ok()
    }
}

impl<T> EventReceiver<T> {
    pub fn try_recv(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Everything published since the last drain, in publish order.
    pub fn drain(&self) -> Vec<T> {
        self.rx.try_iter().collect()
    }
}
