use tokio::sync::watch;

/// Handle used to request cancellation of one or more calls.
///
/// Hand out `signal()` to each call that should observe it.
#[derive(Clone, Debug)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    /// Creates a handle in the not-aborted state.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Returns a signal bound to this handle.
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Requests cancellation.
    ///
    /// Streams observe it before their next read and end with
    /// `ClientError::Cancelled`.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    /// Whether `abort` has been called.
    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for AbortHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Read side of an `AbortHandle`, attached to a call.
#[derive(Clone, Debug)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    /// Whether the owning handle has requested cancellation.
    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }
}
