//! Completion callbacks and cancellation for in-flight operations
use std::io as std_io;

use futures::sync::oneshot;
use futures::{Async, Future, Poll};

/// Future calling `callback` exactly once with the result of `inner`
///
/// It resolves to `()` so it can be spawned directly onto an executor.
pub struct Completion<F, C> {
    inner: F,
    callback: Option<C>,
}

impl<F, C> Completion<F, C>
where
    F: Future,
    C: FnOnce(Result<F::Item, F::Error>),
{
    pub fn new(inner: F, callback: C) -> Self {
        Completion {
            inner,
            callback: Some(callback),
        }
    }
}

impl<F, C> Future for Completion<F, C>
where
    F: Future,
    C: FnOnce(Result<F::Item, F::Error>),
{
    type Item = ();
    type Error = ();

    fn poll(&mut self) -> Poll<Self::Item, Self::Error> {
        let result = match self.inner.poll() {
            Ok(Async::NotReady) => return Ok(Async::NotReady),
            Ok(Async::Ready(item)) => Ok(item),
            Err(err) => Err(err),
        };

        let callback = self
            .callback
            .take()
            .expect("[BUG] poll after completion");
        callback(result);
        Ok(Async::Ready(()))
    }
}

/// creates a future which can be aborted through the returned handle
///
/// Aborting makes the future resolve to a `ConnectionAborted` error and
/// drops `inner` (and with it the connection it owns) once the future is
/// dropped.
pub fn abortable<F>(inner: F) -> (Abortable<F>, AbortHandle)
where
    F: Future<Error = std_io::Error>,
{
    let (sender, receiver) = oneshot::channel();
    let fut = Abortable {
        inner,
        abort: Some(receiver),
    };
    (fut, AbortHandle { sender })
}

/// Future returned by `abortable`
pub struct Abortable<F> {
    inner: F,
    abort: Option<oneshot::Receiver<()>>,
}

impl<F> Future for Abortable<F>
where
    F: Future<Error = std_io::Error>,
{
    type Item = F::Item;
    type Error = std_io::Error;

    fn poll(&mut self) -> Poll<Self::Item, Self::Error> {
        let aborted = match self.abort.as_mut().map(|receiver| receiver.poll()) {
            Some(Ok(Async::Ready(()))) => true,
            Some(Ok(Async::NotReady)) | None => false,
            // handle dropped, can no longer be aborted
            Some(Err(oneshot::Canceled)) => {
                self.abort = None;
                false
            }
        };

        if aborted {
            return Err(std_io::Error::new(
                std_io::ErrorKind::ConnectionAborted,
                "operation was aborted",
            ));
        }

        self.inner.poll()
    }
}

/// Handle to abort a `Abortable` future
#[derive(Debug)]
pub struct AbortHandle {
    sender: oneshot::Sender<()>,
}

impl AbortHandle {
    pub fn abort(self) {
        // the future might already be done and dropped
        let _ = self.sender.send(());
    }
}
