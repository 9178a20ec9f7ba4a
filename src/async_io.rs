//! Transfers between a ring buffer and asynchronous streams.
//!
//! Each transfer suspends only at stream I/O.  Cancellation is observed before every chunk and
//! while waiting on the stream.  A cancelled, failed, or dropped transfer publishes the bytes it
//! actually moved, so the direction is always released.

use crate::{
    error::{Error, Result},
    reservation::{PutReservation, TakeReservation},
    ConcurrentRingBuffer,
};
use core::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use futures::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use pin_project::pin_project;
use std::io::ErrorKind;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Future that resolves to `None` if its token is cancelled before `io` completes.
#[pin_project]
struct Cancellable<'a, F> {
    #[pin]
    cancelled: WaitForCancellationFuture<'a>,
    #[pin]
    io: F,
}

impl<'a, F> Cancellable<'a, F> {
    fn new(token: &'a CancellationToken, io: F) -> Self {
        Self {
            cancelled: token.cancelled(),
            io,
        }
    }
}

impl<F: Future> Future for Cancellable<'_, F> {
    type Output = Option<F::Output>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        let pinned = self.project();
        if pinned.cancelled.poll(cx).is_ready() {
            return Poll::Ready(None);
        }
        pinned.io.poll(cx).map(Some)
    }
}

/// Outcome of filling a put reservation from an asynchronous source.
enum Fill {
    Complete,
    EndOfInput,
    Cancelled,
}

async fn fill<R>(
    reservation: &mut PutReservation<'_>,
    source: &mut R,
    token: &CancellationToken,
) -> Result<Fill>
where
    R: AsyncRead + Unpin + ?Sized,
{
    while reservation.remaining() > 0 {
        if token.is_cancelled() {
            return Ok(Fill::Cancelled);
        }
        match Cancellable::new(token, source.read(reservation.chunk_mut())).await {
            None => return Ok(Fill::Cancelled),
            Some(Ok(0)) => return Ok(Fill::EndOfInput),
            Some(Ok(read)) => reservation.advance(read),
            Some(Err(e)) if e.kind() == ErrorKind::Interrupted => {}
            Some(Err(e)) => {
                tracing::warn!(
                    transferred = reservation.transferred(),
                    error = %e,
                    "put interrupted by source error"
                );
                return Err(e.into());
            }
        }
    }
    Ok(Fill::Complete)
}

impl ConcurrentRingBuffer {
    /// Asynchronously reads up to `count` bytes from `source` into the buffer.
    ///
    /// Stops early at the end of input or when `token` is cancelled, returning the number of
    /// bytes stored.
    pub async fn put_from_async<R>(
        &self,
        source: &mut R,
        count: usize,
        token: &CancellationToken,
    ) -> Result<usize>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut reservation = PutReservation::allocate(self, count)?;
        if let Fill::Cancelled = fill(&mut reservation, source, token).await? {
            tracing::warn!(
                expected = count,
                transferred = reservation.transferred(),
                "put cancelled"
            );
        }
        Ok(reservation.publish())
    }

    /// Asynchronously reads exactly `count` bytes from `source` into the buffer.
    ///
    /// Fails with [`Error::UnexpectedEndOfInput`] if `source` ends first, or with
    /// [`Error::Cancelled`] if `token` is cancelled first.  Either way the bytes that were read
    /// are kept.
    pub async fn put_exactly_from_async<R>(
        &self,
        source: &mut R,
        count: usize,
        token: &CancellationToken,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut reservation = PutReservation::allocate(self, count)?;
        let outcome = fill(&mut reservation, source, token).await?;
        let transferred = reservation.publish();
        match outcome {
            Fill::Complete => Ok(()),
            Fill::EndOfInput => {
                tracing::warn!(
                    expected = count,
                    transferred,
                    "source ended before exact put completed"
                );
                Err(Error::UnexpectedEndOfInput {
                    expected: count,
                    transferred,
                })
            }
            Fill::Cancelled => {
                tracing::warn!(expected = count, transferred, "exact put cancelled");
                Err(Error::Cancelled { transferred })
            }
        }
    }

    /// Asynchronously removes the oldest `count` bytes and writes them to `destination`.
    ///
    /// Fails with [`Error::Cancelled`] if `token` is cancelled first.  The bytes accepted by
    /// `destination` are removed regardless of how the transfer ends.
    pub async fn take_to_async<W>(
        &self,
        destination: &mut W,
        count: usize,
        token: &CancellationToken,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut reservation = TakeReservation::allocate(self, count)?;
        while reservation.remaining() > 0 {
            if token.is_cancelled() {
                break;
            }
            match Cancellable::new(token, destination.write(reservation.chunk())).await {
                None => break,
                Some(Ok(0)) => {
                    tracing::warn!(
                        transferred = reservation.transferred(),
                        "destination stopped accepting data"
                    );
                    return Err(std::io::Error::from(ErrorKind::WriteZero).into());
                }
                Some(Ok(written)) => reservation.advance(written),
                Some(Err(e)) if e.kind() == ErrorKind::Interrupted => {}
                Some(Err(e)) => {
                    tracing::warn!(
                        transferred = reservation.transferred(),
                        error = %e,
                        "take interrupted by destination error"
                    );
                    return Err(e.into());
                }
            }
        }

        let cancelled = reservation.remaining() > 0;
        let transferred = reservation.publish();
        if cancelled {
            tracing::warn!(expected = count, transferred, "take cancelled");
            return Err(Error::Cancelled { transferred });
        }
        Ok(())
    }
}
