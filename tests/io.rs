use futures::FutureExt;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use ringbyte::{CancellationToken, ConcurrentRingBuffer, Error};
use std::{
    hash::{Hash, Hasher},
    io::{Cursor, Read},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

/// A source that returns at most `limit` bytes per read.
struct Trickle<'a> {
    data: &'a [u8],
    limit: usize,
}

impl Read for Trickle<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let len = buf.len().min(self.limit).min(self.data.len());
        buf[..len].copy_from_slice(&self.data[..len]);
        self.data = &self.data[len..];
        Ok(len)
    }
}

#[test]
fn put_from_short_reads() {
    let ring = ConcurrentRingBuffer::new(10, None, false).unwrap();
    ring.put(&[0; 7]).unwrap();
    ring.skip(7).unwrap();

    let data: Vec<u8> = (1..=9).collect();
    let mut source = Trickle {
        data: &data,
        limit: 2,
    };
    assert_eq!(ring.put_from(&mut source, 9).unwrap(), 9);
    assert_eq!(ring.to_array().unwrap(), data);
}

#[test]
fn put_from_stops_at_end_of_input() {
    let ring = ConcurrentRingBuffer::new(8, None, false).unwrap();
    let mut source = Cursor::new(vec![1u8, 2, 3]);
    assert_eq!(ring.put_from(&mut source, 6).unwrap(), 3);
    assert_eq!(ring.current_length(), 3);
    assert_eq!(ring.spare_length(), 5);

    // The unused part of the reservation was released
    ring.put(&[4, 5, 6, 7, 8]).unwrap();
    assert_eq!(ring.to_array().unwrap(), [1, 2, 3, 4, 5, 6, 7, 8]);
}

#[test]
fn put_exactly_from_end_of_input() {
    let ring = ConcurrentRingBuffer::new(8, None, false).unwrap();
    let mut source = Cursor::new(vec![1u8, 2]);
    let error = ring.put_exactly_from(&mut source, 4).unwrap_err();
    assert!(matches!(
        error,
        Error::UnexpectedEndOfInput {
            expected: 4,
            transferred: 2
        }
    ));
    assert_eq!(error.transferred(), 2);
    assert_eq!(ring.to_array().unwrap(), [1, 2]);
}

#[test]
fn stream_put_larger_than_capacity() {
    let ring = ConcurrentRingBuffer::new(4, None, true).unwrap();
    let mut source = Cursor::new(vec![0u8; 5]);
    assert!(matches!(
        ring.put_from(&mut source, 5),
        Err(Error::CapacityExceeded { .. })
    ));
    assert_eq!(source.position(), 0);
}

/// A source that fails after producing some bytes.
struct Failing(usize);

impl Read for Failing {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.0 == 0 {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "broken"));
        }
        let len = buf.len().min(self.0);
        buf[..len].fill(1);
        self.0 -= len;
        Ok(len)
    }
}

#[test]
fn source_error_publishes_partial_put() {
    let ring = ConcurrentRingBuffer::new(8, None, false).unwrap();
    assert!(matches!(
        ring.put_from(&mut Failing(3), 6),
        Err(Error::Io(_))
    ));
    assert_eq!(ring.current_length(), 3);
    ring.put(&[2; 5]).unwrap();
    assert_eq!(ring.to_array().unwrap(), [1, 1, 1, 2, 2, 2, 2, 2]);
}

#[test]
fn take_to_wrapped() {
    let ring = ConcurrentRingBuffer::new(6, None, false).unwrap();
    ring.put(&[0; 4]).unwrap();
    ring.skip(4).unwrap();
    ring.put(&[1, 2, 3, 4, 5]).unwrap();

    let mut destination: Vec<u8> = Vec::new();
    ring.take_to(&mut destination, 4).unwrap();
    assert_eq!(destination, [1, 2, 3, 4]);
    assert_eq!(ring.take_byte().unwrap(), 5);
}

#[test]
fn take_to_write_zero() {
    let ring = ConcurrentRingBuffer::new(6, Some(&[1, 2, 3]), false).unwrap();
    let mut storage = [0u8; 2];
    let mut destination = Cursor::new(&mut storage[..]);
    match ring.take_to(&mut destination, 3) {
        Err(Error::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::WriteZero),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(storage, [1, 2]);
    assert_eq!(ring.to_array().unwrap(), [3]);
}

#[test]
fn sync_stream_threads() {
    use std::io::Write;

    let ring = ConcurrentRingBuffer::new(4096, None, false).unwrap();
    let mut rng = SmallRng::from_entropy();
    let values: Vec<u8> = (0..1_000_000).map(|_| rng.gen()).collect();

    let received = std::thread::scope(|scope| {
        scope.spawn(|| {
            let mut source = values.as_slice();
            while !source.is_empty() {
                let count = source.len().min(ring.spare_length());
                ring.put_exactly_from(&mut source, count).unwrap();
            }
        });
        let reader = scope.spawn(|| {
            let mut received: Vec<u8> = Vec::new();
            while received.len() < values.len() {
                let count = ring.current_length();
                ring.take_to(&mut received, count).unwrap();
            }
            received.flush().unwrap();
            received
        });
        reader.join().unwrap()
    });

    let mut sent_hash = seahash::SeaHasher::new();
    values.hash(&mut sent_hash);
    let mut received_hash = seahash::SeaHasher::new();
    received.hash(&mut received_hash);
    assert_eq!(sent_hash.finish(), received_hash.finish());
}

#[tokio::test]
async fn async_put_and_take() {
    let ring = ConcurrentRingBuffer::new(8, None, false).unwrap();
    let token = CancellationToken::new();

    let mut source = futures::io::Cursor::new(vec![1u8, 2, 3, 4, 5, 6]);
    ring.put_exactly_from_async(&mut source, 6, &token)
        .await
        .unwrap();
    ring.skip(4).unwrap();

    // Wraps around the end of storage
    let mut source: &[u8] = &[7, 8, 9, 10, 11];
    assert_eq!(
        ring.put_from_async(&mut source, 5, &token).await.unwrap(),
        5
    );

    let mut destination: Vec<u8> = Vec::new();
    ring.take_to_async(&mut destination, 7, &token)
        .await
        .unwrap();
    assert_eq!(destination, [5, 6, 7, 8, 9, 10, 11]);
    assert!(ring.is_empty());
}

#[tokio::test]
async fn async_put_exactly_end_of_input() {
    let ring = ConcurrentRingBuffer::new(8, None, false).unwrap();
    let token = CancellationToken::new();
    let mut source: &[u8] = &[1, 2, 3];
    assert!(matches!(
        ring.put_exactly_from_async(&mut source, 5, &token).await,
        Err(Error::UnexpectedEndOfInput {
            expected: 5,
            transferred: 3
        })
    ));
    assert_eq!(ring.current_length(), 3);
}

/// An asynchronous source that yields its data, then never completes another read.
///
/// If it holds a token, the token is cancelled on the first stalled read.
struct Stalling {
    data: Vec<u8>,
    token: Option<CancellationToken>,
}

impl futures::io::AsyncRead for Stalling {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<std::io::Result<usize>> {
        if self.data.is_empty() {
            if let Some(token) = self.token.take() {
                token.cancel();
            }
            return Poll::Pending;
        }
        let len = buf.len().min(self.data.len());
        buf[..len].copy_from_slice(&self.data[..len]);
        self.data = self.data.split_off(len);
        Poll::Ready(Ok(len))
    }
}

#[tokio::test]
async fn cancelled_exact_put_releases_direction() {
    let ring = ConcurrentRingBuffer::new(8, None, false).unwrap();
    let token = CancellationToken::new();
    let mut source = Stalling {
        data: vec![1, 2, 3],
        token: Some(token.clone()),
    };

    let error = ring
        .put_exactly_from_async(&mut source, 6, &token)
        .await
        .unwrap_err();
    assert!(matches!(error, Error::Cancelled { transferred: 3 }));
    assert_eq!(error.transferred(), 3);
    assert_eq!(ring.current_length(), 3);

    ring.put(&[4]).unwrap();
    assert_eq!(ring.to_array().unwrap(), [1, 2, 3, 4]);
}

#[tokio::test]
async fn cancelled_best_effort_put_returns_count() {
    let ring = ConcurrentRingBuffer::new(8, None, false).unwrap();
    let token = CancellationToken::new();
    let mut source = Stalling {
        data: vec![1, 2],
        token: Some(token.clone()),
    };

    assert_eq!(
        ring.put_from_async(&mut source, 6, &token).await.unwrap(),
        2
    );
    assert_eq!(ring.to_array().unwrap(), [1, 2]);
}

#[test]
fn dropped_put_future_publishes_partial() {
    let ring = ConcurrentRingBuffer::new(8, None, false).unwrap();
    let token = CancellationToken::new();
    let mut source = Stalling {
        data: vec![1, 2, 3],
        token: None,
    };

    let pending = ring
        .put_exactly_from_async(&mut source, 6, &token)
        .now_or_never();
    assert!(pending.is_none());

    assert_eq!(ring.current_length(), 3);
    ring.put(&[4, 5]).unwrap();
    assert_eq!(ring.to_array().unwrap(), [1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn cancelled_take_keeps_content() {
    let ring = ConcurrentRingBuffer::new(8, Some(&[1, 2, 3]), false).unwrap();
    let token = CancellationToken::new();
    token.cancel();

    let mut destination: Vec<u8> = Vec::new();
    assert!(matches!(
        ring.take_to_async(&mut destination, 2, &token).await,
        Err(Error::Cancelled { transferred: 0 })
    ));
    assert!(destination.is_empty());
    assert_eq!(ring.take_vec(3).unwrap(), [1, 2, 3]);
}

/// An asynchronous destination that accepts `accept` bytes, then never completes another write.
///
/// If it holds a token, the token is cancelled on the first stalled write.
struct StallingSink {
    accept: usize,
    written: Vec<u8>,
    token: Option<CancellationToken>,
}

impl futures::io::AsyncWrite for StallingSink {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        if self.accept == 0 {
            if let Some(token) = self.token.take() {
                token.cancel();
            }
            return Poll::Pending;
        }
        let len = buf.len().min(self.accept);
        self.written.extend_from_slice(&buf[..len]);
        self.accept -= len;
        Poll::Ready(Ok(len))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[tokio::test]
async fn take_cancelled_mid_transfer_publishes_partial() {
    let ring = ConcurrentRingBuffer::new(8, Some(&[1, 2, 3, 4, 5, 6]), false).unwrap();
    let token = CancellationToken::new();
    let mut destination = StallingSink {
        accept: 3,
        written: Vec::new(),
        token: Some(token.clone()),
    };

    let error = ring
        .take_to_async(&mut destination, 6, &token)
        .await
        .unwrap_err();
    assert!(matches!(error, Error::Cancelled { transferred: 3 }));
    assert_eq!(error.transferred(), 3);
    assert_eq!(destination.written, [1, 2, 3]);

    assert_eq!(ring.current_length(), 3);
    assert_eq!(ring.take_vec(3).unwrap(), [4, 5, 6]);
}

#[test]
fn dropped_take_future_publishes_partial() {
    let ring = ConcurrentRingBuffer::new(8, Some(&[1, 2, 3, 4, 5]), false).unwrap();
    let token = CancellationToken::new();
    let mut destination = StallingSink {
        accept: 2,
        written: Vec::new(),
        token: None,
    };

    let pending = ring
        .take_to_async(&mut destination, 5, &token)
        .now_or_never();
    assert!(pending.is_none());
    assert_eq!(destination.written, [1, 2]);

    // The take direction was released when the future was dropped
    assert_eq!(ring.current_length(), 3);
    assert_eq!(ring.take_vec(3).unwrap(), [3, 4, 5]);
}

#[tokio::test]
async fn async_tasks_share_buffer() {
    let ring = Arc::new(ConcurrentRingBuffer::new(4096, None, false).unwrap());
    let token = CancellationToken::new();
    let mut rng = SmallRng::from_entropy();
    let values: Vec<u8> = (0..200_000).map(|_| rng.gen()).collect();

    let writer = {
        let ring = ring.clone();
        let token = token.clone();
        let values = values.clone();
        tokio::spawn(async move {
            let mut source = futures::io::Cursor::new(values);
            loop {
                let count = ring.spare_length();
                if ring.put_from_async(&mut source, count, &token).await.unwrap() == 0
                    && count > 0
                {
                    break;
                }
                tokio::task::yield_now().await;
            }
        })
    };

    let reader = {
        let ring = ring.clone();
        let total = values.len();
        tokio::spawn(async move {
            let mut received: Vec<u8> = Vec::new();
            while received.len() < total {
                let count = ring.current_length();
                ring.take_to_async(&mut received, count, &token)
                    .await
                    .unwrap();
                tokio::task::yield_now().await;
            }
            received
        })
    };

    let (written, received) = futures::future::join(writer, reader).await;
    written.unwrap();
    assert_eq!(received.unwrap(), values);
}
