//! Reader-driven producer: feed a session from an async byte source.

use ampoule_shared::TransportError;
use embedded_io_async::Read;
use log::{debug, trace};

use crate::error::{IngestionError, Result};
use crate::session::IngestionHandle;

/// Bytes requested from the reader per call
pub const CHUNK_SIZE: usize = 64;

/// Copy bytes from `reader` into the session until end of stream
///
/// Waits for the dispatcher to free space instead of dropping bytes when
/// the receive buffer is full. Returns the number of bytes fed.
pub async fn pump<R, const N: usize>(reader: &mut R, handle: &IngestionHandle<N>) -> Result<usize>
where
    R: Read,
{
    let mut chunk = [0u8; CHUNK_SIZE];
    let mut total = 0usize;

    loop {
        let read = reader
            .read(&mut chunk)
            .await
            .map_err(|e| IngestionError::TransportRead(TransportError::from_io(&e)))?;
        if read == 0 {
            debug!("reader reached end of stream after {} bytes", total);
            return Ok(total);
        }
        trace!("read {} bytes", read);

        let mut rest = &chunk[..read];
        while !rest.is_empty() {
            let space = handle.space();
            if space == 0 {
                if handle.is_closed() {
                    return Err(IngestionError::Closed);
                }
                tokio::task::yield_now().await;
                continue;
            }

            let take = space.min(rest.len());
            let accepted = match handle.feed(&rest[..take]) {
                Ok(()) => take,
                // Another producer got there first
                Err(IngestionError::Overflow { accepted, .. }) => accepted,
                Err(e) => return Err(e),
            };
            rest = &rest[accepted..];
            total += accepted;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use embedded_io_async::{ErrorKind, ErrorType};

    use super::*;
    use crate::config::IngestionConfig;
    use crate::session::IngestionSession;

    /// Reader that hands out scripted chunks, then end of stream
    struct Script {
        chunks: VecDeque<std::result::Result<Vec<u8>, ErrorKind>>,
    }

    impl Script {
        fn new(chunks: Vec<std::result::Result<Vec<u8>, ErrorKind>>) -> Self {
            Self {
                chunks: chunks.into(),
            }
        }
    }

    impl ErrorType for Script {
        type Error = ErrorKind;
    }

    impl Read for Script {
        async fn read(&mut self, buf: &mut [u8]) -> std::result::Result<usize, ErrorKind> {
            let Some(next) = self.chunks.pop_front() else {
                return Ok(0);
            };
            let data = next?;
            let len = data.len().min(buf.len());
            buf[..len].copy_from_slice(&data[..len]);
            if len < data.len() {
                self.chunks.push_front(Ok(data[len..].to_vec()));
            }
            Ok(len)
        }
    }

    fn observer_session<const N: usize>(
        max_packet_size: usize,
    ) -> (IngestionSession<N>, Arc<Mutex<Vec<Vec<u8>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let config = IngestionConfig {
            max_packet_size,
            ..IngestionConfig::default()
        };
        let session = IngestionSession::<N>::spawn_with(
            crate::dispatch::RawObserver::new(move |payload: &[u8]| {
                sink.lock().unwrap().push(payload.to_vec())
            }),
            config,
            None,
        )
        .unwrap();
        (session, seen)
    }

    #[tokio::test(start_paused = true)]
    async fn test_pump_delivers_until_eof() {
        let (session, seen) = observer_session::<1024>(1024);
        let mut reader = Script::new(vec![
            Ok(vec![0x00, 0x02, 0xAA]),
            Ok(vec![0xBB, 0x00]),
            Ok(vec![0x01, 0xCC]),
        ]);

        let total = pump(&mut reader, &session.handle()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(total, 7);
        assert_eq!(*seen.lock().unwrap(), vec![vec![0xAA, 0xBB], vec![0xCC]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pump_waits_for_space() {
        let (session, seen) = observer_session::<16>(16);

        // Three full-size messages through a 16 byte buffer
        let mut stream = Vec::new();
        for fill in [1u8, 2, 3] {
            stream.extend_from_slice(&[0x00, 0x10]);
            stream.extend_from_slice(&[fill; 16]);
        }
        let mut reader = Script::new(vec![Ok(stream)]);

        let total = pump(&mut reader, &session.handle()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(total, 54);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![vec![1u8; 16], vec![2u8; 16], vec![3u8; 16]]
        );
        assert_eq!(session.stats().overflows, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_buffer_on_closed_session_ends_pump() {
        let (queue, receiver) = tokio::sync::mpsc::unbounded_channel();
        let handle = IngestionHandle::<16> {
            shared: Arc::new(crate::dispatcher::Shared::new()),
            queue,
        };
        handle.feed(&[0x5A; 16]).unwrap();
        drop(receiver);

        let mut reader = Script::new(vec![Ok(vec![0x01, 0x02])]);
        assert_eq!(
            pump(&mut reader, &handle).await,
            Err(IngestionError::Closed)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_error_is_surfaced() {
        let (session, _seen) = observer_session::<1024>(1024);
        let mut reader = Script::new(vec![
            Ok(vec![0x00]),
            Err(ErrorKind::ConnectionReset),
        ]);

        assert_eq!(
            pump(&mut reader, &session.handle()).await,
            Err(IngestionError::TransportRead(TransportError::Disconnected))
        );
        assert_eq!(session.stats().bytes_received, 1);
    }
}
