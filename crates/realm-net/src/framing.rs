//! Length-prefixed framing for the server stream.
//!
//! Every message on the wire is a length-prefixed frame:
//!
//! ```text
//! +-------------------+------------------------------------+
//! | length (4 bytes)  |   payload (length bytes)           |
//! | u32 little-endian |   [version u8][postcard Message]   |
//! +-------------------+------------------------------------+
//! ```
//!
//! The length does **not** include the 4 prefix bytes themselves. A length of
//! 0 is a valid frame at this layer; it fails to decode as a [`Message`].

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::messages::{Message, MessageError, deserialize_message, serialize_message};

/// Configuration for the framing layer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum allowed payload size in bytes. Default: 1 MB.
    pub max_payload_size: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: 1_048_576,
        }
    }
}

impl FrameConfig {
    /// Reject payloads larger than [`max_payload_size`](Self::max_payload_size).
    pub fn check_len(&self, len: usize) -> Result<u32, FrameError> {
        let size = u32::try_from(len).unwrap_or(u32::MAX);
        if size > self.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size,
                max: self.max_payload_size,
            });
        }
        Ok(size)
    }
}

/// Errors that can occur during framing operations.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload size exceeds the configured maximum.
    #[error("payload size {size} exceeds maximum {max}")]
    PayloadTooLarge {
        /// The actual payload size.
        size: u32,
        /// The configured maximum.
        max: u32,
    },

    /// The connection was closed before a complete frame was received.
    #[error("connection closed")]
    ConnectionClosed,

    /// A complete frame arrived but its payload is not a valid message.
    #[error("undecodable frame: {0}")]
    Decode(#[from] MessageError),

    /// A message could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] postcard::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read a single length-prefixed frame from the stream.
///
/// Returns [`FrameError::ConnectionClosed`] if the peer closes the connection
/// before the frame is complete.
pub async fn read_frame<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    config: &FrameConfig,
) -> Result<Vec<u8>, FrameError> {
    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .await
        .map_err(closed_or_io)?;

    let payload_len = u32::from_le_bytes(len_buf);
    if payload_len > config.max_payload_size {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: config.max_payload_size,
        });
    }

    let mut payload = vec![0u8; payload_len as usize];
    if payload_len > 0 {
        reader
            .read_exact(&mut payload)
            .await
            .map_err(closed_or_io)?;
    }

    Ok(payload)
}

/// Write a single length-prefixed frame to the stream and flush it.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    payload: &[u8],
    config: &FrameConfig,
) -> Result<(), FrameError> {
    let len = config.check_len(payload.len())?;

    writer.write_all(&len.to_le_bytes()).await?;
    if !payload.is_empty() {
        writer.write_all(payload).await?;
    }
    writer.flush().await?;

    Ok(())
}

/// Read one frame and decode it as a [`Message`].
///
/// A [`FrameError::Decode`] means the whole frame was consumed, so the stream
/// is still aligned and the caller may keep reading.
pub async fn read_message<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    config: &FrameConfig,
) -> Result<Message, FrameError> {
    let payload = read_frame(reader, config).await?;
    Ok(deserialize_message(&payload)?)
}

/// Encode a [`Message`] and write it as one frame.
pub async fn write_message<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    message: &Message,
    config: &FrameConfig,
) -> Result<(), FrameError> {
    let payload = serialize_message(message)?;
    write_frame(writer, &payload, config).await
}

fn closed_or_io(e: std::io::Error) -> FrameError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        FrameError::ConnectionClosed
    } else {
        FrameError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{Enter, GamePacket, Leave};
    use tokio::io::duplex;

    fn enter(id: &str) -> Message {
        Message::Enter(Enter {
            client_id: id.to_string(),
        })
    }

    #[tokio::test]
    async fn test_messages_arrive_in_write_order() {
        let (mut client, mut server) = duplex(8192);
        let config = FrameConfig::default();

        let sent = vec![
            enter("Main1"),
            Message::Game(GamePacket {
                kind: 3,
                payload: b"abc".to_vec(),
            }),
            Message::Leave(Leave),
        ];
        for msg in &sent {
            write_message(&mut client, msg, &config).await.unwrap();
        }

        for expected in &sent {
            let received = read_message(&mut server, &config).await.unwrap();
            assert_eq!(&received, expected);
        }
    }

    #[tokio::test]
    async fn test_partial_read_resumes_correctly() {
        // Tiny buffer forces the frame across several reads.
        let (mut client, mut server) = duplex(8);
        let config = FrameConfig::default();
        let msg = enter("Main-a-fairly-long-identity-token-for-splitting");

        let expected = msg.clone();
        let write_config = config.clone();
        let write_task = tokio::spawn(async move {
            write_message(&mut client, &msg, &write_config)
                .await
                .unwrap();
        });

        let received = read_message(&mut server, &config).await.unwrap();
        write_task.await.unwrap();
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected_on_read() {
        let (mut client, mut server) = duplex(8192);
        let config = FrameConfig {
            max_payload_size: 16,
        };

        client.write_all(&1024u32.to_le_bytes()).await.unwrap();
        client.flush().await.unwrap();

        let result = read_frame(&mut server, &config).await;
        assert!(matches!(
            result,
            Err(FrameError::PayloadTooLarge { size: 1024, max: 16 })
        ));
    }

    #[tokio::test]
    async fn test_oversized_message_rejected_on_write() {
        let (mut client, _server) = duplex(8192);
        let config = FrameConfig {
            max_payload_size: 16,
        };
        let big = Message::Game(GamePacket {
            kind: 1,
            payload: vec![0u8; 1024],
        });

        let result = write_message(&mut client, &big, &config).await;
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_undecodable_frame_keeps_stream_aligned() {
        let (mut client, mut server) = duplex(8192);
        let config = FrameConfig::default();

        write_frame(&mut client, &[99, 1, 2], &config).await.unwrap();
        write_message(&mut client, &Message::Leave(Leave), &config)
            .await
            .unwrap();

        let first = read_message(&mut server, &config).await;
        assert!(matches!(
            first,
            Err(FrameError::Decode(MessageError::UnsupportedVersion(99)))
        ));
        let second = read_message(&mut server, &config).await.unwrap();
        assert_eq!(second, Message::Leave(Leave));
    }

    #[tokio::test]
    async fn test_zero_length_frame_handled() {
        let (mut client, mut server) = duplex(8192);
        let config = FrameConfig::default();

        write_frame(&mut client, &[], &config).await.unwrap();
        let received = read_frame(&mut server, &config).await.unwrap();
        assert!(received.is_empty());
    }

    #[tokio::test]
    async fn test_connection_closed_during_length_read() {
        let (client, mut server) = duplex(8192);
        drop(client);

        let result = read_frame(&mut server, &FrameConfig::default()).await;
        assert!(matches!(result, Err(FrameError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_connection_closed_mid_payload() {
        let (mut client, mut server) = duplex(8192);
        client.write_all(&10u32.to_le_bytes()).await.unwrap();
        client.write_all(b"abc").await.unwrap();
        drop(client);

        let result = read_frame(&mut server, &FrameConfig::default()).await;
        assert!(matches!(result, Err(FrameError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_length_prefix_is_little_endian() {
        let (mut client, mut server) = duplex(8192);
        let payload = serialize_message(&Message::Leave(Leave)).unwrap();

        client
            .write_all(&(payload.len() as u32).to_le_bytes())
            .await
            .unwrap();
        client.write_all(&payload).await.unwrap();
        client.flush().await.unwrap();

        let received = read_message(&mut server, &FrameConfig::default())
            .await
            .unwrap();
        assert_eq!(received, Message::Leave(Leave));
    }
}
