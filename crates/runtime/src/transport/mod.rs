//! Length-prefixed frame transport over a byte stream.
//!
//! Frames are a 4-byte little-endian length followed by the JSON body, the
//! format browsers use for native messaging. The reader and writer halves are
//! independent so each can live in its own task.


use nchost_protocol::{CodecError, Envelope, LENGTH_PREFIX_SIZE, Message};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Reads frames from the extension side of the stream.
pub struct FrameReader<R> {
	reader: R,
	max_frame: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
	pub fn new(reader: R, max_frame: usize) -> Self {
		Self { reader, max_frame }
	}

	/// Reads the next frame.
	///
	/// Returns `Ok(None)` when the stream ends cleanly before a new frame
	/// starts. A stream that ends inside a frame is a framing error.
	pub async fn read_envelope(&mut self) -> Result<Option<Envelope>, CodecError> {
		let mut len_buf = [0u8; LENGTH_PREFIX_SIZE];

		// EOF here is a clean shutdown, EOF after this point is not
		if self.reader.read(&mut len_buf[..1]).await? == 0 {
			return Ok(None);
		}
		self.reader
			.read_exact(&mut len_buf[1..])
			.await
			.map_err(|e| CodecError::Framing(format!("Failed to read length prefix: {e}")))?;

		let length = u32::from_le_bytes(len_buf) as usize;
		if length > self.max_frame {
			return Err(CodecError::Framing(format!(
				"frame length {length} exceeds the {} byte limit",
				self.max_frame
			)));
		}

		let mut body = vec![0u8; length];
		self.reader.read_exact(&mut body).await.map_err(|e| {
			CodecError::Framing(format!(
				"Failed to read {length} byte frame body: {e}"
			))
		})?;

		Envelope::decode(&body).map(Some)
	}
}

/// Writes frames to the extension side of the stream.
pub struct FrameWriter<W> {
	writer: W,
	max_frame: usize,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
	pub fn new(writer: W, max_frame: usize) -> Self {
		Self { writer, max_frame }
	}

	/// Encodes and writes one message, flushing it to the stream.
	///
	/// Encoding failures leave the stream untouched.
	pub async fn write_message(&mut self, message: Message) -> Result<(), CodecError> {
		let frame = message.into_envelope().encode(self.max_frame)?;
		self.writer.write_all(&frame).await?;
		self.writer.flush().await?;
		Ok(())
	}
}
