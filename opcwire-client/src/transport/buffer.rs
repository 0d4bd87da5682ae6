//! The outgoing byte buffer shared by the transports. Messages become chunks on entry,
//! chunks become bytes one at a time so a huge request never balloons the buffer.

use std::{collections::VecDeque, sync::Arc};

use parking_lot::RwLock;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use opcwire_core::{
    comms::{chunker::Chunker, message_chunk::MessageChunk, secure_channel::SecureChannel},
    RequestMessage,
};
use opcwire_types::{BinaryEncodable, EncodingResult};

pub(crate) struct SendBuffer {
    /// Bytes on their way to the wire.
    buffer: Vec<u8>,
    /// How much of `buffer` has been written already.
    write_pos: usize,
    /// Chunks waiting to be turned into bytes.
    chunks: VecDeque<MessageChunk>,
    /// The negotiated maximum chunk size for sending.
    send_buffer_size: usize,
    /// The negotiated maximum message size for sending, 0 for no limit.
    max_message_size: usize,
    /// The negotiated maximum chunk count for sending, 0 for no limit.
    max_chunk_count: usize,
}

impl SendBuffer {
    pub(crate) fn new(
        send_buffer_size: usize,
        max_message_size: usize,
        max_chunk_count: usize,
    ) -> Self {
        Self {
            buffer: Vec::with_capacity(send_buffer_size),
            write_pos: 0,
            chunks: VecDeque::new(),
            send_buffer_size,
            max_message_size,
            max_chunk_count,
        }
    }

    /// Adopt the limits the server granted in its acknowledge.
    pub(crate) fn revise(
        &mut self,
        send_buffer_size: usize,
        max_message_size: usize,
        max_chunk_count: usize,
    ) {
        if send_buffer_size > 0 {
            self.send_buffer_size = send_buffer_size;
        }
        if max_message_size > 0 {
            self.max_message_size = max_message_size;
        }
        if max_chunk_count > 0 {
            self.max_chunk_count = max_chunk_count;
        }
    }

    /// Encode `message` into chunks and queue them. Sequence numbers are taken here, so
    /// messages go onto the wire in the order they pass this point.
    pub(crate) fn write(
        &mut self,
        request_id: u32,
        message: RequestMessage,
        secure_channel: &Arc<RwLock<SecureChannel>>,
    ) -> EncodingResult<()> {
        let mut secure_channel = secure_channel.write();
        let chunks = Chunker::encode(
            secure_channel.sequence_number(),
            request_id,
            self.max_message_size,
            self.max_chunk_count,
            self.send_buffer_size,
            &secure_channel,
            &message,
        )?;
        secure_channel.next_sequence_numbers(chunks.len() as u32);
        self.chunks.extend(chunks);
        Ok(())
    }

    /// `true` when a queued chunk should be moved into the byte buffer.
    pub(crate) fn should_encode_chunks(&self) -> bool {
        !self.chunks.is_empty() && !self.can_read()
    }

    /// Move the next queued chunk into the byte buffer.
    pub(crate) fn encode_next_chunk(&mut self) -> EncodingResult<()> {
        if let Some(chunk) = self.chunks.pop_front() {
            self.buffer.clear();
            self.write_pos = 0;
            chunk.encode(&mut self.buffer)?;
        }
        Ok(())
    }

    /// `true` when there are bytes waiting to go to the wire.
    pub(crate) fn can_read(&self) -> bool {
        self.write_pos < self.buffer.len()
    }

    /// Write the buffered bytes to `write`, fully flushing one chunk before the next is
    /// encoded. Cancel safe: progress is tracked in `write_pos`.
    pub(crate) async fn read_into_async<W: AsyncWrite + Unpin>(
        &mut self,
        write: &mut W,
    ) -> std::io::Result<()> {
        while self.write_pos < self.buffer.len() {
            let written = write.write(&self.buffer[self.write_pos..]).await?;
            self.write_pos += written;
        }
        write.flush().await?;
        self.buffer.clear();
        self.write_pos = 0;
        Ok(())
    }

    /// Take the buffered bytes of the current chunk, for transports that send whole
    /// frames rather than a byte stream.
    pub(crate) fn take_frame(&mut self) -> Vec<u8> {
        self.write_pos = 0;
        std::mem::take(&mut self.buffer)
    }
}
