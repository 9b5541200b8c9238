use bytes::{Buf, BytesMut};

use crate::error::Result;
use crate::frame::{Frame, ParseFrameError};

fn extract_frames(buffer: &[u8]) -> Result<(usize, Vec<Frame>)> {
    let mut current_pos = 0;
    let mut frames = vec![];

    loop {
        match Frame::from_buffer(&buffer[current_pos..]) {
            Ok(parsed) => {
                frames.push(parsed.frame);
                current_pos += parsed.frame_len;
            }
            Err(ParseFrameError::NotEnoughBytes) => break,
            Err(error) => return Err(error.into()),
        }
    }

    Ok((current_pos, frames))
}

/// Reassembles frames from arbitrarily split socket reads. Every connection owns its own decoder,
/// so partial data from one socket never mixes with another.
#[derive(Clone, Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    /// Consumes some data and returns every frame that became complete. A trailing partial frame
    /// stays buffered until the next call. Only a body over the size limit is an error, since the
    /// stream can't be resynchronized after it.
    pub fn consume(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        if self.buffer.is_empty() {
            // optimistic case
            let (consumed, frames) = extract_frames(data)?;
            self.buffer.extend_from_slice(&data[consumed..]);

            return Ok(frames);
        }

        self.buffer.extend_from_slice(data);

        let (consumed, frames) = extract_frames(&self.buffer)?;
        self.buffer.advance(consumed);

        Ok(frames)
    }

    /// Number of bytes waiting for the rest of their frame.
    #[inline]
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}
