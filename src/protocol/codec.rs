//! Framing codecs for the two channel kinds

use super::{BLOCK_TAG, MAX_SUBSCRIBE_LEN, Message, SUBSCRIBE_TAG, SubscribeRequest};
use crate::core::constants::{BLOCK_SIZE, TAG_SIZE};
use crate::core::Block;
use crate::error::{Error, Result};
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// A decoded unit from the coordinator's inbound stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A well-formed tagged message
    Message(Message),
    /// Bytes dropped while searching for the next known tag
    Discarded(usize),
}

/// Codec for the coordinator's inbound channel
///
/// Frames are `SUB:<text>\n` or `BLK:<28-byte block>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageCodec;

impl MessageCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self
    }
}

/// Whether `buf` could be the beginning of a known tag
fn could_start_tag(buf: &[u8]) -> bool {
    let n = buf.len().min(TAG_SIZE);
    [SUBSCRIBE_TAG, BLOCK_TAG]
        .iter()
        .any(|tag| buf[..n] == tag[..n])
}

/// Offset of the first position after 0 where a tag could begin
fn resync_offset(buf: &[u8]) -> usize {
    (1..buf.len())
        .find(|&i| could_start_tag(&buf[i..]))
        .unwrap_or(buf.len())
}

impl Decoder for MessageCodec {
    type Item = Inbound;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Inbound>> {
        if src.is_empty() {
            return Ok(None);
        }
        if src.len() < TAG_SIZE {
            if could_start_tag(src) {
                return Ok(None);
            }
            let skip = resync_offset(src);
            src.advance(skip);
            return Ok(Some(Inbound::Discarded(skip)));
        }

        if &src[..TAG_SIZE] == SUBSCRIBE_TAG {
            let body_len = src.len() - TAG_SIZE;
            let newline = src[TAG_SIZE..].iter().position(|b| *b == b'\n');
            return match newline {
                Some(end) => {
                    let line = src.split_to(TAG_SIZE + end + 1);
                    let text = String::from_utf8_lossy(&line[TAG_SIZE..TAG_SIZE + end]);
                    let text = text.trim_end_matches('\r').to_string();
                    Ok(Some(Inbound::Message(Message::Subscribe(
                        SubscribeRequest::from_text(text),
                    ))))
                }
                None if body_len > MAX_SUBSCRIBE_LEN => {
                    src.advance(TAG_SIZE);
                    Ok(Some(Inbound::Discarded(TAG_SIZE)))
                }
                None => Ok(None),
            };
        }

        if &src[..TAG_SIZE] == BLOCK_TAG {
            if src.len() < TAG_SIZE + BLOCK_SIZE {
                src.reserve(TAG_SIZE + BLOCK_SIZE - src.len());
                return Ok(None);
            }
            src.advance(TAG_SIZE);
            let block = Block::decode(src);
            return Ok(Some(Inbound::Message(Message::Submit(block))));
        }

        let skip = resync_offset(src);
        src.advance(skip);
        Ok(Some(Inbound::Discarded(skip)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Inbound>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => {
                let dropped = src.len();
                src.clear();
                Ok(Some(Inbound::Discarded(dropped)))
            }
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = Error;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<()> {
        match item {
            Message::Subscribe(request) => {
                let text = request.text();
                if text.contains('\n') {
                    return Err(Error::protocol("Subscribe text must be a single line"));
                }
                if text.len() > MAX_SUBSCRIBE_LEN {
                    return Err(Error::protocol(format!(
                        "Subscribe text longer than {} bytes",
                        MAX_SUBSCRIBE_LEN
                    )));
                }
                dst.reserve(TAG_SIZE + text.len() + 1);
                dst.put_slice(SUBSCRIBE_TAG);
                dst.put_slice(text.as_bytes());
                dst.put_u8(b'\n');
            }
            Message::Submit(block) => {
                dst.reserve(TAG_SIZE + BLOCK_SIZE);
                dst.put_slice(BLOCK_TAG);
                block.encode(dst);
            }
        }
        Ok(())
    }
}

/// Codec for a miner's inbound channel: untagged block records
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockCodec;

impl BlockCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for BlockCodec {
    type Item = Block;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Block>> {
        if src.len() < BLOCK_SIZE {
            src.reserve(BLOCK_SIZE - src.len());
            return Ok(None);
        }
        Ok(Some(Block::decode(src)))
    }
}

impl Encoder<Block> for BlockCodec {
    type Error = Error;

    fn encode(&mut self, item: Block, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(BLOCK_SIZE);
        item.encode(dst);
        Ok(())
    }
}
