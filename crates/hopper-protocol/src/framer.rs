use std::sync::Arc;

use tracing::{debug, trace};

use crate::codec::{self, DecodeError, DecodeResult};
use crate::cursor::StreamCursor;
use crate::packets::Packet;
use crate::pipeline::{
    self, FrameLengthPrepender, PacketTranslator, PipelineReconfigurator, Stage,
};
use crate::protocol::{SharedProtocol, OPCODE_HANDSHAKE, OPCODE_SERVER_LIST_PING};

/// Wire-format generation a connection speaks. Committed on the first
/// byte and never re-evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    Legacy,
    Modern,
}

/// One decoded unit of the incoming stream.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedFrame {
    /// A parsed legacy packet together with an independent copy of the
    /// exact bytes it was decoded from, opcode included.
    Legacy { packet: Packet, raw: Vec<u8> },
    /// The payload of one modern length-prefixed frame, prefix stripped
    /// and content uninterpreted.
    Modern { payload: Vec<u8> },
}

/// Classify a connection from the opcode of its very first packet. Only
/// the legacy handshake and server-list-ping opcodes mark a legacy
/// client; any other value is taken to be the first byte of a modern
/// length prefix. The protocol family keeps those two values out of
/// modern length prefixes, so the first byte is enough.
///
/// Peeks exactly one byte; the cursor position is untouched.
pub fn detect_generation(cursor: &StreamCursor) -> DecodeResult<Generation> {
    let opcode = cursor.peek_u8()?;
    if opcode == OPCODE_HANDSHAKE || opcode == OPCODE_SERVER_LIST_PING {
        Ok(Generation::Legacy)
    } else {
        Ok(Generation::Modern)
    }
}

/// Front-of-pipe decoder bridging the legacy per-opcode wire format and
/// the modern length-prefixed one.
///
/// The transport feeds `decode` whatever bytes arrive; underflow is
/// never an error, the call just returns without emitting and the
/// unconsumed bytes are replayed on the next invocation. On the first
/// byte the connection is committed to one generation for good, and a
/// modern connection gets the translator and length-prefix stages
/// spliced into its pipeline before the packet-encoder anchor.
pub struct DualProtocolFramer {
    cursor: StreamCursor,
    protocol: SharedProtocol,
    generation: Option<Generation>,
}

impl DualProtocolFramer {
    pub fn new(protocol: SharedProtocol) -> Self {
        Self {
            cursor: StreamCursor::new(),
            protocol,
            generation: None,
        }
    }

    /// The committed generation, once the first byte has been seen.
    pub fn generation(&self) -> Option<Generation> {
        self.generation
    }

    /// Feed freshly received bytes and decode whatever is complete.
    ///
    /// Legacy connections may emit any number of frames per call. Modern
    /// connections emit at most one; the caller re-invokes with an empty
    /// `input` to drain queued frames. Any error returned is fatal for
    /// the connection.
    pub fn decode(
        &mut self,
        input: &[u8],
        pipeline: &mut dyn PipelineReconfigurator,
        frames: &mut Vec<DecodedFrame>,
    ) -> DecodeResult<()> {
        self.cursor.extend(input);
        let generation = match self.generation {
            Some(generation) => generation,
            None => {
                // Detection needs a first byte to look at.
                if self.cursor.remaining() == 0 {
                    return Ok(());
                }
                let generation = detect_generation(&self.cursor)?;
                if generation == Generation::Modern {
                    self.rewire_pipeline(pipeline);
                }
                debug!("Connection committed to {:?} wire format", generation);
                self.generation = Some(generation);
                generation
            }
        };
        match generation {
            Generation::Legacy => self.read_legacy_packets(frames),
            Generation::Modern => self.read_modern_frame(frames),
        }
    }

    /// Splice the modern-format stages in front of the packet-encoder
    /// anchor: the translator-decoder closest to it, then the
    /// translator-encoder wrapping the same translator instance, then
    /// the length prepender outermost.
    fn rewire_pipeline(&self, pipeline: &mut dyn PipelineReconfigurator) {
        let translator = Arc::new(PacketTranslator::new(self.protocol.clone()));
        pipeline.insert_before(
            pipeline::PACKET_ENCODER,
            pipeline::TRANSLATOR_DECODER,
            Stage::TranslatorDecode(translator.clone()),
        );
        pipeline.insert_before(
            pipeline::TRANSLATOR_DECODER,
            pipeline::TRANSLATOR_ENCODER,
            Stage::TranslatorEncode(translator),
        );
        pipeline.insert_before(
            pipeline::TRANSLATOR_ENCODER,
            pipeline::FRAME_PREPENDER,
            Stage::FrameLengthPrepend(FrameLengthPrepender),
        );
        pipeline.flush();
    }

    /// Extract as many complete legacy packets as the buffer holds,
    /// checkpointing after each. An incomplete packet rewinds to the
    /// last checkpoint and waits for more bytes.
    fn read_legacy_packets(&mut self, frames: &mut Vec<DecodedFrame>) -> DecodeResult<()> {
        // One consistent phase for the whole invocation; the proxy only
        // swaps the handle between invocations.
        let protocol = *self.protocol.lock().unwrap();
        loop {
            let opcode = match self.cursor.read_u8() {
                Ok(opcode) => opcode,
                Err(DecodeError::Underflow) => {
                    self.cursor.rewind();
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            let packet = match protocol.read(opcode, &mut self.cursor) {
                Ok(packet) => packet,
                Err(DecodeError::Underflow) => {
                    self.cursor.rewind();
                    return Ok(());
                }
                // Checkpoint still excludes the failing packet.
                Err(e) => return Err(e),
            };
            let raw = self.cursor.consumed().to_vec();
            self.cursor.checkpoint();
            trace!("Read legacy packet 0x{:02X} len={}", opcode, raw.len());
            frames.push(DecodedFrame::Legacy { packet, raw });
        }
    }

    /// Extract at most one modern frame. On underflow the cursor resets
    /// fully to the frame start, so no partial prefix survives across
    /// calls; the at-most-3-byte re-read is cheap.
    fn read_modern_frame(&mut self, frames: &mut Vec<DecodedFrame>) -> DecodeResult<()> {
        let start = self.cursor.position();
        let length = match codec::read_varint21(&mut self.cursor) {
            Ok(length) => length as usize,
            Err(DecodeError::Underflow) => {
                self.cursor.rewind_to(start);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        if self.cursor.remaining() < length {
            self.cursor.rewind_to(start);
            return Ok(());
        }
        let payload = self.cursor.read_bytes(length)?.to_vec();
        self.cursor.checkpoint();
        trace!("Read modern frame len={}", length);
        frames.push(DecodedFrame::Modern { payload });
        Ok(())
    }
}
