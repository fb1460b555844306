use std::sync::Arc;

use bytes::{BufMut, BytesMut};

use crate::codec::{self, DecodeResult};
use crate::cursor::StreamCursor;
use crate::protocol::SharedProtocol;

// === Well-known stage names ===
//
// The surrounding proxy must provide the packet-encoder anchor and must
// not occupy the three inserted names itself.

pub const PACKET_ENCODER: &str = "packet-encoder";
pub const TRANSLATOR_DECODER: &str = "translator-decoder";
pub const TRANSLATOR_ENCODER: &str = "translator-encoder";
pub const FRAME_PREPENDER: &str = "frame-prepender";

/// The one write the framer performs against a connection's pipeline.
/// Insertion is a control-plane operation on an existing connection and
/// does not fail. Tests substitute a stub that records calls.
pub trait PipelineReconfigurator {
    /// Insert `stage` under `name`, immediately before the stage called
    /// `anchor`.
    fn insert_before(&mut self, anchor: &str, name: &str, stage: Stage);

    /// Signal that newly inserted stages may start processing buffered
    /// data.
    fn flush(&mut self);
}

/// A handler object spliced into the connection pipeline when the modern
/// generation is detected.
#[derive(Debug)]
pub enum Stage {
    /// Splits inbound modern frames at their leading opcode VarInt.
    TranslatorDecode(Arc<PacketTranslator>),
    /// Joins outbound packets back into modern frames; wraps the same
    /// translator instance as the decode stage.
    TranslatorEncode(Arc<PacketTranslator>),
    /// Prepends the VarInt length prefix to outgoing frames.
    FrameLengthPrepend(FrameLengthPrepender),
}

/// The seam where cross-generation packet translation lives. One
/// instance is shared by the decode and encode stages so both sides
/// observe the same live protocol phase. Frame content is never
/// interpreted past the leading opcode VarInt.
#[derive(Debug)]
pub struct PacketTranslator {
    protocol: SharedProtocol,
}

impl PacketTranslator {
    pub fn new(protocol: SharedProtocol) -> Self {
        Self { protocol }
    }

    /// The live protocol handle this translator follows.
    pub fn protocol(&self) -> &SharedProtocol {
        &self.protocol
    }

    /// Split an opaque modern frame into its opcode and untouched body.
    pub fn split_frame(&self, frame: &[u8]) -> DecodeResult<(i32, Vec<u8>)> {
        let mut cur = StreamCursor::new();
        cur.extend(frame);
        let opcode = codec::read_varint21(&mut cur)?;
        let body = cur.read_bytes(cur.remaining())?.to_vec();
        Ok((opcode, body))
    }

    /// Reassemble a modern frame from opcode and body.
    pub fn join_frame(&self, opcode: i32, body: &[u8], out: &mut BytesMut) {
        codec::write_varint21(out, opcode);
        out.put_slice(body);
    }
}

/// Writes `varint(len(frame)) || frame` for every outgoing modern frame.
#[derive(Debug)]
pub struct FrameLengthPrepender;

impl FrameLengthPrepender {
    pub fn encode(&self, frame: &[u8], out: &mut BytesMut) {
        codec::write_varint21(out, frame.len() as i32);
        out.put_slice(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{self, Protocol};

    #[test]
    fn test_split_join_roundtrip() {
        let translator = PacketTranslator::new(protocol::shared(Protocol::Game));
        let mut frame = BytesMut::new();
        translator.join_frame(0x17, &[0xDE, 0xAD], &mut frame);
        assert_eq!(frame.to_vec(), vec![0x17, 0xDE, 0xAD]);

        let (opcode, body) = translator.split_frame(&frame).unwrap();
        assert_eq!(opcode, 0x17);
        assert_eq!(body, vec![0xDE, 0xAD]);
    }

    #[test]
    fn test_split_frame_multi_byte_opcode() {
        let translator = PacketTranslator::new(protocol::shared(Protocol::Game));
        let (opcode, body) = translator.split_frame(&[0x80, 0x02, 0x01]).unwrap();
        assert_eq!(opcode, 256);
        assert_eq!(body, vec![0x01]);
    }

    #[test]
    fn test_outbound_path_composes() {
        // Outbound traffic passes the translator-encode stage, then the
        // prepender: varint(len(frame)) || opcode || body.
        let translator = PacketTranslator::new(protocol::shared(Protocol::Game));
        let mut frame = BytesMut::new();
        translator.join_frame(0x17, &[0xDE, 0xAD], &mut frame);
        let mut framed = BytesMut::new();
        FrameLengthPrepender.encode(&frame, &mut framed);
        assert_eq!(framed.to_vec(), vec![0x03, 0x17, 0xDE, 0xAD]);
    }

    #[test]
    fn test_prepender_wire_format() {
        let prepender = FrameLengthPrepender;
        let mut out = BytesMut::new();
        prepender.encode(&[0xAA; 5], &mut out);
        assert_eq!(out.to_vec(), vec![0x05, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA]);

        let mut out = BytesMut::new();
        let big = vec![0x00; 300];
        prepender.encode(&big, &mut out);
        assert_eq!(&out[..2], &[0xAC, 0x02]);
        assert_eq!(out.len(), 302);
    }
}
