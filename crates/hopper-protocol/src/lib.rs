pub mod codec;
pub mod cursor;
pub mod packets;
pub mod protocol;
pub mod pipeline;
pub mod framer;

pub use codec::*;
pub use cursor::StreamCursor;
pub use packets::*;
pub use protocol::{shared, write_packet, Protocol, SharedProtocol};
pub use pipeline::{
    FrameLengthPrepender, PacketTranslator, PipelineReconfigurator, Stage,
};
pub use framer::{detect_generation, DecodedFrame, DualProtocolFramer, Generation};
