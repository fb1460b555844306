use hopper_protocol::pipeline::{self, PipelineReconfigurator, Stage};
use hopper_protocol::DecodeResult;
use tracing::{debug, trace};

/// A stage slot in the connection's processing sequence.
#[derive(Debug)]
enum PipelineStage {
    /// The fixed anchor: encodes structured legacy packets for the wire.
    PacketEncoder,
    /// A handler spliced in by the framer on modern detection.
    Inserted(Stage),
}

/// Ordered, named processing stages for one connection.
///
/// Every connection starts with just the packet-encoder anchor. When the
/// framer detects a modern client it splices the translator and
/// length-prefix stages in front of it through the reconfigurator
/// interface; inserted stages start processing once the pipeline has
/// been flushed.
pub struct ConnectionPipeline {
    stages: Vec<(String, PipelineStage)>,
    flushed: bool,
}

impl ConnectionPipeline {
    pub fn new() -> Self {
        Self {
            stages: vec![(
                pipeline::PACKET_ENCODER.to_string(),
                PipelineStage::PacketEncoder,
            )],
            flushed: false,
        }
    }

    /// Stage names, head to tail.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Run an inbound modern frame through the translator-decode stage.
    /// `None` until the framer has inserted the modern stages and
    /// flushed.
    pub fn translate_inbound(&self, payload: &[u8]) -> Option<DecodeResult<(i32, Vec<u8>)>> {
        if !self.flushed {
            return None;
        }
        for (_, stage) in &self.stages {
            if let PipelineStage::Inserted(Stage::TranslatorDecode(translator)) = stage {
                return Some(translator.split_frame(payload));
            }
        }
        None
    }
}

impl PipelineReconfigurator for ConnectionPipeline {
    fn insert_before(&mut self, anchor: &str, name: &str, stage: Stage) {
        let index = self
            .stages
            .iter()
            .position(|(existing, _)| existing == anchor)
            .expect("unknown pipeline anchor");
        self.stages
            .insert(index, (name.to_string(), PipelineStage::Inserted(stage)));
        trace!("Inserted pipeline stage {} before {}", name, anchor);
    }

    fn flush(&mut self) {
        self.flushed = true;
        debug!("Pipeline flushed, stages: {:?}", self.stage_names());
    }
}
