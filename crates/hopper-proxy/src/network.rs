use crate::config::ProxyConfig;
use crate::pipeline::ConnectionPipeline;
use anyhow::Result;
use bytes::BytesMut;
use hopper_protocol::{
    shared, write_packet, DecodedFrame, DualProtocolFramer, Generation, Packet, Protocol,
    SharedProtocol,
};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Protocol version and name reported in legacy ping responses.
const PING_PROTOCOL_VERSION: u8 = 78;
const PING_VERSION_NAME: &str = "1.6.4";

/// Handle a single client connection until it closes or a decode error
/// kills it.
pub async fn handle_connection(stream: TcpStream, config: Arc<ProxyConfig>) {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".into());
    if let Err(e) = run_connection(stream, &config).await {
        debug!("Connection {} ended: {}", peer, e);
    }
}

async fn run_connection(mut stream: TcpStream, config: &ProxyConfig) -> Result<()> {
    let protocol = shared(Protocol::Handshake);
    let mut framer = DualProtocolFramer::new(protocol.clone());
    let mut pipeline = ConnectionPipeline::new();
    let mut frames = Vec::new();
    let mut tmp = [0u8; 4096];

    loop {
        let n = stream.read(&mut tmp).await?;
        if n == 0 {
            return Ok(());
        }

        framer.decode(&tmp[..n], &mut pipeline, &mut frames)?;
        // The modern extractor hands over one frame per call; drain the
        // rest of the buffer before going back to the socket.
        while framer.generation() == Some(Generation::Modern) {
            let before = frames.len();
            framer.decode(&[], &mut pipeline, &mut frames)?;
            if frames.len() == before {
                break;
            }
        }

        for frame in frames.drain(..) {
            if !handle_frame(frame, &mut stream, &pipeline, &protocol, config).await? {
                return Ok(());
            }
        }
    }
}

/// Dispatch one decoded frame. Returns false once the connection should
/// close.
async fn handle_frame(
    frame: DecodedFrame,
    stream: &mut TcpStream,
    pipeline: &ConnectionPipeline,
    protocol: &SharedProtocol,
    config: &ProxyConfig,
) -> Result<bool> {
    match frame {
        DecodedFrame::Legacy { packet, raw } => {
            trace!("Legacy frame, {} bytes on the wire", raw.len());
            handle_legacy_packet(packet, stream, protocol, config).await
        }
        DecodedFrame::Modern { payload } => {
            match pipeline.translate_inbound(&payload) {
                Some(Ok((opcode, body))) => {
                    debug!("Modern frame: opcode 0x{:02X}, {} body bytes", opcode, body.len());
                }
                Some(Err(e)) => {
                    warn!("Undecodable modern frame: {}", e);
                    return Ok(false);
                }
                None => warn!("Modern frame before pipeline rewire, dropping"),
            }
            Ok(true)
        }
    }
}

async fn handle_legacy_packet(
    packet: Packet,
    stream: &mut TcpStream,
    protocol: &SharedProtocol,
    config: &ProxyConfig,
) -> Result<bool> {
    match packet {
        Packet::ServerListPing { .. } => {
            send_packet(stream, &ping_response(config)).await?;
            Ok(false)
        }
        Packet::Handshake {
            username, host, ..
        } => {
            info!("Handshake from {} via {}", username, host);
            // Handshake done; later packets use the game opcode table.
            *protocol.lock().unwrap() = Protocol::Game;
            Ok(true)
        }
        Packet::KeepAlive { id } => {
            send_packet(stream, &Packet::KeepAlive { id }).await?;
            Ok(true)
        }
        Packet::Chat { message } => {
            debug!("Chat: {}", message);
            Ok(true)
        }
        Packet::PluginMessage { channel, data } => {
            trace!("Plugin message on {}: {} bytes", channel, data.len());
            Ok(true)
        }
        Packet::Kick { reason } => {
            debug!("Kick: {}", reason);
            Ok(false)
        }
    }
}

async fn send_packet(stream: &mut TcpStream, packet: &Packet) -> Result<()> {
    let mut buf = BytesMut::new();
    write_packet(packet, &mut buf);
    stream.write_all(&buf).await?;
    Ok(())
}

/// The legacy status reply: a kick whose reason carries `§1`-delimited
/// fields (protocol, version name, motd, online count, max players).
fn ping_response(config: &ProxyConfig) -> Packet {
    Packet::Kick {
        reason: format!(
            "§1\0{}\0{}\0{}\0{}\0{}",
            PING_PROTOCOL_VERSION, PING_VERSION_NAME, config.motd, 0, config.max_players
        ),
    }
}
