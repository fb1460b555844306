use std::sync::{Arc, Mutex};

use bytes::{BufMut, BytesMut};

use crate::codec::{self, DecodeError, DecodeResult};
use crate::cursor::StreamCursor;
use crate::packets::Packet;

// === Legacy opcodes ===

pub const OPCODE_KEEP_ALIVE: u8 = 0x00;
pub const OPCODE_HANDSHAKE: u8 = 0x02;
pub const OPCODE_CHAT: u8 = 0x03;
pub const OPCODE_PLUGIN_MESSAGE: u8 = 0xFA;
pub const OPCODE_SERVER_LIST_PING: u8 = 0xFE;
pub const OPCODE_KICK: u8 = 0xFF;

/// Which opcode table is live for a connection. The proxy swaps the
/// shared handle as the handshake lifecycle advances; the framer only
/// ever borrows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Handshake,
    Game,
}

/// Swappable handle to a connection's live protocol phase.
pub type SharedProtocol = Arc<Mutex<Protocol>>;

pub fn shared(protocol: Protocol) -> SharedProtocol {
    Arc::new(Mutex::new(protocol))
}

impl Protocol {
    /// Parse the body of the packet identified by `opcode`. Reports
    /// `Underflow` if the body is incomplete and `UnknownOpcode` if this
    /// phase has no schema for it.
    pub fn read(self, opcode: u8, cur: &mut StreamCursor) -> DecodeResult<Packet> {
        match (self, opcode) {
            (_, OPCODE_PLUGIN_MESSAGE) => read_plugin_message(cur),
            (Protocol::Handshake, OPCODE_HANDSHAKE) => read_handshake(cur),
            (Protocol::Handshake, OPCODE_SERVER_LIST_PING) => read_server_list_ping(cur),
            (Protocol::Game, OPCODE_KEEP_ALIVE) => read_keep_alive(cur),
            (Protocol::Game, OPCODE_CHAT) => read_chat(cur),
            (Protocol::Game, OPCODE_KICK) => read_kick(cur),
            _ => Err(DecodeError::UnknownOpcode(opcode)),
        }
    }
}

/// Encode a packet in legacy wire format, opcode included. Phase makes
/// no difference on the write side; opcodes are stable across both.
pub fn write_packet(packet: &Packet, buf: &mut BytesMut) {
    match packet {
        Packet::Handshake {
            protocol_version,
            username,
            host,
            port,
        } => {
            buf.put_u8(OPCODE_HANDSHAKE);
            buf.put_u8(*protocol_version);
            codec::write_string(buf, username);
            codec::write_string(buf, host);
            buf.put_i32(*port);
        }
        Packet::ServerListPing { magic } => {
            buf.put_u8(OPCODE_SERVER_LIST_PING);
            buf.put_u8(*magic);
        }
        Packet::KeepAlive { id } => {
            buf.put_u8(OPCODE_KEEP_ALIVE);
            buf.put_i32(*id);
        }
        Packet::Chat { message } => {
            buf.put_u8(OPCODE_CHAT);
            codec::write_string(buf, message);
        }
        Packet::PluginMessage { channel, data } => {
            buf.put_u8(OPCODE_PLUGIN_MESSAGE);
            codec::write_string(buf, channel);
            buf.put_u16(data.len() as u16);
            buf.put_slice(data);
        }
        Packet::Kick { reason } => {
            buf.put_u8(OPCODE_KICK);
            codec::write_string(buf, reason);
        }
    }
}

// === Body readers ===

fn read_handshake(cur: &mut StreamCursor) -> DecodeResult<Packet> {
    let protocol_version = cur.read_u8()?;
    let username = codec::read_string(cur, 16)?;
    let host = codec::read_string(cur, 255)?;
    let port = codec::read_i32(cur)?;
    Ok(Packet::Handshake {
        protocol_version,
        username,
        host,
        port,
    })
}

fn read_server_list_ping(cur: &mut StreamCursor) -> DecodeResult<Packet> {
    let magic = cur.read_u8()?;
    Ok(Packet::ServerListPing { magic })
}

fn read_keep_alive(cur: &mut StreamCursor) -> DecodeResult<Packet> {
    let id = codec::read_i32(cur)?;
    Ok(Packet::KeepAlive { id })
}

fn read_chat(cur: &mut StreamCursor) -> DecodeResult<Packet> {
    let message = codec::read_string(cur, 100)?;
    Ok(Packet::Chat { message })
}

fn read_plugin_message(cur: &mut StreamCursor) -> DecodeResult<Packet> {
    let channel = codec::read_string(cur, 20)?;
    let len = codec::read_u16(cur)? as usize;
    let data = cur.read_bytes(len)?.to_vec();
    Ok(Packet::PluginMessage { channel, data })
}

fn read_kick(cur: &mut StreamCursor) -> DecodeResult<Packet> {
    let reason = codec::read_string(cur, 32767)?;
    Ok(Packet::Kick { reason })
}
