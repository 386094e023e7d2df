use crate::flag::*;
use bytes::{Buf, Bytes, BytesMut};
use bytes_parser::error::{Error, Result};
use bytes_parser::my::LenEncInt;
use bytes_parser::{ReadBytesExt, ReadFromBytes, WriteBytesExt, WriteToBytes};

#[derive(Debug, Clone)]
pub struct InitialHandshake {
    pub protocol_version: u8,
    pub server_version: Bytes,
    pub connection_id: u32,
    pub auth_plugin_data_1: Bytes,
    // filler 0x00
    pub charset: u8,
    pub status_flags: u16,
    pub capability_flags: u32,
    pub auth_plugin_data_length: u8,
    // reserved 10 bytes
    pub auth_plugin_data_2: Bytes,
    pub auth_plugin_name: Bytes,
}

impl InitialHandshake {
    /// concatenated scramble seed for the auth plugin
    ///
    /// the second part carries a trailing NUL that is not part of the seed
    pub fn seed(&self) -> Vec<u8> {
        let mut seed = Vec::with_capacity(20);
        seed.extend_from_slice(&self.auth_plugin_data_1);
        let part2 = &self.auth_plugin_data_2;
        let part2 = match part2.iter().position(|&b| b == 0) {
            Some(pos) => &part2[..pos],
            None => &part2[..],
        };
        seed.extend_from_slice(part2);
        seed
    }
}

impl ReadFromBytes for InitialHandshake {
    fn read_from(input: &mut Bytes) -> Result<InitialHandshake> {
        let protocol_version = input.read_u8()?;
        let server_version = input.read_until(0, false)?;
        let connection_id = input.read_le_u32()?;
        let auth_plugin_data_1 = input.read_len(8)?;
        input.read_len(1)?;
        let capability_flags_lower = input.read_le_u16()?;
        let charset = input.read_u8()?;
        let status_flags = input.read_le_u16()?;
        let capability_flags_upper = input.read_le_u16()?;
        let auth_plugin_data_length = input.read_u8()?;
        input.read_len(10)?;
        let capability_flags =
            (capability_flags_lower as u32) | ((capability_flags_upper as u32) << 16);
        let cap_flags = CapabilityFlags::from_bits_truncate(capability_flags);
        let auth_plugin_data_2 = if cap_flags.contains(CapabilityFlags::SECURE_CONNECTION) {
            let len = std::cmp::max(13, auth_plugin_data_length.saturating_sub(8));
            input.read_len(len as usize)?
        } else {
            Bytes::new()
        };
        let auth_plugin_name = if cap_flags.contains(CapabilityFlags::PLUGIN_AUTH) {
            input.read_until(0, false)?
        } else {
            Bytes::new()
        };
        Ok(InitialHandshake {
            protocol_version,
            server_version,
            connection_id,
            auth_plugin_data_1,
            charset,
            status_flags,
            capability_flags,
            auth_plugin_data_length,
            auth_plugin_data_2,
            auth_plugin_name,
        })
    }
}

/// handshake response of client protocol 41
///
/// reference: https://dev.mysql.com/doc/internals/en/connection-phase-packets.html
#[derive(Debug, Clone)]
pub struct HandshakeClientResponse41 {
    pub capability_flags: CapabilityFlags,
    pub max_packet_size: u32,
    pub charset: u8,
    // 23 bytes of 0x00, reserved
    pub username: String,
    // vary according to capability flags and auth setting
    pub auth_response: Vec<u8>,
    // not empty if db is specified
    pub database: String,
    // not empty if plugin auth
    pub auth_plugin_name: String,
}

impl WriteToBytes for HandshakeClientResponse41 {
    fn write_to(self, out: &mut BytesMut) -> Result<usize> {
        let mut len = 0;
        // capability flags 0:4
        len += out.write_le_u32(self.capability_flags.bits())?;
        // max packet size 4:8
        len += out.write_le_u32(self.max_packet_size)?;
        // character set 8:9
        len += out.write_u8(self.charset)?;
        // reserved 23 bytes 9:32
        len += out.write_bytes(&[0u8; 23][..])?;
        // null-terminated username
        len += out.write_bytes(self.username.as_bytes())?;
        len += out.write_u8(0)?;
        // len-encoded auth response
        let auth_response_len = LenEncInt::from(self.auth_response.len() as u64);
        len += auth_response_len.write_to(out)?;
        len += out.write_bytes(&self.auth_response[..])?;
        // null-terminated database if connect with db
        if self
            .capability_flags
            .contains(CapabilityFlags::CONNECT_WITH_DB)
        {
            len += out.write_bytes(self.database.as_bytes())?;
            len += out.write_u8(0)?;
        }
        // null-terminated plugin name
        if self.capability_flags.contains(CapabilityFlags::PLUGIN_AUTH) {
            len += out.write_bytes(self.auth_plugin_name.as_bytes())?;
            len += out.write_u8(0)?;
        }
        Ok(len)
    }
}

impl Default for HandshakeClientResponse41 {
    fn default() -> Self {
        HandshakeClientResponse41 {
            capability_flags: CapabilityFlags::default(),
            // max length of three-byte word
            max_packet_size: 0xffffff,
            // by default use utf-8
            charset: 33,
            username: String::new(),
            auth_response: Vec::new(),
            database: String::new(),
            auth_plugin_name: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthSwitchRequest {
    pub header: u8,
    // null terminated string
    pub plugin_name: Bytes,
    // EOF terminated string
    pub auth_plugin_data: Bytes,
}

impl ReadFromBytes for AuthSwitchRequest {
    fn read_from(input: &mut Bytes) -> Result<Self> {
        let header = input.read_u8()?;
        if header != 0xfe {
            return Err(Error::ConstraintError(format!(
                "message header mismatch: expected=0xfe, actual={:02x}",
                header
            )));
        }
        let plugin_name = input.read_until(0, false)?;
        let auth_plugin_data = input.split_to(input.remaining());
        Ok(AuthSwitchRequest {
            header,
            plugin_name,
            auth_plugin_data,
        })
    }
}
