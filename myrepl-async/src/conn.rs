use crate::auth_plugin::{AuthPlugin, MysqlNativePassword};
use crate::error::{Error, Result};
use crate::query::Query;
use async_net::TcpStream;
use bytes::{Buf, Bytes, BytesMut};
use bytes_parser::{ReadFromBytes, ReadFromBytesWithContext, WriteToBytes};
use futures::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use myrepl_core::cmd::ComQuit;
use myrepl_core::flag::CapabilityFlags;
use myrepl_core::handshake::{HandshakeClientResponse41, InitialHandshake};
use myrepl_core::packet::HandshakeMessage;
use serde_derive::{Deserialize, Serialize};

/// connection settings shared by the stream and control connections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnOpts {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    /// charset id sent in the handshake, 33 = utf8_general_ci
    pub charset: u8,
}

impl ConnOpts {
    pub fn new<H: Into<String>, U: Into<String>, P: Into<String>>(
        host: H,
        port: u16,
        username: U,
        password: P,
    ) -> Self {
        ConnOpts {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            database: String::new(),
            charset: 33,
        }
    }

    pub fn database<D: Into<String>>(mut self, database: D) -> Self {
        self.database = database.into();
        self
    }
}

/// client connection over any async byte stream
///
/// handles packet framing (including >=16MB multi-packet messages)
/// and sequence-id bookkeeping; commands reset the sequence
#[derive(Debug)]
pub struct Conn<S> {
    pub(crate) stream: S,
    pub(crate) cap_flags: CapabilityFlags,
    pkt_nr: u8,
}

impl Conn<TcpStream> {
    /// connect over TCP and complete the handshake
    pub async fn connect(opts: &ConnOpts) -> Result<Conn<TcpStream>> {
        let stream = TcpStream::connect((opts.host.as_str(), opts.port)).await?;
        log::debug!("connected to MySQL: {}:{}", opts.host, opts.port);
        let mut conn = Conn::new(stream);
        conn.handshake(opts).await?;
        Ok(conn)
    }
}

impl<S> Conn<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Conn {
            stream,
            cap_flags: CapabilityFlags::empty(),
            pkt_nr: 0,
        }
    }

    /// process the initial handshake, must be called before any command
    pub async fn handshake(&mut self, opts: &ConnOpts) -> Result<()> {
        let mut msg = self.recv_msg().await?;
        let handshake = InitialHandshake::read_from(&mut msg)?;
        log::debug!(
            "protocol version: {}, server version: {}, connection id: {}",
            handshake.protocol_version,
            String::from_utf8_lossy(&handshake.server_version),
            handshake.connection_id
        );
        let seed = handshake.seed();

        self.cap_flags = CapabilityFlags::default();
        if !opts.database.is_empty() {
            self.cap_flags.insert(CapabilityFlags::CONNECT_WITH_DB);
        }

        let mut plugin = MysqlNativePassword::new();
        plugin.set_credential(&opts.username, &opts.password);
        let mut auth_response = vec![];
        plugin.next(&seed, &mut auth_response)?;

        let client_resp = HandshakeClientResponse41 {
            capability_flags: self.cap_flags,
            charset: opts.charset,
            username: opts.username.clone(),
            auth_response,
            database: opts.database.clone(),
            auth_plugin_name: MysqlNativePassword::NAME.to_owned(),
            ..Default::default()
        };
        self.send_msg(client_resp, false).await?;
        let mut msg = self.recv_msg().await?;
        let cap_flags = self.cap_flags;
        match HandshakeMessage::read_with_ctx(&mut msg, &cap_flags)? {
            HandshakeMessage::Ok(_) => Ok(()),
            HandshakeMessage::Err(err) => Err(err.into()),
            HandshakeMessage::Switch(switch) => {
                // only the native plugin is supported, answer the switch
                // with the same scramble against the fresh seed
                log::debug!(
                    "auth switch requested: {}",
                    String::from_utf8_lossy(&switch.plugin_name)
                );
                if &switch.plugin_name[..] != MysqlNativePassword::NAME.as_bytes() {
                    return Err(Error::PacketError(format!(
                        "unsupported auth plugin: {}",
                        String::from_utf8_lossy(&switch.plugin_name)
                    )));
                }
                // the fresh seed is NUL-terminated on the wire
                let seed = match switch.auth_plugin_data.iter().position(|&b| b == 0) {
                    Some(pos) => &switch.auth_plugin_data[..pos],
                    None => &switch.auth_plugin_data[..],
                };
                let mut auth_response = vec![];
                plugin.next(seed, &mut auth_response)?;
                self.send_msg(&auth_response[..], false).await?;
                let mut msg = self.recv_msg().await?;
                match HandshakeMessage::read_with_ctx(&mut msg, &cap_flags)? {
                    HandshakeMessage::Ok(_) => Ok(()),
                    HandshakeMessage::Err(err) => Err(err.into()),
                    HandshakeMessage::Switch(_) => {
                        Err(Error::PacketError("auth switch loop".to_owned()))
                    }
                }
            }
        }
    }

    /// receive one message, concatenating continuation packets
    /// when the payload reaches 2^24-1 bytes
    ///
    /// https://dev.mysql.com/doc/internals/en/sending-more-than-16mbyte.html
    pub async fn recv_msg(&mut self) -> Result<Bytes> {
        let mut out = BytesMut::new();
        loop {
            let mut header = [0u8; 4];
            self.stream.read_exact(&mut header).await?;
            let payload_len =
                header[0] as usize + ((header[1] as usize) << 8) + ((header[2] as usize) << 16);
            let seq_id = header[3];
            if seq_id != self.pkt_nr {
                return Err(Error::PacketError(format!(
                    "server packet out of order: {} != {}",
                    seq_id, self.pkt_nr
                )));
            }
            self.pkt_nr = self.pkt_nr.wrapping_add(1);
            let start = out.len();
            out.resize(start + payload_len, 0);
            self.stream.read_exact(&mut out[start..]).await?;
            if payload_len < 0xffffff {
                break;
            }
        }
        Ok(out.freeze())
    }

    /// send one message, splitting into continuation packets when the
    /// payload is too large; commands reset the sequence id
    pub async fn send_msg<T: WriteToBytes>(&mut self, msg: T, reset_pkt_nr: bool) -> Result<()> {
        let mut buf = BytesMut::new();
        msg.write_to(&mut buf)?;
        let mut bs = buf.freeze();
        if reset_pkt_nr {
            self.pkt_nr = 0;
        }
        loop {
            let chunk_len = usize::min(bs.remaining(), 0xffffff);
            let chunk = bs.split_to(chunk_len);
            let mut header = [0u8; 4];
            header[..3].copy_from_slice(&(chunk_len as u32).to_le_bytes()[..3]);
            header[3] = self.pkt_nr;
            self.pkt_nr = self.pkt_nr.wrapping_add(1);
            self.stream.write_all(&header).await?;
            self.stream.write_all(&chunk).await?;
            // a max-size chunk demands one more packet, even if empty
            if chunk_len < 0xffffff {
                break;
            }
        }
        self.stream.flush().await?;
        Ok(())
    }

    pub fn query(&mut self) -> Query<S> {
        Query::new(self)
    }

    /// say goodbye and drop the connection
    pub async fn close(mut self) -> Result<()> {
        // the server may simply hang up on COM_QUIT, ignore write errors
        let _ = self.send_msg(ComQuit::new(), true).await;
        Ok(())
    }
}
