use crate::error::Result;
use crypto::digest::Digest;
use crypto::sha1::Sha1;

/// authentication plugin seam
///
/// modeled on the server's pluggable auth: feed the scramble seed in,
/// get the bytes to answer the handshake with
pub trait AuthPlugin {
    const NAME: &'static str;

    fn set_credential(&mut self, user: &str, password: &str);

    fn next(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MysqlNativePassword {
    password: Vec<u8>,
}

impl MysqlNativePassword {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuthPlugin for MysqlNativePassword {
    const NAME: &'static str = "mysql_native_password";

    fn set_credential(&mut self, _user: &str, password: &str) {
        self.password = Vec::from(password.as_bytes());
    }

    fn next(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()> {
        if self.password.is_empty() {
            return Ok(());
        }
        output.extend(scramble411(&self.password, input));
        Ok(())
    }
}

/// SHA1(password) XOR SHA1(seed + SHA1(SHA1(password)))
fn scramble411(password: &[u8], seed: &[u8]) -> Vec<u8> {
    let mut hasher = Sha1::new();
    let mut stage1 = vec![0u8; 20];
    hasher.input(password);
    hasher.result(&mut stage1);
    hasher.reset();
    let mut stage2 = vec![0u8; 20];
    hasher.input(&stage1);
    hasher.result(&mut stage2);
    hasher.reset();
    let mut seed_hash = vec![0u8; 20];
    hasher.input(seed);
    hasher.input(&stage2);
    hasher.result(&mut seed_hash);
    seed_hash
        .iter()
        .zip(stage1.iter())
        .map(|(b1, b2)| b1 ^ b2)
        .collect()
}
