//! Lock/key challenge-response handshake.
//!
//! The responder sends a `$Lock`, the initiator answers with the `$Key`
//! derived from the lock's challenge:
//!
//! ```text
//! Responder: SendLock -> AwaitKey -> Authenticated | Failed
//! Initiator: AwaitLock -> SendKey -> Authenticated | Failed
//! ```
//!
//! A handshake attempt is single-shot: the first protocol violation is
//! terminal. The key transform itself sits behind [`KeyDerivation`].

use rand::distr::Alphanumeric;
use rand::Rng;

use crate::error::{AutoregError, AutoregResult};
use crate::framing::DELIMITER;

/// Prefix of the lock command, including the separating space.
pub const LOCK_MARKER: &[u8] = b"$Lock ";

/// Prefix of the key command, including the separating space.
pub const KEY_MARKER: &[u8] = b"$Key ";

/// Challenge used by [`LockChallenge::default`].
pub const DEFAULT_CHALLENGE: &str = "hubAutoReg";

const PK_SEPARATOR: &str = " Pk=";

/// Bytes that cannot appear verbatim inside a key on the wire.
const DCN_RESERVED: [u8; 6] = [0, 5, 36, 96, 124, 126];

/// Identifier of this implementation, sent as the lock's party key.
pub fn default_party_key() -> String {
    format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// A lock challenge plus the sender's party key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lock {
    pub challenge: String,
    pub party_key: String,
}

impl Lock {
    pub fn new(challenge: impl Into<String>, party_key: impl Into<String>) -> Self {
        Self {
            challenge: challenge.into(),
            party_key: party_key.into(),
        }
    }

    /// Encode to `<challenge> Pk=<party-key>`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.challenge.as_bytes().to_vec();
        if !self.party_key.is_empty() {
            out.extend_from_slice(PK_SEPARATOR.as_bytes());
            out.extend_from_slice(self.party_key.as_bytes());
        }
        out
    }

    /// Decode the payload that follows the `$Lock ` marker.
    pub fn decode(data: &[u8]) -> AutoregResult<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| AutoregError::malformed("lock is not valid UTF-8"))?;
        let (challenge, party_key) = text.split_once(PK_SEPARATOR).unwrap_or((text, ""));
        if challenge.is_empty() {
            return Err(AutoregError::malformed("empty lock challenge"));
        }
        if challenge.contains(' ') {
            return Err(AutoregError::malformed(format!(
                "lock challenge contains a space: {:?}",
                challenge
            )));
        }
        Ok(Self::new(challenge, party_key))
    }

    /// Parse a full `$Lock ...` token (delimiter already stripped).
    pub fn from_command(token: &[u8]) -> AutoregResult<Self> {
        let payload = token.strip_prefix(LOCK_MARKER).ok_or_else(|| {
            AutoregError::malformed(format!(
                "expected $Lock, got: {:?}",
                String::from_utf8_lossy(token)
            ))
        })?;
        Self::decode(payload)
    }

    /// The delimited `$Lock` command.
    pub fn to_command(&self) -> Vec<u8> {
        let mut out = LOCK_MARKER.to_vec();
        out.extend_from_slice(&self.encode());
        out.push(DELIMITER);
        out
    }
}

/// A key derived from a lock challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key(pub Vec<u8>);

impl Key {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Wire form, with reserved bytes written as `/%DCNnnn%/`.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.0.len());
        for &b in &self.0 {
            if DCN_RESERVED.contains(&b) {
                out.extend_from_slice(format!("/%DCN{:03}%/", b).as_bytes());
            } else {
                out.push(b);
            }
        }
        out
    }

    /// Reverse of [`Key::to_wire`].
    pub fn from_wire(data: &[u8]) -> AutoregResult<Self> {
        let mut out = Vec::with_capacity(data.len());
        let mut i = 0;
        while i < data.len() {
            let rest = &data[i..];
            if rest.starts_with(b"/%DCN") {
                let escape = rest.get(..10).filter(|e| e.ends_with(b"%/")).ok_or_else(|| {
                    AutoregError::malformed("truncated /%DCN escape in key")
                })?;
                let digits = std::str::from_utf8(&escape[5..8])
                    .ok()
                    .and_then(|d| d.parse::<u8>().ok())
                    .ok_or_else(|| AutoregError::malformed("invalid /%DCN escape in key"))?;
                out.push(digits);
                i += escape.len();
            } else {
                out.push(data[i]);
                i += 1;
            }
        }
        Ok(Key(out))
    }

    /// Parse a full `$Key ...` token (delimiter already stripped).
    pub fn from_command(token: &[u8]) -> AutoregResult<Self> {
        let payload = token
            .strip_prefix(KEY_MARKER)
            .ok_or_else(|| AutoregError::malformed("expected $Key"))?;
        Self::from_wire(payload)
    }

    /// The delimited `$Key` command.
    pub fn to_command(&self) -> Vec<u8> {
        let mut out = KEY_MARKER.to_vec();
        out.extend_from_slice(&self.to_wire());
        out.push(DELIMITER);
        out
    }
}

/// Transform from a lock challenge to the matching key.
pub trait KeyDerivation: Send + Sync {
    fn derive_key(&self, challenge: &[u8]) -> Key;
}

/// The conventional NMDC lock-to-key transform.
#[derive(Debug, Clone, Copy, Default)]
pub struct NmdcKeyDerivation;

impl KeyDerivation for NmdcKeyDerivation {
    fn derive_key(&self, lock: &[u8]) -> Key {
        let n = lock.len();
        if n == 0 {
            return Key(Vec::new());
        }
        let mut key = vec![0u8; n];
        key[0] = lock[0] ^ lock[n - 1] ^ lock[n.saturating_sub(2)] ^ 5;
        for (k, pair) in key[1..].iter_mut().zip(lock.windows(2)) {
            *k = pair[0] ^ pair[1];
        }
        for b in &mut key {
            *b = b.rotate_left(4);
        }
        Key(key)
    }
}

/// Policy for the challenge a responder puts in its lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockChallenge {
    /// The same challenge on every connection.
    Fixed(String),
    /// A fresh alphanumeric challenge of the given length per connection.
    Random { len: usize },
}

impl Default for LockChallenge {
    fn default() -> Self {
        LockChallenge::Fixed(DEFAULT_CHALLENGE.to_string())
    }
}

impl LockChallenge {
    pub fn generate(&self) -> String {
        match self {
            LockChallenge::Fixed(challenge) => challenge.clone(),
            LockChallenge::Random { len } => rand::rng()
                .sample_iter(&Alphanumeric)
                .take((*len).max(2))
                .map(char::from)
                .collect(),
        }
    }
}

/// Position in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    SendLock,
    AwaitKey,
    AwaitLock,
    SendKey,
    Authenticated,
    Failed,
}

/// The side that issues the lock and checks the key.
pub struct Responder<'a> {
    lock: Lock,
    derivation: &'a dyn KeyDerivation,
    state: HandshakeState,
}

impl<'a> Responder<'a> {
    pub fn new(lock: Lock, derivation: &'a dyn KeyDerivation) -> Self {
        Self {
            lock,
            derivation,
            state: HandshakeState::SendLock,
        }
    }

    pub fn lock(&self) -> &Lock {
        &self.lock
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Produce the `$Lock` command to send and start waiting for the key.
    pub fn lock_command(&mut self) -> Vec<u8> {
        self.state = HandshakeState::AwaitKey;
        self.lock.to_command()
    }

    /// Check the peer's `$Key` token against the sent lock.
    pub fn verify(&mut self, token: &[u8]) -> AutoregResult<()> {
        if self.state != HandshakeState::AwaitKey {
            self.state = HandshakeState::Failed;
            return Err(AutoregError::malformed("key received before lock was sent"));
        }
        // Only the canonical wire form of the derived key is accepted.
        let result = match token.strip_prefix(KEY_MARKER) {
            None => Err(AutoregError::malformed("expected $Key")),
            Some(payload) => {
                let expected = self.derivation.derive_key(self.lock.challenge.as_bytes());
                if payload == expected.to_wire().as_slice() {
                    Ok(())
                } else {
                    Err(AutoregError::AuthenticationFailed)
                }
            }
        };
        self.state = match result {
            Ok(()) => HandshakeState::Authenticated,
            Err(_) => HandshakeState::Failed,
        };
        result
    }
}

/// The side that answers a lock with a key.
pub struct Initiator<'a> {
    derivation: &'a dyn KeyDerivation,
    state: HandshakeState,
}

impl<'a> Initiator<'a> {
    pub fn new(derivation: &'a dyn KeyDerivation) -> Self {
        Self {
            derivation,
            state: HandshakeState::AwaitLock,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Parse the peer's `$Lock` token and derive the `$Key` command.
    pub fn answer(&mut self, token: &[u8]) -> AutoregResult<(Lock, Vec<u8>)> {
        if self.state != HandshakeState::AwaitLock {
            self.state = HandshakeState::Failed;
            return Err(AutoregError::malformed("lock already answered"));
        }
        match Lock::from_command(token) {
            Ok(lock) => {
                let key = self.derivation.derive_key(lock.challenge.as_bytes());
                self.state = HandshakeState::SendKey;
                Ok((lock, key.to_command()))
            }
            Err(e) => {
                self.state = HandshakeState::Failed;
                Err(e)
            }
        }
    }

    /// Mark the key as delivered.
    pub fn key_sent(&mut self) {
        if self.state == HandshakeState::SendKey {
            self.state = HandshakeState::Authenticated;
        }
    }
}
