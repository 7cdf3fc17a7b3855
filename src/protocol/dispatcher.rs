use crate::error::{constants, MuxError, Result};

/// Maps a decoded payload to the identifier of the handler that should
/// receive it.
///
/// Any `Fn(&[u8]) -> Result<String>` closure is a dispatcher.
pub trait Dispatcher: Send + Sync + 'static {
    fn identify(&self, payload: &[u8]) -> Result<String>;
}

impl<F> Dispatcher for F
where
    F: Fn(&[u8]) -> Result<String> + Send + Sync + 'static,
{
    fn identify(&self, payload: &[u8]) -> Result<String> {
        self(payload)
    }
}

/// Routes every packet to one identifier.
#[derive(Debug, Clone)]
pub struct StaticDispatcher {
    identifier: String,
}

impl StaticDispatcher {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }
}

impl Dispatcher for StaticDispatcher {
    #[inline]
    fn identify(&self, _payload: &[u8]) -> Result<String> {
        Ok(self.identifier.clone())
    }
}

/// Reads the identifier from a header: the bytes before the first
/// `delimiter`, which must be non-empty UTF-8.
///
/// `b"chat|hello"` routes to `"chat"` with the default `|` delimiter.
#[derive(Debug, Clone, Copy)]
pub struct PrefixDispatcher {
    delimiter: u8,
}

impl Default for PrefixDispatcher {
    fn default() -> Self {
        Self::new(b'|')
    }
}

impl PrefixDispatcher {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }
}

impl Dispatcher for PrefixDispatcher {
    fn identify(&self, payload: &[u8]) -> Result<String> {
        let end = payload
            .iter()
            .position(|b| *b == self.delimiter)
            .ok_or_else(|| MuxError::UnidentifiedPacket(constants::ERR_MISSING_DELIMITER.into()))?;

        if end == 0 {
            return Err(MuxError::UnidentifiedPacket(
                constants::ERR_EMPTY_IDENTIFIER.into(),
            ));
        }

        std::str::from_utf8(&payload[..end])
            .map(str::to_string)
            .map_err(|_| MuxError::UnidentifiedPacket(constants::ERR_INVALID_IDENTIFIER.into()))
    }
}
