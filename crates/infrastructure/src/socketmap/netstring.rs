//! Netstring framing for the socket-map protocol:
//! `<decimal-length>:<payload>,`.
//!
//! The grammar is strict: the length must be decimal with no leading zero
//! (unless it is exactly `0`), followed by `:`, exactly `length` payload
//! bytes and the literal `,`. Anything else is a protocol error and the
//! connection is torn down.

use tlspol_domain::TlspolError;
use tokio::io::{AsyncBufRead, AsyncReadExt};

/// Upper bound on a single frame's payload. Requests are one short command
/// line; anything larger is an abuse of the socket.
pub const MAX_FRAME_LEN: usize = 65_536;

pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 8);
    out.extend_from_slice(payload.len().to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(payload);
    out.push(b',');
    out
}

/// Read one frame. `Ok(None)` means the peer closed the stream cleanly at a
/// frame boundary; mid-frame EOF and grammar violations are errors.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, TlspolError>
where
    R: AsyncBufRead + Unpin,
{
    let mut length: usize = 0;
    let mut digits = 0usize;
    loop {
        let mut byte = [0u8; 1];
        match reader.read_exact(&mut byte).await {
            Ok(_) => {}
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof && digits == 0 => {
                return Ok(None);
            }
            Err(_) => {
                return Err(TlspolError::Protocol("netstring: unexpected EOF".into()));
            }
        }
        match byte[0] {
            b':' => {
                if digits == 0 {
                    return Err(TlspolError::Protocol("netstring: empty length".into()));
                }
                break;
            }
            b @ b'0'..=b'9' => {
                if digits > 0 && length == 0 {
                    return Err(TlspolError::Protocol(
                        "netstring: leading zero in length".into(),
                    ));
                }
                length = length * 10 + (b - b'0') as usize;
                digits += 1;
                if length > MAX_FRAME_LEN {
                    return Err(TlspolError::Protocol("netstring: frame too large".into()));
                }
            }
            _ => {
                return Err(TlspolError::Protocol(
                    "netstring: invalid length character".into(),
                ));
            }
        }
    }

    let mut payload = vec![0u8; length];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|_| TlspolError::Protocol("netstring: unexpected EOF".into()))?;

    let mut terminator = [0u8; 1];
    reader
        .read_exact(&mut terminator)
        .await
        .map_err(|_| TlspolError::Protocol("netstring: unexpected EOF".into()))?;
    if terminator[0] != b',' {
        return Err(TlspolError::Protocol(
            "netstring: missing comma terminator".into(),
        ));
    }

    Ok(Some(payload))
}
