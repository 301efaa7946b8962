//! Fixed-unit framing over a byte stream.
//!
//! Both directions move data in physical units of exactly [`UNIT_SIZE`]
//! bytes. A request arrives as one unit holding the header and the start of
//! the payload, followed by as many further units as the declared payload
//! needs. A response is cut into units and the last one is zero padded.

use crate::relay::error::{ProtocolError, Result, TransportError};
use crate::relay::protocol::{RequestHeader, Response, REQUEST_HEADER_SIZE};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of every physical read and write
pub const UNIT_SIZE: usize = 1024;

/// Largest request payload the relay will buffer (64 MiB)
pub const MAX_PAYLOAD_SIZE: u32 = 64 * 1024 * 1024;

/// Number of units needed to carry `len` bytes
pub fn unit_count(len: usize) -> usize {
    len.div_ceil(UNIT_SIZE)
}

/// Copy `data` into a buffer padded with zeros to a whole number of units
pub fn pad_to_units(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    out.resize(unit_count(data.len()) * UNIT_SIZE, 0);
    out
}

/// A request lifted off the wire with exactly `header.payload_size` bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRequest {
    pub header: RequestHeader,
    pub payload: Vec<u8>,
}

/// Read the first unit and decode its header.
///
/// The unit may arrive over several reads; reading stops once it is
/// complete or the peer closes. Returns `None` when the peer closed without
/// sending anything. The bytes that followed the header in the same unit are
/// returned as the start of the payload; they may include client padding.
pub async fn read_header<R>(reader: &mut R) -> Result<Option<(RequestHeader, Vec<u8>)>>
where
    R: AsyncRead + Unpin,
{
    let mut unit = vec![0u8; UNIT_SIZE];
    let mut filled = 0;
    while filled < UNIT_SIZE {
        let n = reader
            .read(&mut unit[filled..])
            .await
            .map_err(TransportError::Io)?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    if filled == 0 {
        return Ok(None);
    }
    unit.truncate(filled);

    let header = RequestHeader::decode(&unit)?;
    let rest = unit.split_off(REQUEST_HEADER_SIZE);
    Ok(Some((header, rest)))
}

/// Keep reading units until the declared payload is complete.
///
/// `partial` holds whatever arrived alongside the header. Bytes beyond the
/// declared size are padding and are dropped.
pub async fn read_payload<R>(
    reader: &mut R,
    header: &RequestHeader,
    mut partial: Vec<u8>,
) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    if header.payload_size > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge {
            size: header.payload_size,
            max: MAX_PAYLOAD_SIZE,
        }
        .into());
    }

    let expected = header.payload_size as usize;
    if partial.len() >= expected {
        partial.truncate(expected);
        return Ok(partial);
    }

    partial.reserve(expected - partial.len());
    let mut unit = vec![0u8; UNIT_SIZE];
    while partial.len() < expected {
        let n = reader.read(&mut unit).await.map_err(TransportError::Io)?;
        if n == 0 {
            return Err(TransportError::ConnectionClosed {
                received: partial.len(),
                expected,
            }
            .into());
        }
        let take = n.min(expected - partial.len());
        partial.extend_from_slice(&unit[..take]);
    }

    tracing::trace!("Reassembled payload of {} bytes", expected);
    Ok(partial)
}

/// Read a complete request: header unit plus any continuation units
pub async fn read_request<R>(reader: &mut R) -> Result<Option<RawRequest>>
where
    R: AsyncRead + Unpin,
{
    let Some((header, partial)) = read_header(reader).await? else {
        return Ok(None);
    };
    let payload = read_payload(reader, &header, partial).await?;
    Ok(Some(RawRequest { header, payload }))
}

/// Send `data` as consecutive zero-padded units.
///
/// Stops at the first failed unit. Returns the number of units written.
pub async fn write_units<W>(writer: &mut W, data: &[u8]) -> std::result::Result<usize, TransportError>
where
    W: AsyncWrite + Unpin,
{
    let mut sent = 0;
    for chunk in data.chunks(UNIT_SIZE) {
        let mut unit = [0u8; UNIT_SIZE];
        unit[..chunk.len()].copy_from_slice(chunk);
        writer.write_all(&unit).await?;
        sent += 1;
    }
    writer.flush().await?;
    Ok(sent)
}

/// Encode `response` and send it as padded units
pub async fn write_response<W>(writer: &mut W, response: &Response) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = response.encode()?;
    let units = write_units(writer, &bytes).await?;
    tracing::trace!(
        "Sent response {:?} ({} bytes in {} units)",
        response.code,
        bytes.len(),
        units
    );
    Ok(())
}
