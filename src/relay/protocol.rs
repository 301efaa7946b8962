//! Binary wire format spoken between relay clients and the server.
//!
//! Every multi-byte integer is little endian and every field has a fixed
//! width. A request is a 23-byte header followed by a code-specific payload:
//!
//! ```text
//! ┌───────────┬─────────┬─────────┬──────────────┬──────────┐
//! │ Client ID │ Version │ Code    │ Payload size │ Payload  │
//! │ 16 bytes  │ u8      │ u16 LE  │ u32 LE       │ N bytes  │
//! └───────────┴─────────┴─────────┴──────────────┴──────────┘
//! ```
//!
//! A response drops the client id and uses a 7-byte header.

use crate::relay::error::ProtocolError;
use std::fmt;
use uuid::Uuid;

/// Version stamped on every response header.
pub const SERVER_VERSION: u8 = 2;
pub const CLIENT_ID_SIZE: usize = 16;
/// Version, code and payload size.
pub const HEADER_SIZE: usize = 7;
pub const REQUEST_HEADER_SIZE: usize = CLIENT_ID_SIZE + HEADER_SIZE;
/// Null-padded name field, so at most 254 name bytes.
pub const NAME_SIZE: usize = 255;
pub const PUBLIC_KEY_SIZE: usize = 160;
pub const MESSAGE_ID_SIZE: usize = 4;
/// Destination id, message type and content size.
pub const MESSAGE_HEADER_SIZE: usize = CLIENT_ID_SIZE + 1 + 4;
/// Source id, message id, message type and content size.
pub const PENDING_HEADER_SIZE: usize = CLIENT_ID_SIZE + MESSAGE_ID_SIZE + 1 + 4;
pub const USER_ENTRY_SIZE: usize = CLIENT_ID_SIZE + NAME_SIZE;

type Result<T> = std::result::Result<T, ProtocolError>;

fn ensure_len(buf: &[u8], needed: usize) -> Result<()> {
    if buf.len() < needed {
        return Err(ProtocolError::Truncated {
            needed,
            got: buf.len(),
        });
    }
    Ok(())
}

#[inline]
fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

#[inline]
fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn payload_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| ProtocolError::PayloadLengthOverflow { size: len })
}

/// Server-issued 16-byte client identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ClientId([u8; CLIENT_ID_SIZE]);

impl ClientId {
    pub const fn from_bytes(bytes: [u8; CLIENT_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Fresh random identifier (UUID v4 bytes)
    pub fn generate() -> Self {
        Self(*Uuid::new_v4().as_bytes())
    }

    /// Read an id from the first 16 bytes of `buf`
    pub fn from_slice(buf: &[u8]) -> Result<Self> {
        ensure_len(buf, CLIENT_ID_SIZE)?;
        let mut id = [0u8; CLIENT_ID_SIZE];
        id.copy_from_slice(&buf[..CLIENT_ID_SIZE]);
        Ok(Self(id))
    }

    pub fn as_bytes(&self) -> &[u8; CLIENT_ID_SIZE] {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Fixed-length client public key, opaque to the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey([u8; PUBLIC_KEY_SIZE]);

impl PublicKey {
    pub const fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(buf: &[u8]) -> Result<Self> {
        ensure_len(buf, PUBLIC_KEY_SIZE)?;
        let mut key = [0u8; PUBLIC_KEY_SIZE];
        key.copy_from_slice(&buf[..PUBLIC_KEY_SIZE]);
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }
}

/// Decode a null-padded name field, stopping at the first null byte.
pub fn decode_name(field: &[u8]) -> Result<String> {
    let field = &field[..field.len().min(NAME_SIZE)];
    let end = field
        .iter()
        .position(|&b| b == 0)
        .ok_or(ProtocolError::UnterminatedName)?;
    Ok(std::str::from_utf8(&field[..end])?.to_string())
}

/// Append `name` as a 255-byte null-padded field. Names longer than 254
/// bytes are cut so the terminator always fits.
pub fn encode_name(name: &str, out: &mut Vec<u8>) {
    let bytes = name.as_bytes();
    let len = bytes.len().min(NAME_SIZE - 1);
    out.extend_from_slice(&bytes[..len]);
    out.resize(out.len() + NAME_SIZE - len, 0);
}

/// Request codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum RequestCode {
    Register = 1000,
    ListUsers = 1001,
    PublicKey = 1002,
    SendMessage = 1003,
    PendingMessages = 1004,
}

impl TryFrom<u16> for RequestCode {
    type Error = ProtocolError;

    fn try_from(code: u16) -> Result<Self> {
        match code {
            1000 => Ok(RequestCode::Register),
            1001 => Ok(RequestCode::ListUsers),
            1002 => Ok(RequestCode::PublicKey),
            1003 => Ok(RequestCode::SendMessage),
            1004 => Ok(RequestCode::PendingMessages),
            other => Err(ProtocolError::UnknownRequestCode(other)),
        }
    }
}

impl From<RequestCode> for u16 {
    fn from(code: RequestCode) -> Self {
        code as u16
    }
}

/// Response codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ResponseCode {
    Registered = 2000,
    UsersList = 2001,
    PublicKey = 2002,
    MessageSent = 2003,
    PendingMessages = 2004,
    /// Catch-all failure, always with an empty payload
    Error = 9000,
}

impl TryFrom<u16> for ResponseCode {
    type Error = ProtocolError;

    fn try_from(code: u16) -> Result<Self> {
        match code {
            2000 => Ok(ResponseCode::Registered),
            2001 => Ok(ResponseCode::UsersList),
            2002 => Ok(ResponseCode::PublicKey),
            2003 => Ok(ResponseCode::MessageSent),
            2004 => Ok(ResponseCode::PendingMessages),
            9000 => Ok(ResponseCode::Error),
            other => Err(ProtocolError::UnknownResponseCode(other)),
        }
    }
}

impl From<ResponseCode> for u16 {
    fn from(code: ResponseCode) -> Self {
        code as u16
    }
}

/// Kind of a relayed message. Zero is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Ask the recipient for a symmetric key; content is empty
    SymmetricKeyRequest = 1,
    /// Symmetric key encrypted with the recipient's public key
    SymmetricKey = 2,
    /// Text encrypted with the shared symmetric key
    Text = 3,
    /// File encrypted with the shared symmetric key
    File = 4,
}

impl TryFrom<u8> for MessageType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(MessageType::SymmetricKeyRequest),
            2 => Ok(MessageType::SymmetricKey),
            3 => Ok(MessageType::Text),
            4 => Ok(MessageType::File),
            other => Err(ProtocolError::InvalidMessageType(other)),
        }
    }
}

impl From<MessageType> for u8 {
    fn from(kind: MessageType) -> Self {
        kind as u8
    }
}

/// Header preceding every request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub client_id: ClientId,
    pub version: u8,
    pub code: u16,
    pub payload_size: u32,
}

impl RequestHeader {
    pub fn new(client_id: ClientId, code: RequestCode, payload_size: u32) -> Self {
        Self {
            client_id,
            version: SERVER_VERSION,
            code: code.into(),
            payload_size,
        }
    }

    pub fn encode(&self) -> [u8; REQUEST_HEADER_SIZE] {
        let mut buf = [0u8; REQUEST_HEADER_SIZE];
        buf[..CLIENT_ID_SIZE].copy_from_slice(self.client_id.as_bytes());
        buf[16] = self.version;
        buf[17..19].copy_from_slice(&self.code.to_le_bytes());
        buf[19..23].copy_from_slice(&self.payload_size.to_le_bytes());
        buf
    }

    /// Decode from the start of `buf`; anything after the header is ignored.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        ensure_len(buf, REQUEST_HEADER_SIZE)?;
        Ok(Self {
            client_id: ClientId::from_slice(buf)?,
            version: buf[16],
            code: read_u16(buf, 17),
            payload_size: read_u32(buf, 19),
        })
    }
}

/// Header preceding every response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub version: u8,
    pub code: u16,
    pub payload_size: u32,
}

impl ResponseHeader {
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0] = self.version;
        buf[1..3].copy_from_slice(&self.code.to_le_bytes());
        buf[3..7].copy_from_slice(&self.payload_size.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        ensure_len(buf, HEADER_SIZE)?;
        Ok(Self {
            version: buf[0],
            code: read_u16(buf, 1),
            payload_size: read_u32(buf, 3),
        })
    }
}

/// Decoded request payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Header client id is ignored
    Register { name: String, public_key: PublicKey },
    ListUsers,
    /// Fetch the key of `client_id`
    PublicKey { client_id: ClientId },
    /// Queue `content` for `to`
    SendMessage {
        to: ClientId,
        kind: MessageType,
        content: Vec<u8>,
    },
    PendingMessages,
}

impl Request {
    pub fn code(&self) -> RequestCode {
        match self {
            Request::Register { .. } => RequestCode::Register,
            Request::ListUsers => RequestCode::ListUsers,
            Request::PublicKey { .. } => RequestCode::PublicKey,
            Request::SendMessage { .. } => RequestCode::SendMessage,
            Request::PendingMessages => RequestCode::PendingMessages,
        }
    }

    /// Decode the payload that followed a header carrying `code`.
    ///
    /// Bytes past the fields a request defines are treated as padding.
    pub fn decode(code: RequestCode, payload: &[u8]) -> Result<Self> {
        match code {
            RequestCode::Register => {
                ensure_len(payload, NAME_SIZE + PUBLIC_KEY_SIZE)?;
                Ok(Request::Register {
                    name: decode_name(&payload[..NAME_SIZE])?,
                    public_key: PublicKey::from_slice(&payload[NAME_SIZE..])?,
                })
            }
            RequestCode::ListUsers => Ok(Request::ListUsers),
            RequestCode::PublicKey => Ok(Request::PublicKey {
                client_id: ClientId::from_slice(payload)?,
            }),
            RequestCode::SendMessage => {
                ensure_len(payload, MESSAGE_HEADER_SIZE)?;
                let to = ClientId::from_slice(payload)?;
                let kind = MessageType::try_from(payload[CLIENT_ID_SIZE])?;
                let declared = read_u32(payload, CLIENT_ID_SIZE + 1);
                let available = payload.len() - MESSAGE_HEADER_SIZE;
                if declared as usize > available {
                    return Err(ProtocolError::ContentSizeMismatch {
                        declared,
                        available,
                    });
                }
                let start = MESSAGE_HEADER_SIZE;
                Ok(Request::SendMessage {
                    to,
                    kind,
                    content: payload[start..start + declared as usize].to_vec(),
                })
            }
            RequestCode::PendingMessages => Ok(Request::PendingMessages),
        }
    }

    pub fn encode_payload(&self) -> Vec<u8> {
        match self {
            Request::Register { name, public_key } => {
                let mut out = Vec::with_capacity(NAME_SIZE + PUBLIC_KEY_SIZE);
                encode_name(name, &mut out);
                out.extend_from_slice(public_key.as_bytes());
                out
            }
            Request::PublicKey { client_id } => client_id.as_bytes().to_vec(),
            Request::SendMessage { to, kind, content } => {
                let mut out = Vec::with_capacity(MESSAGE_HEADER_SIZE + content.len());
                out.extend_from_slice(to.as_bytes());
                out.push((*kind).into());
                out.extend_from_slice(&(content.len() as u32).to_le_bytes());
                out.extend_from_slice(content);
                out
            }
            Request::ListUsers | Request::PendingMessages => Vec::new(),
        }
    }

    /// Full request bytes: header for `client_id` followed by the payload
    pub fn encode(&self, client_id: ClientId) -> Vec<u8> {
        let payload = self.encode_payload();
        let header = RequestHeader::new(client_id, self.code(), payload.len() as u32);
        let mut out = Vec::with_capacity(REQUEST_HEADER_SIZE + payload.len());
        out.extend_from_slice(&header.encode());
        out.extend_from_slice(&payload);
        out
    }
}

/// One entry of a users-list payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntry {
    pub id: ClientId,
    pub name: String,
}

impl UserEntry {
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.id.as_bytes());
        encode_name(&self.name, out);
    }

    /// Split a users-list payload into its entries
    pub fn decode_all(payload: &[u8]) -> Result<Vec<Self>> {
        if payload.len() % USER_ENTRY_SIZE != 0 {
            return Err(ProtocolError::Truncated {
                needed: (payload.len() / USER_ENTRY_SIZE + 1) * USER_ENTRY_SIZE,
                got: payload.len(),
            });
        }
        payload
            .chunks_exact(USER_ENTRY_SIZE)
            .map(|entry| -> Result<Self> {
                Ok(UserEntry {
                    id: ClientId::from_slice(entry)?,
                    name: decode_name(&entry[CLIENT_ID_SIZE..])?,
                })
            })
            .collect()
    }
}

/// One queued message inside a pending-messages payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRecord {
    pub from: ClientId,
    pub message_id: u32,
    pub kind: MessageType,
    pub content: Vec<u8>,
}

impl PendingRecord {
    pub fn encoded_len(&self) -> usize {
        PENDING_HEADER_SIZE + self.content.len()
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.from.as_bytes());
        out.extend_from_slice(&self.message_id.to_le_bytes());
        out.push(self.kind.into());
        out.extend_from_slice(&(self.content.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.content);
    }

    /// Split a pending-messages payload into its records
    pub fn decode_all(mut payload: &[u8]) -> Result<Vec<Self>> {
        let mut records = Vec::new();
        while !payload.is_empty() {
            ensure_len(payload, PENDING_HEADER_SIZE)?;
            let from = ClientId::from_slice(payload)?;
            let message_id = read_u32(payload, CLIENT_ID_SIZE);
            let kind = MessageType::try_from(payload[CLIENT_ID_SIZE + MESSAGE_ID_SIZE])?;
            let size = read_u32(payload, CLIENT_ID_SIZE + MESSAGE_ID_SIZE + 1) as usize;
            ensure_len(payload, PENDING_HEADER_SIZE + size)?;
            let content = payload[PENDING_HEADER_SIZE..PENDING_HEADER_SIZE + size].to_vec();
            records.push(PendingRecord {
                from,
                message_id,
                kind,
                content,
            });
            payload = &payload[PENDING_HEADER_SIZE + size..];
        }
        Ok(records)
    }
}

/// Logical response: a code plus its payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: ResponseCode,
    pub payload: Vec<u8>,
}

impl Response {
    pub fn registered(id: ClientId) -> Self {
        Self {
            code: ResponseCode::Registered,
            payload: id.as_bytes().to_vec(),
        }
    }

    pub fn users(entries: &[UserEntry]) -> Self {
        let mut payload = Vec::with_capacity(entries.len() * USER_ENTRY_SIZE);
        for entry in entries {
            entry.encode_into(&mut payload);
        }
        Self {
            code: ResponseCode::UsersList,
            payload,
        }
    }

    pub fn public_key(id: ClientId, key: &PublicKey) -> Self {
        let mut payload = Vec::with_capacity(CLIENT_ID_SIZE + PUBLIC_KEY_SIZE);
        payload.extend_from_slice(id.as_bytes());
        payload.extend_from_slice(key.as_bytes());
        Self {
            code: ResponseCode::PublicKey,
            payload,
        }
    }

    pub fn message_sent(to: ClientId, message_id: u32) -> Self {
        let mut payload = Vec::with_capacity(CLIENT_ID_SIZE + MESSAGE_ID_SIZE);
        payload.extend_from_slice(to.as_bytes());
        payload.extend_from_slice(&message_id.to_le_bytes());
        Self {
            code: ResponseCode::MessageSent,
            payload,
        }
    }

    pub fn pending(records: &[PendingRecord]) -> Self {
        let total = records.iter().map(PendingRecord::encoded_len).sum();
        let mut payload = Vec::with_capacity(total);
        for record in records {
            record.encode_into(&mut payload);
        }
        Self {
            code: ResponseCode::PendingMessages,
            payload,
        }
    }

    /// The generic error response (code 9000, empty payload)
    pub fn error() -> Self {
        Self {
            code: ResponseCode::Error,
            payload: Vec::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.code == ResponseCode::Error
    }

    /// Header plus payload, ready for the frame transport
    pub fn encode(&self) -> Result<Vec<u8>> {
        let header = ResponseHeader {
            version: SERVER_VERSION,
            code: self.code.into(),
            payload_size: payload_len(self.payload.len())?,
        };
        let mut out = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        out.extend_from_slice(&header.encode());
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    /// Decode a response, ignoring any padding past the declared payload
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let header = ResponseHeader::decode(buf)?;
        let end = HEADER_SIZE + header.payload_size as usize;
        ensure_len(buf, end)?;
        Ok(Self {
            code: ResponseCode::try_from(header.code)?,
            payload: buf[HEADER_SIZE..end].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(seed: u8) -> ClientId {
        ClientId::from_bytes([seed; CLIENT_ID_SIZE])
    }

    #[test]
    fn test_payload_length_overflow_reports_size() {
        assert_eq!(payload_len(1024).unwrap(), 1024);

        let too_big = u32::MAX as usize + 1;
        assert!(matches!(
            payload_len(too_big),
            Err(ProtocolError::PayloadLengthOverflow { size }) if size == too_big
        ));
    }

    #[test]
    fn test_request_header_roundtrip() {
        let header = RequestHeader {
            client_id: ClientId::generate(),
            version: 7,
            code: 1003,
            payload_size: 0xDEAD_BEEF,
        };
        let bytes = header.encode();
        assert_eq!(bytes.len(), REQUEST_HEADER_SIZE);
        assert_eq!(RequestHeader::decode(&bytes).unwrap(), header);
    }

    #[test]
    fn test_request_header_little_endian_layout() {
        let header = RequestHeader::new(id(0xAA), RequestCode::Register, 415);
        let bytes = header.encode();
        assert_eq!(&bytes[..16], &[0xAA; 16]);
        assert_eq!(bytes[16], SERVER_VERSION);
        // 1000 = 0x03E8
        assert_eq!(&bytes[17..19], &[0xE8, 0x03]);
        // 415 = 0x019F
        assert_eq!(&bytes[19..23], &[0x9F, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_request_header_too_short() {
        let bytes = [0u8; REQUEST_HEADER_SIZE - 1];
        assert!(matches!(
            RequestHeader::decode(&bytes),
            Err(ProtocolError::Truncated { needed: 23, got: 22 })
        ));
    }

    #[test]
    fn test_response_header_roundtrip() {
        let header = ResponseHeader {
            version: SERVER_VERSION,
            code: 2004,
            payload_size: 1_000_000,
        };
        assert_eq!(ResponseHeader::decode(&header.encode()).unwrap(), header);
    }

    #[test]
    fn test_error_response_bytes() {
        let bytes = Response::error().encode().unwrap();
        // 9000 = 0x2328
        assert_eq!(bytes, vec![SERVER_VERSION, 0x28, 0x23, 0, 0, 0, 0]);
    }

    #[test]
    fn test_name_field_has_no_trailing_nulls() {
        for len in [1usize, 10, 254] {
            let name = "a".repeat(len);
            let mut field = Vec::new();
            encode_name(&name, &mut field);
            assert_eq!(field.len(), NAME_SIZE);
            assert_eq!(decode_name(&field).unwrap(), name);
        }
    }

    #[test]
    fn test_name_without_terminator_rejected() {
        let field = [b'x'; NAME_SIZE];
        assert!(matches!(
            decode_name(&field),
            Err(ProtocolError::UnterminatedName)
        ));
    }

    #[test]
    fn test_name_invalid_utf8_rejected() {
        let mut field = vec![0xFF, 0xFE, 0x00];
        field.resize(NAME_SIZE, 0);
        assert!(matches!(
            decode_name(&field),
            Err(ProtocolError::NameEncoding(_))
        ));
    }

    #[test]
    fn test_register_request_decode() {
        let key = PublicKey::from_bytes([7u8; PUBLIC_KEY_SIZE]);
        let request = Request::Register {
            name: "alice".to_string(),
            public_key: key,
        };
        let payload = request.encode_payload();
        assert_eq!(payload.len(), NAME_SIZE + PUBLIC_KEY_SIZE);

        let decoded = Request::decode(RequestCode::Register, &payload).unwrap();
        assert_eq!(decoded, request);

        assert!(Request::decode(RequestCode::Register, &payload[..300]).is_err());
    }

    #[test]
    fn test_send_message_decode_ignores_padding() {
        let request = Request::SendMessage {
            to: id(3),
            kind: MessageType::Text,
            content: b"hello".to_vec(),
        };
        let mut payload = request.encode_payload();
        payload.extend_from_slice(&[0u8; 64]);

        let decoded = Request::decode(RequestCode::SendMessage, &payload).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_send_message_content_size_mismatch() {
        let mut payload = Vec::new();
        payload.extend_from_slice(id(3).as_bytes());
        payload.push(MessageType::File.into());
        payload.extend_from_slice(&100u32.to_le_bytes());
        payload.extend_from_slice(&[1, 2, 3]);

        assert!(matches!(
            Request::decode(RequestCode::SendMessage, &payload),
            Err(ProtocolError::ContentSizeMismatch {
                declared: 100,
                available: 3
            })
        ));
    }

    #[test]
    fn test_send_message_reserved_type_rejected() {
        let mut payload = Vec::new();
        payload.extend_from_slice(id(3).as_bytes());
        payload.push(0);
        payload.extend_from_slice(&0u32.to_le_bytes());

        assert!(matches!(
            Request::decode(RequestCode::SendMessage, &payload),
            Err(ProtocolError::InvalidMessageType(0))
        ));
    }

    #[test]
    fn test_unknown_request_code() {
        assert!(matches!(
            RequestCode::try_from(1005),
            Err(ProtocolError::UnknownRequestCode(1005))
        ));
        assert_eq!(RequestCode::try_from(1004).unwrap(), RequestCode::PendingMessages);
    }

    #[test]
    fn test_users_payload_layout() {
        let entries = vec![
            UserEntry {
                id: id(1),
                name: "bob".to_string(),
            },
            UserEntry {
                id: id(2),
                name: "carol".to_string(),
            },
        ];
        let response = Response::users(&entries);
        assert_eq!(response.payload.len(), 2 * USER_ENTRY_SIZE);
        assert_eq!(&response.payload[16..19], b"bob");
        assert_eq!(response.payload[19], 0);
        assert_eq!(UserEntry::decode_all(&response.payload).unwrap(), entries);
    }

    #[test]
    fn test_pending_payload_layout() {
        let records = vec![
            PendingRecord {
                from: id(9),
                message_id: 1,
                kind: MessageType::SymmetricKeyRequest,
                content: Vec::new(),
            },
            PendingRecord {
                from: id(8),
                message_id: 0x0102_0304,
                kind: MessageType::Text,
                content: b"hi".to_vec(),
            },
        ];
        let response = Response::pending(&records);
        assert_eq!(response.payload.len(), 2 * PENDING_HEADER_SIZE + 2);

        let second = &response.payload[PENDING_HEADER_SIZE..];
        assert_eq!(&second[16..20], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(second[20], 3);
        assert_eq!(&second[21..25], &[2, 0, 0, 0]);
        assert_eq!(&second[25..], b"hi");

        assert_eq!(PendingRecord::decode_all(&response.payload).unwrap(), records);
    }

    #[test]
    fn test_response_decode_ignores_padding() {
        let response = Response::message_sent(id(4), 42);
        let mut bytes = response.encode().unwrap();
        bytes.resize(1024, 0);
        assert_eq!(Response::decode(&bytes).unwrap(), response);
    }
}
