// Request dispatch: one handler per request kind

use crate::relay::error::{ProtocolError, Result};
use crate::relay::protocol::{
    ClientId, MessageType, PendingRecord, PublicKey, Request, RequestCode, RequestHeader,
    Response, NAME_SIZE,
};
use crate::relay::storage::{ClientRecord, NewMessage, RelayStore};
use crate::relay::transport::RawRequest;
use std::time::SystemTime;

/// What a handled request produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub response: Response,
    /// Messages to delete once the response has reached the client
    pub delivered: Vec<u32>,
}

impl Outcome {
    fn reply(response: Response) -> Self {
        Self {
            response,
            delivered: Vec::new(),
        }
    }
}

/// Routes decoded requests to their handlers against a store
pub struct Dispatcher<S> {
    store: S,
}

impl<S: RelayStore> Dispatcher<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Best-effort LastSeen refresh for the sender of `header`
    pub fn touch(&self, header: &RequestHeader) {
        match self.store.touch_last_seen(&header.client_id, SystemTime::now()) {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("LastSeen not refreshed: {} is not registered", header.client_id)
            }
            Err(e) => tracing::debug!("LastSeen refresh for {} failed: {}", header.client_id, e),
        }
    }

    /// Decode and run one request
    pub fn dispatch(&self, raw: &RawRequest) -> Result<Outcome> {
        let code = RequestCode::try_from(raw.header.code)?;
        let request = Request::decode(code, &raw.payload)?;
        let sender = raw.header.client_id;

        tracing::info!("Handling {:?} from {}", code, sender);

        match request {
            Request::Register { name, public_key } => {
                register(&self.store, name, public_key).map(Outcome::reply)
            }
            Request::ListUsers => list_users(&self.store, sender).map(Outcome::reply),
            Request::PublicKey { client_id } => {
                public_key(&self.store, sender, client_id).map(Outcome::reply)
            }
            Request::SendMessage { to, kind, content } => {
                send_message(&self.store, sender, to, kind, content).map(Outcome::reply)
            }
            Request::PendingMessages => pending_messages(&self.store, sender),
        }
    }

    /// Like [`dispatch`](Self::dispatch) but any failure becomes the generic
    /// error response
    pub fn handle(&self, raw: &RawRequest) -> Outcome {
        match self.dispatch(raw) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(
                    "Request {} from {} failed: {}",
                    raw.header.code,
                    raw.header.client_id,
                    e
                );
                Outcome::reply(Response::error())
            }
        }
    }

    /// Delete messages that were delivered. Returns how many were removed.
    pub fn acknowledge(&self, delivered: &[u32]) -> usize {
        let mut removed = 0;
        for &id in delivered {
            match self.store.delete_message(id) {
                Ok(true) => removed += 1,
                Ok(false) => tracing::warn!("Delivered message {} was already gone", id),
                Err(e) => tracing::error!("Failed to delete delivered message {}: {}", id, e),
            }
        }
        removed
    }
}

fn valid_name(name: &str) -> bool {
    !name.is_empty() && name.len() < NAME_SIZE && name.bytes().all(|b| b.is_ascii_alphanumeric())
}

fn ensure_registered<S: RelayStore>(store: &S, id: ClientId) -> Result<()> {
    if !store.client_exists(&id)? {
        return Err(ProtocolError::UnknownClient(id.to_string()).into());
    }
    Ok(())
}

fn register<S: RelayStore>(store: &S, name: String, public_key: PublicKey) -> Result<Response> {
    if !valid_name(&name) {
        return Err(ProtocolError::InvalidName(name).into());
    }
    if store.username_exists(&name)? {
        return Err(ProtocolError::NameTaken(name).into());
    }

    let record = ClientRecord {
        id: ClientId::generate(),
        name,
        public_key,
        last_seen: SystemTime::now(),
    };
    store.create_client(&record)?;

    tracing::info!("Registered {:?} as {}", record.name, record.id);
    Ok(Response::registered(record.id))
}

fn list_users<S: RelayStore>(store: &S, requester: ClientId) -> Result<Response> {
    ensure_registered(store, requester)?;

    let others: Vec<_> = store
        .client_list()?
        .into_iter()
        .filter(|entry| entry.id != requester)
        .collect();

    tracing::debug!("Listing {} users for {}", others.len(), requester);
    Ok(Response::users(&others))
}

fn public_key<S: RelayStore>(store: &S, requester: ClientId, target: ClientId) -> Result<Response> {
    ensure_registered(store, requester)?;

    let key = store
        .public_key(&target)?
        .ok_or_else(|| ProtocolError::UnknownClient(target.to_string()))?;
    Ok(Response::public_key(target, &key))
}

fn send_message<S: RelayStore>(
    store: &S,
    from: ClientId,
    to: ClientId,
    kind: MessageType,
    content: Vec<u8>,
) -> Result<Response> {
    ensure_registered(store, from)?;
    ensure_registered(store, to)?;

    let size = content.len();
    let message_id = store.enqueue_message(&NewMessage {
        to,
        from,
        kind,
        content,
    })?;

    tracing::info!(
        "Queued message {} ({:?}, {} bytes) from {} to {}",
        message_id,
        kind,
        size,
        from,
        to
    );
    Ok(Response::message_sent(to, message_id))
}

fn pending_messages<S: RelayStore>(store: &S, requester: ClientId) -> Result<Outcome> {
    ensure_registered(store, requester)?;

    let pending = store.pending_messages(&requester)?;
    let delivered = pending.iter().map(|m| m.id).collect();
    let records: Vec<_> = pending
        .into_iter()
        .map(|m| PendingRecord {
            from: m.from,
            message_id: m.id,
            kind: m.kind,
            content: m.content,
        })
        .collect();

    tracing::debug!("Delivering {} pending messages to {}", records.len(), requester);
    Ok(Outcome {
        response: Response::pending(&records),
        delivered,
    })
}
