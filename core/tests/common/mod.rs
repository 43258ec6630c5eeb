//! In-process transport whose responses the test releases by hand.
//!
//! Each request the synchronizer issues shows up on `Remote::next` as a
//! `Call`. The synchronizer's future stays suspended until the test answers
//! that call, so tests decide exactly when and in which order responses
//! arrive.

#![allow(dead_code)]

use listsync_core::{
    HttpRequest, HttpResponse, Item, ItemClient, ListState, ListSynchronizer, Transport, TransportError,
};
use tokio::sync::{mpsc, oneshot, watch};

pub const BASE_URL: &str = "http://api.test";

pub struct Call {
    pub request: HttpRequest,
    reply: oneshot::Sender<Result<HttpResponse, TransportError>>,
}

impl Call {
    pub fn respond(self, status: u16, body: impl Into<String>) {
        let _ = self.reply.send(Ok(HttpResponse {
            status,
            headers: Vec::new(),
            body: body.into(),
        }));
    }

    pub fn respond_json(self, status: u16, value: serde_json::Value) {
        self.respond(status, value.to_string());
    }

    pub fn respond_item(self, status: u16, id: i64, title: &str, completed: bool) {
        self.respond_json(status, serde_json::json!({ "id": id, "title": title, "completed": completed }));
    }

    /// The request never gets a response, as with a dropped connection.
    pub fn fail(self) {
        let _ = self.reply.send(Err(TransportError::Io("connection reset".to_string())));
    }

    /// The request gets no response before the transport's deadline.
    pub fn time_out(self) {
        let _ = self.reply.send(Err(TransportError::Timeout));
    }
}

pub struct ChannelTransport {
    calls: mpsc::UnboundedSender<Call>,
}

impl Transport for ChannelTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let (reply, answer) = oneshot::channel();
        self.calls
            .send(Call { request, reply })
            .map_err(|_| TransportError::Closed)?;
        answer.await.map_err(|_| TransportError::Closed)?
    }
}

pub struct Remote {
    calls: mpsc::UnboundedReceiver<Call>,
}

impl Remote {
    pub async fn next(&mut self) -> Call {
        self.calls.recv().await.expect("synchronizer issued no request")
    }

    pub fn assert_idle(&mut self) {
        assert!(self.calls.try_recv().is_err(), "unexpected request issued");
    }
}

pub fn harness() -> (ListSynchronizer<ChannelTransport>, Remote) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sync = ListSynchronizer::new(ItemClient::new(BASE_URL), ChannelTransport { calls: tx });
    (sync, Remote { calls: rx })
}

/// A synchronizer whose cache was filled by a successful refresh.
pub async fn seeded(rows: &[(i64, &str, bool)]) -> (ListSynchronizer<ChannelTransport>, Remote) {
    let (sync, mut remote) = harness();
    let items: Vec<Item> = rows
        .iter()
        .map(|&(id, title, completed)| Item {
            id,
            title: title.to_string(),
            completed,
        })
        .collect();
    let body = serde_json::to_string(&items).unwrap();

    let (outcome, ()) = tokio::join!(sync.refresh(), async {
        remote.next().await.respond(200, body);
    });
    assert!(outcome.is_confirmed());
    (sync, remote)
}

/// Wait until the published state satisfies `pred`.
pub async fn settle(rx: &mut watch::Receiver<ListState>, pred: impl FnMut(&ListState) -> bool) {
    rx.wait_for(pred).await.expect("synchronizer dropped");
}

pub fn ids(state: &ListState) -> Vec<String> {
    state.items.iter().map(|i| i.key.to_string()).collect()
}
