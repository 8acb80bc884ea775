//! In-process connector for deterministic scheduling tests.
//!
//! URLs look like `https://stub.test/<id>/<delay_ms>`; an id of `fail`
//! answers 500. Successful bodies are `{"id": "<id>"}`.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use abatcher_core::request::RequestDescriptor;
use abatcher_core::transport::{
    Connector, InboundResponse, OutboundRequest, Transport, TransportError, TransportInitError,
    TransportSettings, build_outbound,
};
use async_trait::async_trait;
use tokio::time::Instant;

/// Everything the stub observed, shared across transports.
#[derive(Debug, Default)]
pub struct Probe {
    pub opens: AtomicUsize,
    pub drops: AtomicUsize,
    pub sends: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    starts: Mutex<Vec<Instant>>,
}

impl Probe {
    pub fn starts(&self) -> Vec<Instant> {
        self.starts.lock().unwrap().clone()
    }

    /// Largest number of starts inside any window of length `window`.
    pub fn max_starts_within(&self, window: Duration) -> usize {
        let starts = self.starts();
        (0..starts.len())
            .map(|i| {
                starts[i..]
                    .iter()
                    .take_while(|start| start.duration_since(starts[i]) < window)
                    .count()
            })
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StubConnector {
    pub probe: Arc<Probe>,
}

impl Connector for StubConnector {
    type Transport = StubTransport;

    fn open(&self, settings: &TransportSettings) -> Result<StubTransport, TransportInitError> {
        self.probe.opens.fetch_add(1, Ordering::SeqCst);
        Ok(StubTransport {
            probe: Arc::clone(&self.probe),
            settings: settings.clone(),
        })
    }
}

pub struct StubTransport {
    probe: Arc<Probe>,
    settings: TransportSettings,
}

impl Drop for StubTransport {
    fn drop(&mut self) {
        self.probe.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Decrements the in-flight count even when the send future is cancelled.
struct InFlight<'a>(&'a Probe);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for StubTransport {
    fn build_request(&self, descriptor: &RequestDescriptor) -> OutboundRequest {
        build_outbound(self.settings.base_url.as_ref(), descriptor)
    }

    async fn send(&self, request: &OutboundRequest) -> Result<InboundResponse, TransportError> {
        self.probe.sends.fetch_add(1, Ordering::SeqCst);
        self.probe.starts.lock().unwrap().push(Instant::now());
        let now = self.probe.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.probe);

        let mut segments = request.url.rsplit('/');
        let delay: u64 = segments.next().unwrap().parse().unwrap();
        let id = segments.next().unwrap().to_string();
        tokio::time::sleep(Duration::from_millis(delay)).await;

        let (status, body) = if id == "fail" {
            (500, Vec::new())
        } else {
            (200, format!("{{\"id\": \"{id}\"}}").into_bytes())
        };
        Ok(InboundResponse {
            status,
            url: request.url.clone(),
            body,
        })
    }
}

pub fn stub_url(id: impl std::fmt::Display, delay_ms: u64) -> String {
    format!("https://stub.test/{id}/{delay_ms}")
}
