//! DogStatsD recorder for the `metrics` facade, sending over UDP

use std::net::{ToSocketAddrs, UdpSocket};
use std::sync::Arc;

use metrics::{Counter, CounterFn, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};

/// Sends counters in DogStatsD line format: `name:value|c|#tag:value,...`.
/// Gauges and histograms are dropped.
#[derive(Debug, Clone)]
pub struct DogStatsdRecorder {
    socket: Arc<UdpSocket>,
    addr: String,
}

impl DogStatsdRecorder {
    /// Create a recorder sending to `addr` (`host:port`)
    pub fn new(addr: &str) -> Result<Self, MetricsError> {
        let target = addr
            .to_socket_addrs()
            .map_err(|e| MetricsError::Resolve(addr.to_string(), e.to_string()))?
            .next()
            .ok_or_else(|| MetricsError::Resolve(addr.to_string(), "no addresses".to_string()))?;

        let bind_addr = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr)?;
        socket.connect(target)?;
        // Never stall the collector on a full socket buffer
        socket.set_nonblocking(true)?;

        Ok(Self {
            socket: Arc::new(socket),
            addr: addr.to_string(),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl Recorder for DogStatsdRecorder {
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(Arc::new(StatsdCounter {
            socket: Arc::clone(&self.socket),
            addr: self.addr.clone(),
            prefix: sanitize(key.name()),
            tags: format_tags(key),
        }))
    }

    fn register_gauge(&self, _key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, _key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}

struct StatsdCounter {
    socket: Arc<UdpSocket>,
    addr: String,
    prefix: String,
    tags: String,
}

impl CounterFn for StatsdCounter {
    fn increment(&self, value: u64) {
        let line = format!("{}:{}|c{}", self.prefix, value, self.tags);
        if let Err(e) = self.socket.send(line.as_bytes()) {
            tracing::warn!(addr = %self.addr, error = %e, "Failed to send metric");
        }
    }

    // Statsd counters are deltas only
    fn absolute(&self, _value: u64) {}
}

/// Create the recorder and install it as the process-wide recorder
pub fn install_statsd(addr: &str) -> Result<DogStatsdRecorder, MetricsError> {
    let recorder = DogStatsdRecorder::new(addr)?;
    metrics::set_global_recorder(recorder.clone()).map_err(|_| MetricsError::AlreadyInstalled)?;
    super::describe();
    Ok(recorder)
}

/// `|#name:value,...`, or empty when the key has no labels
fn format_tags(key: &Key) -> String {
    let tags: Vec<String> = key
        .labels()
        .map(|l| format!("{}:{}", sanitize(l.key()), sanitize(l.value())))
        .collect();
    if tags.is_empty() {
        String::new()
    } else {
        format!("|#{}", tags.join(","))
    }
}

/// Strip characters that would break the line protocol
fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            ':' | '|' | ',' | '#' | '@' | '\n' | '\r' => '_',
            c => c,
        })
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Unable to resolve statsd address {0}: {1}")]
    Resolve(String, String),

    #[error("Statsd socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("A metrics recorder is already installed")]
    AlreadyInstalled,
}
