use anyhow::Result;
use hyper::{
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server, StatusCode,
};
use prometheus::core::Collector;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use tracing::{info, warn};

/// Failure reasons recorded under `tracker_tick_failures_total{reason}`.
pub const REASON_PROVIDER: &str = "provider";
pub const REASON_STORAGE: &str = "storage";

#[derive(Clone)]
pub struct MetricsHandle {
    registry: Registry,
    ticks: IntCounter,
    snapshots_recorded: IntCounter,
    tick_failures: IntCounterVec,
}

impl Default for MetricsHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsHandle {
    pub fn new() -> Self {
        let registry = Registry::new();
        let ticks = IntCounter::new("tracker_ticks_total", "Recording ticks started")
            .expect("static metric definition");
        let snapshots_recorded = IntCounter::new(
            "tracker_snapshots_recorded_total",
            "Snapshots appended to the store",
        )
        .expect("static metric definition");
        let tick_failures = IntCounterVec::new(
            Opts::new("tracker_tick_failures_total", "Ticks that wrote no snapshot"),
            &["reason"],
        )
        .expect("static metric definition");

        let collectors: [Box<dyn Collector>; 3] = [
            Box::new(ticks.clone()),
            Box::new(snapshots_recorded.clone()),
            Box::new(tick_failures.clone()),
        ];
        for collector in collectors {
            if let Err(err) = registry.register(collector) {
                warn!(error = ?err, "failed to register metric");
            }
        }

        Self {
            registry,
            ticks,
            snapshots_recorded,
            tick_failures,
        }
    }

    pub fn tick_started(&self) {
        self.ticks.inc();
    }

    pub fn snapshot_recorded(&self) {
        self.snapshots_recorded.inc();
    }

    pub fn tick_failed(&self, reason: &str) {
        self.tick_failures.with_label_values(&[reason]).inc();
    }

    pub fn render(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }

    pub async fn serve(self, addr: SocketAddr) -> Result<()> {
        let make_svc = make_service_fn(move |_| {
            let handle = self.clone();
            async move {
                Ok::<_, hyper::Error>(service_fn(move |_req: Request<Body>| {
                    let handle = handle.clone();
                    async move { Ok::<_, hyper::Error>(handle.exposition()) }
                }))
            }
        });

        let server = Server::bind(&addr).serve(make_svc);
        info!(%addr, "metrics exporter listening");
        server.await?;
        Ok(())
    }

    fn exposition(&self) -> Response<Body> {
        match self.render() {
            Ok(buffer) => {
                let mut response = Response::new(Body::from(buffer));
                if let Ok(value) = TextEncoder::new().format_type().parse() {
                    response
                        .headers_mut()
                        .insert(hyper::header::CONTENT_TYPE, value);
                }
                response
            }
            Err(err) => {
                warn!(error = ?err, "failed to encode metrics");
                let mut response = Response::new(Body::empty());
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                response
            }
        }
    }
}
