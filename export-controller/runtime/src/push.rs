use crate::index::PushSignal;
use prometheus_client::metrics::counter::Counter;
use tokio::sync::mpsc;

/// Receives push signals on behalf of the configuration distribution pipeline.
pub(crate) async fn process_signals(
    mut signals: mpsc::UnboundedReceiver<PushSignal>,
    delivered: Counter,
) {
    while let Some(PushSignal {
        service,
        hostname,
        endpoints,
        exported,
    }) = signals.recv().await
    {
        delivered.inc();
        tracing::info!(
            %service,
            %hostname,
            endpoints = endpoints.len(),
            exported,
            "Endpoint visibility changed"
        );
    }
    tracing::debug!("Push signals closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ServiceRef;

    #[tokio::test(flavor = "current_thread")]
    async fn counts_signals_until_closed() {
        let (tx, rx) = mpsc::unbounded_channel();
        let delivered = Counter::default();
        for exported in [true, false] {
            tx.send(PushSignal {
                service: ServiceRef::new("ns", "svc"),
                hostname: "svc.ns.svc.cluster.local".to_string(),
                endpoints: Vec::new(),
                exported,
            })
            .unwrap();
        }
        drop(tx);

        process_signals(rx, delivered.clone()).await;
        assert_eq!(delivered.get(), 2);
    }
}
