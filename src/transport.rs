//! Seam to the store-and-forward messaging network
use super::message::Envelope;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Addressing and fee options for one outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendParams {
    pub from_address: String,
    pub to_address: String,
    pub paid_message: bool,
    pub days_retention: u32,
    pub estimate_fee: bool,
}

impl SendParams {
    pub fn new(from_address: impl Into<String>, to_address: impl Into<String>) -> Self {
        Self {
            from_address: from_address.into(),
            to_address: to_address.into(),
            paid_message: false,
            days_retention: 2,
            estimate_fee: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub msgid: String,
    pub fee: Option<u64>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport rejected the message: {0}")]
    Rejected(String),
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, envelope: &Envelope, params: &SendParams) -> Result<Ack, TransportError>;
}

/// Outcome of one fire-and-forget send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub envelope_id: String,
    pub action: String,
    pub result: Result<Ack, TransportError>,
}

/// Hands envelopes to the transport without waiting for the result.
///
/// Local state is committed before `post` is called; a failed send is logged
/// and, when a report channel is attached, reported there.
#[derive(Clone)]
pub struct Outbox {
    transport: Arc<dyn Transport>,
    reports: Option<mpsc::UnboundedSender<DeliveryReport>>,
}

impl Outbox {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            reports: None,
        }
    }

    pub fn with_reports(mut self, reports: mpsc::UnboundedSender<DeliveryReport>) -> Self {
        self.reports = Some(reports);
        self
    }

    pub fn post(&self, envelope: Envelope, params: SendParams) -> tokio::task::JoinHandle<()> {
        let transport = Arc::clone(&self.transport);
        let reports = self.reports.clone();

        tokio::spawn(async move {
            let result = transport.send(&envelope, &params).await;
            match &result {
                Ok(ack) => debug!(
                    envelope = %envelope.id,
                    action = %envelope.action,
                    msgid = %ack.msgid,
                    "envelope sent"
                ),
                Err(e) => warn!(
                    envelope = %envelope.id,
                    action = %envelope.action,
                    to = %params.to_address,
                    error = %e,
                    "failed to send envelope"
                ),
            }
            if let Some(reports) = reports {
                // receiver gone means nobody is listening for reports any more
                let _ = reports.send(DeliveryReport {
                    envelope_id: envelope.id,
                    action: envelope.action,
                    result,
                });
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Refusing;

    #[async_trait]
    impl Transport for Refusing {
        async fn send(&self, _: &Envelope, _: &SendParams) -> Result<Ack, TransportError> {
            Err(TransportError::Unavailable("offline".into()))
        }
    }

    #[tokio::test]
    async fn failed_send_is_reported() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let outbox = Outbox::new(Arc::new(Refusing)).with_reports(tx);
        let envelope = Envelope {
            id: "msg1".to_string(),
            action: "MPA_BID".to_string(),
            payload: vec![],
        };

        outbox
            .post(envelope, SendParams::new("pfrom", "pto"))
            .await
            .unwrap();

        let report = rx.recv().await.unwrap();
        assert_eq!(report.envelope_id, "msg1");
        assert_eq!(
            report.result,
            Err(TransportError::Unavailable("offline".into()))
        );
    }
}
