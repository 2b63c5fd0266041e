//! Service layer API for marketplace actions
//!
//! `MarketService::assemble` wires every factory, processor and the dispatch
//! router from explicitly passed collaborators. Local actions build a message,
//! apply it through the router exactly as a peer's copy would be applied, and
//! then broadcast it.
use super::config::MarketConfig;
use super::entity::{Bid, Escrow, Proposal};
use super::error::ProcessError;
use super::factory::{
    AcceptBidMessageFactory, BidMessageFactory, CancelBidMessageFactory,
    EscrowLockMessageFactory, EscrowRefundMessageFactory, MessageFactory,
    ProposalAddMessageFactory, RejectBidMessageFactory,
};
use super::lock::LineageLocks;
use super::memory::MemoryStore;
use super::message::{ActionMessage, Envelope};
use super::processor::{
    AcceptBidMessageProcessor, BidLineage, BidMessageProcessor, CancelBidMessageProcessor,
    EscrowLedger, EscrowLockMessageProcessor, EscrowRefundMessageProcessor,
    EscrowReleaseMessageProcessor, Processed, ProposalAddMessageProcessor,
    RejectBidMessageProcessor,
};
use super::repository::{
    BidRepository, EscrowRepository, ListingItemRepository, ProposalRepository,
};
use super::request::{
    BidActionRequest, BidRequest, EscrowReleaseRequest, EscrowRequest, ProposalAddRequest,
};
use super::router::DispatchRouter;
use super::store::SledStore;
use super::transport::{DeliveryReport, Outbox, SendParams, Transport};
use super::utils::new_message_id;
use anyhow::Context;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

/// Everything the core needs from the host process.
#[derive(Clone)]
pub struct Collaborators {
    pub listing_items: Arc<dyn ListingItemRepository>,
    pub bids: Arc<dyn BidRepository>,
    pub proposals: Arc<dyn ProposalRepository>,
    pub escrows: Arc<dyn EscrowRepository>,
    pub transport: Arc<dyn Transport>,
    pub reports: Option<mpsc::UnboundedSender<DeliveryReport>>,
}

impl Collaborators {
    pub fn in_memory(transport: Arc<dyn Transport>) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            listing_items: store.clone(),
            bids: store.clone(),
            proposals: store.clone(),
            escrows: store,
            transport,
            reports: None,
        }
    }

    pub fn sled(store: Arc<SledStore>, transport: Arc<dyn Transport>) -> Self {
        Self {
            listing_items: store.clone(),
            bids: store.clone(),
            proposals: store.clone(),
            escrows: store,
            transport,
            reports: None,
        }
    }

    /// sled when the config names a database path, memory otherwise.
    pub fn from_config(config: &MarketConfig, transport: Arc<dyn Transport>) -> anyhow::Result<Self> {
        match &config.database_path {
            Some(path) => {
                let store = SledStore::open(path)
                    .with_context(|| format!("failed to open database at {}", path.display()))?;
                Ok(Self::sled(Arc::new(store), transport))
            }
            None => Ok(Self::in_memory(transport)),
        }
    }

    pub fn with_reports(mut self, reports: mpsc::UnboundedSender<DeliveryReport>) -> Self {
        self.reports = Some(reports);
        self
    }
}

pub struct MarketService {
    router: DispatchRouter,
    release: Arc<EscrowReleaseMessageProcessor>,
    outbox: Outbox,
    config: MarketConfig,
}

impl MarketService {
    pub fn assemble(collaborators: Collaborators, config: MarketConfig) -> Self {
        let Collaborators {
            listing_items,
            bids,
            proposals,
            escrows,
            transport,
            reports,
        } = collaborators;

        let mut outbox = Outbox::new(transport);
        if let Some(reports) = reports {
            outbox = outbox.with_reports(reports);
        }

        let locks = LineageLocks::new();
        let lineage = BidLineage::new(listing_items.clone(), bids.clone(), locks.clone());
        let ledger = EscrowLedger::new(listing_items.clone(), bids, escrows, locks.clone());
        let release = Arc::new(EscrowReleaseMessageProcessor::new(
            ledger.clone(),
            listing_items.clone(),
            outbox.clone(),
        ));

        let mut router = DispatchRouter::new(config.verify_inbound_hashes);
        router.register(Arc::new(ProposalAddMessageProcessor::new(
            listing_items,
            proposals,
            locks,
        )));
        router.register(Arc::new(BidMessageProcessor::new(lineage.clone())));
        router.register(Arc::new(AcceptBidMessageProcessor::new(lineage.clone())));
        router.register(Arc::new(RejectBidMessageProcessor::new(lineage.clone())));
        router.register(Arc::new(CancelBidMessageProcessor::new(lineage)));
        router.register(Arc::new(EscrowLockMessageProcessor::new(ledger.clone())));
        router.register(release.clone());
        router.register(Arc::new(EscrowRefundMessageProcessor::new(ledger)));

        info!(actions = ?router.actions(), "market service assembled");

        Self {
            router,
            release,
            outbox,
            config,
        }
    }

    pub fn router(&self) -> &DispatchRouter {
        &self.router
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    /// Apply locally, then broadcast. Nothing is sent when the local
    /// transition is refused.
    async fn publish(
        &self,
        message: ActionMessage,
        send_params: SendParams,
    ) -> anyhow::Result<Processed> {
        let processed = self.router.dispatch(&message).await?;

        let envelope = Envelope::seal(new_message_id(), &message)?;
        debug!(envelope = %envelope.id, action = %envelope.action, hash = %message.hash(), "posting");
        self.outbox.post(envelope, send_params);

        Ok(processed)
    }

    /// Submit a new proposal for voting
    pub async fn add_proposal(&self, request: ProposalAddRequest) -> anyhow::Result<Proposal> {
        let (params, send_params) = request.validate()?;
        let message = ProposalAddMessageFactory.get(params)?;

        self.publish(message.into(), send_params)
            .await?
            .into_proposal()
            .context("proposal processor returned another entity")
    }

    /// Bid on a listing item
    pub async fn place_bid(&self, request: BidRequest) -> anyhow::Result<Bid> {
        let (params, send_params) = request.validate()?;
        let message = BidMessageFactory.get(params)?;

        self.publish(message.into(), send_params)
            .await?
            .into_bid()
            .context("bid processor returned another entity")
    }

    pub async fn accept_bid(&self, request: BidActionRequest) -> anyhow::Result<Bid> {
        let (params, send_params) = request.validate()?;
        let message = AcceptBidMessageFactory.get(params)?;

        self.publish(message.into(), send_params)
            .await?
            .into_bid()
            .context("accept processor returned another entity")
    }

    pub async fn reject_bid(&self, request: BidActionRequest) -> anyhow::Result<Bid> {
        let (params, send_params) = request.validate()?;
        let message = RejectBidMessageFactory.get(params)?;

        self.publish(message.into(), send_params)
            .await?
            .into_bid()
            .context("reject processor returned another entity")
    }

    pub async fn cancel_bid(&self, request: BidActionRequest) -> anyhow::Result<Bid> {
        let (params, send_params) = request.validate()?;
        let message = CancelBidMessageFactory.get(params)?;

        self.publish(message.into(), send_params)
            .await?
            .into_bid()
            .context("cancel processor returned another entity")
    }

    pub async fn lock_escrow(&self, request: EscrowRequest) -> anyhow::Result<Escrow> {
        let (params, send_params) = request.validate()?;
        let message = EscrowLockMessageFactory.get(params)?;

        self.publish(message.into(), send_params)
            .await?
            .into_escrow()
            .context("escrow lock processor returned another entity")
    }

    /// Release the escrow of an accepted bid
    pub async fn release_escrow(&self, request: EscrowReleaseRequest) -> anyhow::Result<Escrow> {
        let request = request.validate()?;
        Ok(self.release.release(request).await?)
    }

    pub async fn refund_escrow(&self, request: EscrowRequest) -> anyhow::Result<Escrow> {
        let (params, send_params) = request.validate()?;
        let message = EscrowRefundMessageFactory.get(params)?;

        self.publish(message.into(), send_params)
            .await?
            .into_escrow()
            .context("escrow refund processor returned another entity")
    }

    /// Decode one payload received from the transport and apply it.
    pub async fn handle_inbound(&self, payload: &[u8]) -> Result<Processed, ProcessError> {
        let envelope = Envelope::from_bytes(payload)?;
        let message = envelope.open()?;
        debug!(envelope = %envelope.id, action = %envelope.action, "inbound");
        self.router.dispatch(&message).await
    }

    /// Consume inbound payloads until the channel closes.
    ///
    /// Payloads are processed concurrently, up to `inbound_concurrency` at a
    /// time. Ordering between payloads is not preserved; lineage locks keep
    /// same-item messages from interleaving. The task ends once every
    /// in-flight payload has finished.
    pub fn spawn_inbound_loop(self: Arc<Self>, mut inbound: mpsc::Receiver<Vec<u8>>) -> JoinHandle<()> {
        let limit = self.config.inbound_concurrency.clamp(1, Semaphore::MAX_PERMITS);
        let permits = Arc::new(Semaphore::new(limit));

        tokio::spawn(async move {
            let mut tasks = JoinSet::new();

            while let Some(payload) = inbound.recv().await {
                let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                    break;
                };
                let service = Arc::clone(&self);
                tasks.spawn(async move {
                    let _permit = permit;
                    match service.handle_inbound(&payload).await {
                        Ok(processed) => debug!(?processed, "inbound message applied"),
                        Err(e) => warn!(error = %e, "inbound message refused"),
                    }
                });
                while tasks.try_join_next().is_some() {}
            }

            while tasks.join_next().await.is_some() {}
            info!("inbound channel closed");
        })
    }
}
