//! The `Laboratory`: shared, concurrent home of all lab state.
//!
//! # Locking model
//!
//! | State          | Guard                                  | Serializes            |
//! |----------------|----------------------------------------|-----------------------|
//! | registry       | one `RwLock<Registry>`                 | resource writes       |
//! | each order     | one `Mutex<Order>` per order           | events on that order  |
//! | each source    | one `Mutex<SourceAccount>` per source  | withdrawals from it   |
//! | searches       | `RwLock` map of immutable `Arc<Search>`| nothing after insert  |
//!
//! Different orders never contend. A transfer batch first locks every order
//! involving one of its resources (by uuid), then every distinct source it
//! draws from (sorted), validates the whole batch against the locked
//! statuses and histories, and only then appends. Two concurrent batches
//! from the same source therefore see each other's withdrawals, and no order
//! event can slip between the gate check and the append. Order updates take
//! a single order lock and nothing else, so the order-then-source sequence
//! cannot cycle.
//!
//! Change-feed messages for orders and transfers are published while the
//! committing guard is still held, so the feed follows commit order.
//!
//! Search fetches take per-order snapshots one at a time and never hold an
//! order lock while evaluating, so results are eventually (not strictly)
//! consistent with concurrent writers.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use lom_orders::{ItemEventSpec, NewOrder, Order, OrderStatus};
use lom_registry::{Label, LabelMatch, Registry, Resource};
use lom_search::{Hit, PageInfo, Search, DEFAULT_PAGE_SIZE};
use lom_transfer::{
    check_batch, validate_spec, Fraction, SourceAccount, TransferRecord, TransferSpec,
};
use serde_json::Value;
use tokio::sync::{broadcast, Mutex, OwnedMutexGuard, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::LabError;
use crate::events::LabEvent;

// ---------------------------------------------------------------------------
// Configuration and I/O types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabConfig {
    pub page_size: usize,
    /// Source and target of a transfer must be items of an `in_progress` order.
    pub require_active_order: bool,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            require_active_order: true,
        }
    }
}

/// A transfer as received from the wire; the fraction is not yet validated.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub source: String,
    pub target: String,
    pub fraction: f64,
    pub aliquot_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferOutcome {
    pub records: Vec<TransferRecord>,
    /// Remaining fraction of every source touched by the batch.
    pub remaining: BTreeMap<String, Fraction>,
}

/// An owned search hit.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Resource(Resource),
    Order(Order),
}

impl Entity {
    pub fn uuid(&self) -> &str {
        match self {
            Entity::Resource(r) => &r.uuid,
            Entity::Order(o) => o.uuid(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResultPage {
    pub search: Arc<Search>,
    pub entities: Vec<Entity>,
    pub info: PageInfo,
}

/// Whatever a bare identifier refers to.
#[derive(Debug, Clone)]
pub enum Located {
    Resource(Resource),
    Order(Order),
    Search(Arc<Search>),
}

// ---------------------------------------------------------------------------
// Laboratory
// ---------------------------------------------------------------------------

pub struct Laboratory {
    config: LabConfig,
    registry: RwLock<Registry>,
    orders: RwLock<HashMap<String, Arc<Mutex<Order>>>>,
    accounts: RwLock<HashMap<String, Arc<Mutex<SourceAccount>>>>,
    searches: RwLock<HashMap<String, Arc<Search>>>,
    order_seq: AtomicU64,
    transfer_seq: AtomicU64,
    search_seq: AtomicU64,
    bus: broadcast::Sender<LabEvent>,
}

impl Default for Laboratory {
    fn default() -> Self {
        Self::new(LabConfig::default())
    }
}

impl Laboratory {
    pub fn new(config: LabConfig) -> Self {
        let (bus, _rx) = broadcast::channel::<LabEvent>(1024);
        Self {
            config: LabConfig {
                page_size: config.page_size.max(1),
                ..config
            },
            registry: RwLock::new(Registry::new()),
            orders: RwLock::new(HashMap::new()),
            accounts: RwLock::new(HashMap::new()),
            searches: RwLock::new(HashMap::new()),
            order_seq: AtomicU64::new(0),
            transfer_seq: AtomicU64::new(0),
            search_seq: AtomicU64::new(0),
            bus,
        }
    }

    pub fn config(&self) -> LabConfig {
        self.config
    }

    /// Subscribe to the change feed.
    pub fn subscribe(&self) -> broadcast::Receiver<LabEvent> {
        self.bus.subscribe()
    }

    fn publish(&self, ev: LabEvent) {
        // No subscribers is fine.
        let _ = self.bus.send(ev);
    }

    // -----------------------------------------------------------------------
    // Resources
    // -----------------------------------------------------------------------

    pub async fn create_resource(&self, kind: &str) -> Result<Resource, LabError> {
        let kind = Registry::parse_kind(kind)
            .map_err(LabError::from)
            .inspect_err(|e| rejected("create_resource", e))?;

        let resource = {
            let mut reg = self.registry.write().await;
            reg.create_resource(Uuid::new_v4().to_string(), kind, Utc::now())?
                .clone()
        };

        info!(uuid = %resource.uuid, kind = %resource.kind, "resource created");
        self.publish(LabEvent::ResourceCreated {
            uuid: resource.uuid.clone(),
            kind: resource.kind.to_string(),
        });
        Ok(resource)
    }

    /// Set or replace several labels on one resource, all-or-nothing.
    pub async fn attach_labels(
        &self,
        uuid: &str,
        labels: Vec<Label>,
    ) -> Result<Resource, LabError> {
        let keys: Vec<String> = labels
            .iter()
            .map(|l| format!("{}:{}", l.label_type, l.name))
            .collect();

        let mut reg = self.registry.write().await;
        let resource = reg
            .attach_labels(uuid, labels)
            .map(Resource::clone)
            .map_err(LabError::from)
            .inspect_err(|e| rejected("attach_labels", e))?;

        info!(uuid, labels = ?keys, "labels attached");
        self.publish(LabEvent::LabelsAttached {
            uuid: uuid.to_string(),
            labels: keys,
        });
        Ok(resource)
    }

    pub async fn attach_label(
        &self,
        uuid: &str,
        label_type: &str,
        name: &str,
        value: &str,
    ) -> Result<Resource, LabError> {
        self.attach_labels(uuid, vec![Label::new(name, label_type, value)])
            .await
    }

    pub async fn resource(&self, uuid: &str) -> Result<Resource, LabError> {
        let reg = self.registry.read().await;
        Ok(reg.require(uuid)?.clone())
    }

    pub async fn lookup_by_label(&self, pattern: &LabelMatch) -> Vec<Resource> {
        let reg = self.registry.read().await;
        reg.find_by_label(pattern).into_iter().cloned().collect()
    }

    // -----------------------------------------------------------------------
    // Orders
    // -----------------------------------------------------------------------

    pub async fn create_order(&self, req: NewOrder) -> Result<Order, LabError> {
        self.create_order_inner(req)
            .await
            .inspect_err(|e| rejected("create_order", e))
    }

    async fn create_order_inner(&self, req: NewOrder) -> Result<Order, LabError> {
        {
            let reg = self.registry.read().await;
            for (_, _, uuid) in req.declared_pairs() {
                reg.require(uuid)?;
            }
        }

        let seq = self.order_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let order = Order::create(Uuid::new_v4().to_string(), seq, Utc::now(), req)?;

        self.orders.write().await.insert(
            order.uuid().to_string(),
            Arc::new(Mutex::new(order.clone())),
        );

        info!(
            order = order.uuid(),
            pipeline = order.pipeline(),
            items = order.items().len(),
            "order created"
        );
        self.publish(LabEvent::OrderCreated {
            uuid: order.uuid().to_string(),
            pipeline: order.pipeline().to_string(),
        });
        Ok(order)
    }

    async fn order_handle(&self, uuid: &str) -> Result<Arc<Mutex<Order>>, LabError> {
        self.orders
            .read()
            .await
            .get(uuid)
            .cloned()
            .ok_or_else(|| LabError::OrderNotFound {
                uuid: uuid.to_string(),
            })
    }

    pub async fn order(&self, uuid: &str) -> Result<Order, LabError> {
        let handle = self.order_handle(uuid).await?;
        let order = handle.lock().await;
        Ok(order.clone())
    }

    /// Apply an optional order event, then an item batch, atomically.
    ///
    /// Returns the committed order. On error nothing changes.
    pub async fn update_order(
        &self,
        uuid: &str,
        event: Option<&str>,
        items: &[ItemEventSpec],
    ) -> Result<Order, LabError> {
        self.update_order_inner(uuid, event, items)
            .await
            .inspect_err(|e| rejected("update_order", e))
    }

    async fn update_order_inner(
        &self,
        uuid: &str,
        event: Option<&str>,
        items: &[ItemEventSpec],
    ) -> Result<Order, LabError> {
        let handle = self.order_handle(uuid).await?;
        // Published under the guard so the feed follows commit order.
        let mut order = handle.lock().await;
        let update = order.apply_update(event, items)?;

        if let Some((from, to)) = update.order_change {
            info!(
                order = uuid,
                event = event.unwrap_or_default(),
                %from,
                %to,
                "order status changed"
            );
            self.publish(LabEvent::OrderStatusChanged {
                order: uuid.to_string(),
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        for change in update.item_changes {
            info!(
                order = uuid,
                role = %change.role,
                resource = %change.resource,
                from = %change.from,
                to = %change.to,
                "item status changed"
            );
            self.publish(LabEvent::ItemStatusChanged {
                order: uuid.to_string(),
                role: change.role,
                resource: change.resource,
                from: change.from.to_string(),
                to: change.to.to_string(),
            });
        }
        Ok(order.clone())
    }

    pub async fn apply_order_event(
        &self,
        uuid: &str,
        event: &str,
    ) -> Result<OrderStatus, LabError> {
        Ok(self.update_order(uuid, Some(event), &[]).await?.status())
    }

    pub async fn apply_item_events(
        &self,
        uuid: &str,
        items: &[ItemEventSpec],
    ) -> Result<Order, LabError> {
        self.update_order(uuid, None, items).await
    }

    /// Point-in-time copies of every order, by creation sequence.
    async fn order_snapshots(&self) -> Vec<Order> {
        let handles: Vec<Arc<Mutex<Order>>> = self.orders.read().await.values().cloned().collect();
        let mut out = Vec::with_capacity(handles.len());
        for handle in handles {
            out.push(handle.lock().await.clone());
        }
        out.sort_by_key(Order::seq);
        out
    }

    // -----------------------------------------------------------------------
    // Transfers
    // -----------------------------------------------------------------------

    pub async fn transfer(&self, req: TransferRequest) -> Result<TransferOutcome, LabError> {
        self.transfer_all(vec![req]).await
    }

    /// Record a batch of transfers, all-or-nothing.
    pub async fn transfer_all(
        &self,
        reqs: Vec<TransferRequest>,
    ) -> Result<TransferOutcome, LabError> {
        self.transfer_all_inner(reqs)
            .await
            .inspect_err(|e| rejected("transfer_all", e))
    }

    async fn transfer_all_inner(
        &self,
        reqs: Vec<TransferRequest>,
    ) -> Result<TransferOutcome, LabError> {
        if reqs.is_empty() {
            return Err(LabError::InvalidTransfer {
                reason: "no transfers given".to_string(),
            });
        }

        let specs = reqs
            .into_iter()
            .map(|r| {
                let fraction = Fraction::from_f64(r.fraction)
                    .map_err(|e| LabError::fraction(&r.source, &r.target, e))?;
                Ok(TransferSpec::new(r.source, r.target, fraction, r.aliquot_type))
            })
            .collect::<Result<Vec<_>, LabError>>()?;

        for spec in &specs {
            validate_spec(spec)?;
        }
        {
            let reg = self.registry.read().await;
            for spec in &specs {
                reg.require(&spec.source)?;
                reg.require(&spec.target)?;
            }
        }
        // Orders first, then sources; both in sorted order. Held until the
        // batch is appended and published.
        let order_guards = if self.config.require_active_order {
            self.lock_active_orders(&specs).await?
        } else {
            Vec::new()
        };

        // Lock every source in sorted order before looking at any history.
        let sources: BTreeSet<&str> = specs.iter().map(|s| s.source.as_str()).collect();
        let handles = self.accounts_for(&sources).await;
        let mut guards: BTreeMap<String, OwnedMutexGuard<SourceAccount>> = BTreeMap::new();
        for (source, handle) in handles {
            guards.insert(source, handle.lock_owned().await);
        }

        check_batch(&specs, |source| {
            guards
                .get(source)
                .map(|g| g.withdrawn())
                .unwrap_or(Fraction::ZERO)
        })?;

        let now = Utc::now();
        let mut records = Vec::with_capacity(specs.len());
        for spec in specs {
            let Some(account) = guards.get_mut(&spec.source) else {
                return Err(LabError::InvalidTransfer {
                    reason: format!("source {} is not locked", spec.source),
                });
            };
            let seq = self.transfer_seq.fetch_add(1, Ordering::SeqCst) + 1;
            records.push(account.append(spec, seq, now)?.clone());
        }
        let remaining: BTreeMap<String, Fraction> = guards
            .iter()
            .map(|(source, g)| (source.clone(), g.remaining()))
            .collect();

        for rec in &records {
            info!(
                seq = rec.seq,
                source = %rec.source,
                target = %rec.target,
                fraction = rec.fraction.to_f64(),
                aliquot_type = %rec.aliquot_type,
                "transfer recorded"
            );
            self.publish(LabEvent::TransferRecorded {
                seq: rec.seq,
                source: rec.source.clone(),
                target: rec.target.clone(),
                fraction: rec.fraction.to_f64(),
                aliquot_type: rec.aliquot_type.clone(),
            });
        }
        drop(guards);
        drop(order_guards);
        Ok(TransferOutcome { records, remaining })
    }

    /// Lock every order involving a resource of the batch, in uuid order,
    /// and check that each source and target is an item of some
    /// `in_progress` one. The returned guards keep those statuses fixed.
    async fn lock_active_orders(
        &self,
        specs: &[TransferSpec],
    ) -> Result<Vec<OwnedMutexGuard<Order>>, LabError> {
        let handles: BTreeMap<String, Arc<Mutex<Order>>> = self
            .orders
            .read()
            .await
            .iter()
            .map(|(uuid, handle)| (uuid.clone(), Arc::clone(handle)))
            .collect();
        let resources: BTreeSet<&str> = specs
            .iter()
            .flat_map(|s| [s.source.as_str(), s.target.as_str()])
            .collect();

        let mut orders = Vec::new();
        for handle in handles.into_values() {
            let order = handle.lock_owned().await;
            if resources.iter().any(|r| order.involves(r)) {
                orders.push(order);
            }
        }
        orders.sort_by_key(|o| o.seq());

        for spec in specs {
            for resource in [&spec.source, &spec.target] {
                let mut involving = orders.iter().filter(|o| o.involves(resource));
                let active = involving
                    .clone()
                    .any(|o| o.status() == OrderStatus::InProgress);
                if active {
                    continue;
                }
                let (order, status) = match involving.next() {
                    Some(o) => (o.uuid().to_string(), o.status().to_string()),
                    None => ("none".to_string(), "absent".to_string()),
                };
                return Err(LabError::OrderNotReady {
                    order,
                    status,
                    event: format!(
                        "transfer {} -> {} (resource {resource})",
                        spec.source, spec.target
                    ),
                });
            }
        }
        Ok(orders)
    }

    /// Account handles for `sources`, created on first use, in sorted order.
    async fn accounts_for(
        &self,
        sources: &BTreeSet<&str>,
    ) -> Vec<(String, Arc<Mutex<SourceAccount>>)> {
        let mut map = self.accounts.write().await;
        sources
            .iter()
            .map(|&source| {
                let handle = map
                    .entry(source.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(SourceAccount::new(source))))
                    .clone();
                (source.to_string(), handle)
            })
            .collect()
    }

    async fn account(&self, uuid: &str) -> Option<Arc<Mutex<SourceAccount>>> {
        self.accounts.read().await.get(uuid).cloned()
    }

    /// Sum of every fraction ever drawn out of `uuid`.
    pub async fn withdrawn(&self, uuid: &str) -> Result<Fraction, LabError> {
        self.resource(uuid).await?;
        Ok(match self.account(uuid).await {
            Some(handle) => handle.lock().await.withdrawn(),
            None => Fraction::ZERO,
        })
    }

    /// `1 - withdrawn`, derived from the history on every call.
    pub async fn remaining(&self, uuid: &str) -> Result<Fraction, LabError> {
        Ok(self.withdrawn(uuid).await?.complement())
    }

    /// Outgoing transfers of `uuid`, oldest first.
    pub async fn transfers_from(&self, uuid: &str) -> Result<Vec<TransferRecord>, LabError> {
        self.resource(uuid).await?;
        Ok(match self.account(uuid).await {
            Some(handle) => handle.lock().await.entries().to_vec(),
            None => Vec::new(),
        })
    }

    /// Incoming transfers of `uuid` (what it was made from), oldest first.
    pub async fn received(&self, uuid: &str) -> Result<Vec<TransferRecord>, LabError> {
        self.resource(uuid).await?;
        let handles: Vec<_> = self.accounts.read().await.values().cloned().collect();
        let mut out = Vec::new();
        for handle in handles {
            let account = handle.lock().await;
            out.extend(account.sent_to(uuid).cloned());
        }
        out.sort_by_key(|r| r.seq);
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Searches
    // -----------------------------------------------------------------------

    /// Validate and store a search. Does not evaluate it.
    pub async fn create_search(
        &self,
        model: &str,
        description: &str,
        criteria: Value,
    ) -> Result<Arc<Search>, LabError> {
        let seq = self.search_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let search = Search::create(
            Uuid::new_v4().to_string(),
            seq,
            Utc::now(),
            model,
            description,
            criteria,
        )
        .map_err(LabError::from)
        .inspect_err(|e| rejected("create_search", e))?;
        let search = Arc::new(search);

        self.searches
            .write()
            .await
            .insert(search.uuid().to_string(), Arc::clone(&search));

        info!(search = search.uuid(), model = %search.model(), description, "search created");
        self.publish(LabEvent::SearchCreated {
            uuid: search.uuid().to_string(),
            model: search.model().to_string(),
        });
        Ok(search)
    }

    pub async fn search(&self, uuid: &str) -> Result<Arc<Search>, LabError> {
        self.searches
            .read()
            .await
            .get(uuid)
            .cloned()
            .ok_or_else(|| LabError::SearchNotFound {
                uuid: uuid.to_string(),
            })
    }

    /// Evaluate a stored search against current state and return one page.
    pub async fn fetch_results(&self, uuid: &str, page: usize) -> Result<ResultPage, LabError> {
        let search = self.search(uuid).await?;
        let orders = self.order_snapshots().await;
        let reg = self.registry.read().await;

        let (hits, info) = search.page(&reg, &orders, self.config.page_size, page);
        let entities = hits
            .into_iter()
            .map(|hit| match hit {
                Hit::Resource(r) => Entity::Resource(r.clone()),
                Hit::Order(o) => Entity::Order(o.clone()),
            })
            .collect();
        drop(reg);

        Ok(ResultPage {
            search,
            entities,
            info,
        })
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Resolve a bare identifier to whatever it names.
    pub async fn locate(&self, uuid: &str) -> Option<Located> {
        if let Some(r) = self.registry.read().await.get(uuid) {
            return Some(Located::Resource(r.clone()));
        }
        if let Ok(order) = self.order(uuid).await {
            return Some(Located::Order(order));
        }
        self.search(uuid).await.ok().map(Located::Search)
    }
}

fn rejected(op: &'static str, e: &LabError) {
    warn!(op, code = e.code(), error = %e, "operation rejected");
}
