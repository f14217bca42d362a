//! The scripted extraction workflow.
//!
//! ```text
//! Tube <Input> -> Spin Column <Spin> -> Tube <EpA>
//!              -> Tube <TubeOut>
//! ```
//!
//! Every request is traced to the output writer:
//!
//! ```text
//! Request to <root>/<path>
//! with the following JSON:        (POST only)
//! <compact request JSON>
//! and get the response:           (not in dry mode)
//! <compact response JSON>
//! <blank line>
//! ```
//!
//! In dry mode nothing is sent and identifiers that would come from
//! responses are replaced by fixed placeholders.

use std::io::Write;

use anyhow::{anyhow, Context, Result};
use lom_schemas::{
    CreateOrderRequest, CreateSpinColumnRequest, CreateTubeRequest, LabelBody, LabellableBody,
    LabellableRequest, OrderBody, OrderResponse, OrderUpdateRequest, OrderView, ResourceEnvelope,
    ResultsPage, SearchBody, SearchRequest, SearchResponse, TransferBatchBody, TransferBody,
    TransferRequest, UuidRef,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};

use crate::transport::{join_url, ApiTransport};

const INPUT_PLACEHOLDER: &str = "aaa000000";
const SPIN_PLACEHOLDER: &str = "bbb111111";
const TUBE_OUT_PLACEHOLDER: &str = "ccc222222";
const EP_A_PLACEHOLDER: &str = "ddd333333";
const ORDER_PLACEHOLDER: &str = "eee444444";
const SEARCH_PLACEHOLDER: &str = "fff555555";

/// `(what, placeholder)` for every response-derived identifier.
pub const PLACEHOLDERS: [(&str, &str); 6] = [
    ("Input", INPUT_PLACEHOLDER),
    ("Spin", SPIN_PLACEHOLDER),
    ("TubeOut", TUBE_OUT_PLACEHOLDER),
    ("EpA", EP_A_PLACEHOLDER),
    ("order", ORDER_PLACEHOLDER),
    ("search", SEARCH_PLACEHOLDER),
];

const BARCODE_TYPE: &str = "sanger-barcode";
const BARCODE_LABEL: &str = "front barcode";

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub description: String,
    pub uuid: String,
    /// Identifiers on the first page of results.
    pub hits: Vec<String>,
}

/// Everything the workflow learned. Identifiers are placeholders in dry mode.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowReport {
    pub input: String,
    pub spin: String,
    pub tube_out: String,
    pub ep_a: String,
    pub order: String,
    /// Order as returned by the last item update; `None` in dry mode.
    pub final_order: Option<OrderView>,
    pub searches: Vec<SearchOutcome>,
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

pub struct Workflow<'t, W: Write> {
    api_root: String,
    /// `None` in dry mode.
    transport: Option<&'t dyn ApiTransport>,
    out: W,
}

impl<'t, W: Write> Workflow<'t, W> {
    pub fn live(api_root: impl Into<String>, transport: &'t dyn ApiTransport, out: W) -> Self {
        Self {
            api_root: api_root.into(),
            transport: Some(transport),
            out,
        }
    }

    /// Print payloads only; send nothing.
    pub fn dry(api_root: impl Into<String>, out: W) -> Self {
        Self {
            api_root: api_root.into(),
            transport: None,
            out,
        }
    }

    pub fn is_dry(&self) -> bool {
        self.transport.is_none()
    }

    pub fn into_output(self) -> W {
        self.out
    }

    // -----------------------------------------------------------------------
    // Steps
    // -----------------------------------------------------------------------

    /// Run every step in order. The first failure aborts the rest.
    pub async fn run(&mut self) -> Result<WorkflowReport> {
        self.banner("CREATE THE RESOURCES NEEDED IN THE ORDER WORKFLOW", false)?;
        let input = self.create_tube(INPUT_PLACEHOLDER).await?;
        let tube_out = self.create_tube(TUBE_OUT_PLACEHOLDER).await?;
        let ep_a = self.create_tube(EP_A_PLACEHOLDER).await?;
        let spin = self
            .create_resource("spin_columns", &CreateSpinColumnRequest::default(), SPIN_PLACEHOLDER)
            .await?;

        self.banner("BARCODE RESOURCES", true)?;
        for (uuid, barcode) in [
            (&input, "ABC1234"),
            (&spin, "DEF1234"),
            (&tube_out, "GHI1234"),
            (&ep_a, "JKL1234"),
        ] {
            self.barcode(uuid, barcode).await?;
        }

        self.banner("ORDER WORKFLOW", true)?;
        self.heading(&["INITIAL STATE: CREATE THE ORDER AND SETUP THE SOURCE AND THE TARGETS"])?;
        let order = self.create_order(&input, &spin, &tube_out, &ep_a).await?;

        self.heading(&["CHANGE THE ORDER STATUS TO PENDING"])?;
        self.update_order(&order, &OrderUpdateRequest::event("build")).await?;
        self.heading(&["CHANGE THE ORDER STATUS TO IN_PROGRESS"])?;
        self.update_order(&order, &OrderUpdateRequest::event("start")).await?;

        self.heading(&["CHANGE THE SPIN AND TUBEOUT STATUS TO IN_PROGRESS"])?;
        self.update_order(
            &order,
            &OrderUpdateRequest::items([("Spin", &spin, "start"), ("TubeOut", &tube_out, "start")]),
        )
        .await?;

        self.heading(&["DO THE WORK: TRANSFER FROM TUBE INPUT TO TUBE TUBEOUT AND SPIN COLUMN"])?;
        self.transfer(vec![
            transfer(&input, &tube_out, 0.5, "NA"),
            transfer(&input, &spin, 0.5, "DNA"),
        ])
        .await?;

        self.heading(&[
            "CHANGE THE SPIN AND TUBEOUT STATUS TO DONE",
            "AND CHANGE THE INPUT STATUS TO UNUSED",
        ])?;
        self.update_order(
            &order,
            &OrderUpdateRequest::items([
                ("Spin", &spin, "complete"),
                ("TubeOut", &tube_out, "complete"),
                ("Input", &input, "unused"),
            ]),
        )
        .await?;

        self.heading(&["DO THE WORK: TRANSFER FROM SPIN COLUMN TO TUBE EPA"])?;
        self.transfer(vec![transfer(&spin, &ep_a, 1.0, "NA")]).await?;

        self.heading(&["CHANGE EPA STATUS TO DONE AND SPIN STATUS TO UNUSED"])?;
        let final_order = self
            .update_order(
                &order,
                &OrderUpdateRequest::items([("EpA", &ep_a, "complete"), ("Spin", &spin, "unused")]),
            )
            .await?;

        self.banner("SEARCHES", true)?;
        let mut searches = Vec::new();

        self.heading(&["SEARCH ALL THE TUBES WITH: ROLE=INPUT AND STATUS=DONE"])?;
        searches.push(
            self.search(
                "search input tubes with done status",
                "tube",
                json!({"order": {"item": {"role": "Input", "status": "done"}}}),
            )
            .await?,
        );

        self.heading(&["SEARCH ALL THE ORDERS WHICH HAVE ITEMS WITH: ROLE=INPUT AND STATUS=DONE"])?;
        searches.push(
            self.search(
                "search orders with input tubes with a done status",
                "order",
                json!({"item": {"role": "Input", "status": "done"}}),
            )
            .await?,
        );

        self.heading(&["SEARCH ALL THE ORDERS WHICH HAVE A TUBE WITH: BARCODE=JKL1234"])?;
        let by_barcode = self
            .search(
                "search tube by barcode",
                "tube",
                json!({"label": {"type": BARCODE_TYPE, "value": "JKL1234"}}),
            )
            .await?;
        let tube = match (self.is_dry(), by_barcode.hits.first()) {
            (true, _) => EP_A_PLACEHOLDER.to_string(),
            (false, Some(uuid)) => uuid.clone(),
            (false, None) => return Err(anyhow!("no tube carries barcode JKL1234")),
        };
        searches.push(by_barcode);

        searches.push(
            self.search(
                "search orders containing barcoded JKL1234 tube",
                "order",
                json!({"item": {"uuid": tube}}),
            )
            .await?,
        );

        Ok(WorkflowReport {
            input,
            spin,
            tube_out,
            ep_a,
            order,
            final_order,
            searches,
        })
    }

    async fn create_tube(&mut self, placeholder: &str) -> Result<String> {
        self.create_resource("tubes", &CreateTubeRequest::default(), placeholder)
            .await
    }

    async fn create_resource<B: Serialize>(
        &mut self,
        path: &str,
        body: &B,
        placeholder: &str,
    ) -> Result<String> {
        match self.post(path, body).await? {
            Some(resp) => Ok(decode::<ResourceEnvelope>(resp, path)?.uuid().to_string()),
            None => Ok(placeholder.to_string()),
        }
    }

    async fn barcode(&mut self, uuid: &str, barcode: &str) -> Result<()> {
        let body = LabellableRequest {
            labellable: LabellableBody {
                name: uuid.to_string(),
                target_type: "resource".to_string(),
                labels: [(
                    BARCODE_LABEL.to_string(),
                    LabelBody {
                        value: barcode.to_string(),
                        label_type: BARCODE_TYPE.to_string(),
                    },
                )]
                .into_iter()
                .collect(),
            },
        };
        self.post("labellables", &body).await?;
        Ok(())
    }

    async fn create_order(
        &mut self,
        input: &str,
        spin: &str,
        tube_out: &str,
        ep_a: &str,
    ) -> Result<String> {
        let one = |role: &str, uuid: &str| (role.to_string(), vec![UuidRef::new(uuid)]);
        let body = CreateOrderRequest {
            order: OrderBody {
                user_uuid: "user uuid".into(),
                study_uuid: "study uuid".into(),
                pipeline: "pipeline 1".into(),
                cost_code: "cost code A".into(),
                sources: [one("Input", input)].into_iter().collect(),
                targets: [one("Spin", spin), one("TubeOut", tube_out), one("EpA", ep_a)]
                    .into_iter()
                    .collect(),
            },
        };
        match self.post("orders", &body).await? {
            Some(resp) => Ok(decode::<OrderResponse>(resp, "orders")?.order.uuid),
            None => Ok(ORDER_PLACEHOLDER.to_string()),
        }
    }

    async fn update_order(
        &mut self,
        order: &str,
        update: &OrderUpdateRequest,
    ) -> Result<Option<OrderView>> {
        match self.post(order, update).await? {
            Some(resp) => Ok(Some(decode::<OrderResponse>(resp, order)?.order)),
            None => Ok(None),
        }
    }

    async fn transfer(&mut self, transfers: Vec<TransferBody>) -> Result<()> {
        let body = TransferRequest {
            transfer_tubes_to_tubes: TransferBatchBody { transfers },
        };
        self.post("actions/transfer_tubes_to_tubes", &body).await?;
        Ok(())
    }

    /// Create a search, then fetch its first page through `actions.first`.
    async fn search(
        &mut self,
        description: &str,
        model: &str,
        criteria: Value,
    ) -> Result<SearchOutcome> {
        let body = SearchRequest {
            search: SearchBody {
                description: description.to_string(),
                model: model.to_string(),
                criteria,
            },
        };
        let (uuid, first) = match self.post("searches", &body).await? {
            Some(resp) => {
                let created = decode::<SearchResponse>(resp, "searches")?.search;
                (created.uuid, created.actions.first)
            }
            None => (
                SEARCH_PLACEHOLDER.to_string(),
                format!("/{SEARCH_PLACEHOLDER}/page=1"),
            ),
        };

        let hits = match self.get(&first).await? {
            Some(resp) => decode::<ResultsPage>(resp, &first)?.uuids(),
            None => Vec::new(),
        };
        Ok(SearchOutcome {
            description: description.to_string(),
            uuid,
            hits,
        })
    }

    // -----------------------------------------------------------------------
    // Request plumbing
    // -----------------------------------------------------------------------

    async fn post<B: Serialize>(&mut self, path: &str, body: &B) -> Result<Option<Value>> {
        let body = serde_json::to_value(body).context("request body serialize failed")?;
        self.request_line(path)?;
        writeln!(self.out, "with the following JSON:")?;
        writeln!(self.out, "{body}")?;

        let Some(transport) = self.transport else {
            writeln!(self.out)?;
            return Ok(None);
        };
        let resp = transport.post(path, &body).await?;
        self.response(&resp)?;
        Ok(Some(resp))
    }

    async fn get(&mut self, path: &str) -> Result<Option<Value>> {
        self.request_line(path)?;

        let Some(transport) = self.transport else {
            writeln!(self.out)?;
            return Ok(None);
        };
        let resp = transport.get(path).await?;
        self.response(&resp)?;
        Ok(Some(resp))
    }

    fn request_line(&mut self, path: &str) -> Result<()> {
        writeln!(self.out, "Request to {}", join_url(&self.api_root, path))?;
        Ok(())
    }

    fn response(&mut self, resp: &Value) -> Result<()> {
        writeln!(self.out, "and get the response:")?;
        writeln!(self.out, "{resp}")?;
        writeln!(self.out)?;
        Ok(())
    }

    /// Underlined section title, optionally preceded by a blank line.
    fn banner(&mut self, title: &str, gap: bool) -> Result<()> {
        if gap {
            writeln!(self.out)?;
        }
        writeln!(self.out, "{title}")?;
        writeln!(self.out, "{}", "=".repeat(title.len()))?;
        writeln!(self.out)?;
        Ok(())
    }

    fn heading(&mut self, lines: &[&str]) -> Result<()> {
        for line in lines {
            writeln!(self.out, "{line}")?;
        }
        writeln!(self.out)?;
        Ok(())
    }
}

fn transfer(source: &str, target: &str, fraction: f64, aliquot_type: &str) -> TransferBody {
    TransferBody {
        source_uuid: source.to_string(),
        target_uuid: target.to_string(),
        fraction,
        aliquot_type: aliquot_type.to_string(),
    }
}

fn decode<T: DeserializeOwned>(resp: Value, what: &str) -> Result<T> {
    serde_json::from_value(resp).with_context(|| format!("unexpected response shape from {what}"))
}
