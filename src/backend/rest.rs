use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use ureq::http::Response;
use ureq::{Agent, Body, RequestBuilder};
use uuid::Uuid;

use super::Backend;
use crate::config::{Actor, BackendSettings};
use crate::error::{BillingError, Result};
use crate::model::{
    AllocationDetail, AllocationLine, CashSettlement, Dossier, InvoiceQuery, InvoiceSummary,
    NewCashSettlement, NewPayment, Payment, PaymentStatus,
};

const ALLOCATION_SELECT: &str = "id,payment_id,invoice_id,amount,created_by,created_at,\
invoices(number,amount_total,amount_paid,due_date),payments(amount,method,payment_date)";
const INVOICE_SELECT: &str =
    "id,number,customer_id,customer_name,due_date,amount_total,amount_paid";
const DOSSIER_SELECT: &str =
    "id,reference,customer_id,manual_allocation,mode_changed_by,mode_changed_at";

/// Blocking client for the PostgREST-style billing backend.
///
/// Tables are read and written under `{url}/rest/v1/<table>`, stored
/// procedures are called under `{url}/rest/v1/rpc/<name>`. No client-side
/// timeout and no retries: an error is reported as soon as it arrives.
pub struct RestBackend {
    agent: Agent,
    base: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct PaymentRow<'a> {
    #[serde(flatten)]
    payment: &'a NewPayment,
    created_by: &'a str,
}

#[derive(Serialize)]
struct AllocationRow<'a> {
    payment_id: Uuid,
    invoice_id: Uuid,
    amount: Decimal,
    created_by: &'a str,
}

#[derive(Serialize)]
struct SettlementArgs<'a> {
    p_dossier_id: Uuid,
    p_amount: Decimal,
    p_received_on: NaiveDate,
    p_notes: Option<&'a str>,
    p_recorded_by: &'a str,
}

impl RestBackend {
    pub fn new(settings: &BackendSettings) -> Self {
        // Non-2xx responses are read so the server's message reaches the user.
        let agent: Agent = Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            base: format!("{}/rest/v1", settings.url.trim_end_matches('/')),
            api_key: settings.api_key.clone(),
        }
    }

    fn table(&self, name: &str) -> String {
        format!("{}/{}", self.base, name)
    }

    fn rpc(&self, name: &str) -> String {
        format!("{}/rpc/{}", self.base, name)
    }

    fn authorize<B>(&self, request: RequestBuilder<B>) -> RequestBuilder<B> {
        let request = request.header("Accept", "application/json");
        match &self.api_key {
            Some(key) => request
                .header("apikey", key.as_str())
                .header("Authorization", format!("Bearer {key}")),
            None => request,
        }
    }

    fn get_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let url = self.table(table);
        tracing::debug!(%url, ?query, "GET");
        let mut request = self.authorize(self.agent.get(&url));
        for (key, value) in query {
            request = request.query(*key, value);
        }
        read_json(request.call()?)
    }

    fn call_rpc<A: Serialize>(&self, name: &str, args: &A) -> Result<Response<Body>> {
        let url = self.rpc(name);
        tracing::debug!(%url, "RPC");
        let response = self.authorize(self.agent.post(&url)).send_json(args)?;
        check(response)
    }
}

impl Backend for RestBackend {
    fn create_payment(&self, payment: &NewPayment, actor: &Actor) -> Result<Payment> {
        let url = self.table("payments");
        tracing::info!(
            customer = %payment.customer_id,
            amount = %payment.amount,
            %actor,
            "creating payment"
        );
        let response = self
            .authorize(self.agent.post(&url))
            .header("Prefer", "return=representation")
            .send_json(PaymentRow {
                payment,
                created_by: actor.as_str(),
            })?;
        let rows: Vec<Payment> = read_json(response)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BillingError::EmptyResponse("created payment".to_string()))
    }

    fn get_payment(&self, payment_id: Uuid) -> Result<Payment> {
        let rows: Vec<Payment> = self.get_rows(
            "payments",
            &[("select", "*".to_string()), ("id", format!("eq.{payment_id}"))],
        )?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BillingError::PaymentNotFound(payment_id.to_string()))
    }

    fn list_payments(&self, customer_id: Option<Uuid>) -> Result<Vec<Payment>> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("order", "payment_date.desc,created_at.desc".to_string()),
        ];
        if let Some(customer) = customer_id {
            query.push(("customer_id", format!("eq.{customer}")));
        }
        self.get_rows("payments", &query)
    }

    fn update_payment_status(
        &self,
        payment_id: Uuid,
        status: PaymentStatus,
        actor: &Actor,
    ) -> Result<()> {
        let url = self.table("payments");
        tracing::info!(
            payment = %payment_id,
            status = status.as_str(),
            %actor,
            "updating payment status"
        );
        let response = self
            .authorize(self.agent.patch(&url))
            .query("id", format!("eq.{payment_id}"))
            .header("Prefer", "return=minimal")
            .send_json(json!({ "status": status }))?;
        check(response)?;
        Ok(())
    }

    fn allocate_automatically(&self, payment_id: Uuid, actor: &Actor) -> Result<()> {
        tracing::info!(payment = %payment_id, %actor, "requesting automatic allocation");
        self.call_rpc(
            "allocate_payment_automatically",
            &json!({ "p_payment_id": payment_id }),
        )?;
        Ok(())
    }

    fn create_manual_allocations(
        &self,
        payment_id: Uuid,
        lines: &[AllocationLine],
        actor: &Actor,
    ) -> Result<()> {
        let rows: Vec<AllocationRow<'_>> = lines
            .iter()
            .map(|line| AllocationRow {
                payment_id,
                invoice_id: line.invoice_id,
                amount: line.amount,
                created_by: actor.as_str(),
            })
            .collect();

        let url = self.table("payment_allocations");
        tracing::info!(
            payment = %payment_id,
            lines = rows.len(),
            %actor,
            "inserting manual allocations"
        );
        let response = self
            .authorize(self.agent.post(&url))
            .header("Prefer", "return=minimal")
            .send_json(&rows)?;
        check(response)?;
        Ok(())
    }

    fn delete_allocation(&self, allocation_id: Uuid, actor: &Actor) -> Result<()> {
        let url = self.table("payment_allocations");
        tracing::info!(allocation = %allocation_id, %actor, "deleting allocation");
        let response = self
            .authorize(self.agent.delete(&url))
            .query("id", format!("eq.{allocation_id}"))
            .header("Prefer", "return=representation")
            .call()?;
        let deleted: Vec<serde_json::Value> = read_json(response)?;
        if deleted.is_empty() {
            return Err(BillingError::AllocationNotFound(allocation_id.to_string()));
        }
        Ok(())
    }

    fn list_payment_allocations(&self, payment_id: Uuid) -> Result<Vec<AllocationDetail>> {
        self.get_rows(
            "payment_allocations",
            &[
                ("select", ALLOCATION_SELECT.to_string()),
                ("payment_id", format!("eq.{payment_id}")),
                ("order", "created_at.asc".to_string()),
            ],
        )
    }

    fn list_unpaid_invoices(&self, query: &InvoiceQuery) -> Result<Vec<InvoiceSummary>> {
        let status = if query.include_partial {
            "in.(unpaid,partial)"
        } else {
            "eq.unpaid"
        };
        let mut params = vec![
            ("select", INVOICE_SELECT.to_string()),
            ("status", status.to_string()),
            ("order", "due_date.asc.nullslast,number.asc".to_string()),
        ];
        if let Some(customer) = query.customer_id {
            params.push(("customer_id", format!("eq.{customer}")));
        }

        let mut invoices: Vec<InvoiceSummary> = self.get_rows("invoices", &params)?;
        // The stored status can lag behind the amounts; trust the amounts.
        invoices.retain(|invoice| query.admits(invoice));
        Ok(invoices)
    }

    fn list_dossiers(&self, customer_id: Option<Uuid>) -> Result<Vec<Dossier>> {
        let mut query = vec![
            ("select", DOSSIER_SELECT.to_string()),
            ("order", "reference.asc".to_string()),
        ];
        if let Some(customer) = customer_id {
            query.push(("customer_id", format!("eq.{customer}")));
        }
        self.get_rows("dossiers", &query)
    }

    fn get_dossier_mode(&self, dossier_id: Uuid) -> Result<bool> {
        let response = self.call_rpc(
            "get_dossier_allocation_mode",
            &json!({ "p_dossier_id": dossier_id }),
        )?;
        let manual: Option<bool> = read_json(response)?;
        Ok(manual.unwrap_or(false))
    }

    fn set_dossier_mode(&self, dossier_id: Uuid, manual: bool, actor: &Actor) -> Result<()> {
        tracing::info!(dossier = %dossier_id, manual, %actor, "setting dossier allocation mode");
        self.call_rpc(
            "set_dossier_allocation_mode",
            &json!({
                "p_dossier_id": dossier_id,
                "p_manual": manual,
                "p_changed_by": actor.as_str(),
            }),
        )?;
        Ok(())
    }

    fn record_cash_settlement(
        &self,
        settlement: &NewCashSettlement,
        actor: &Actor,
    ) -> Result<CashSettlement> {
        tracing::info!(
            dossier = %settlement.dossier_id,
            amount = %settlement.amount,
            %actor,
            "recording cash settlement"
        );
        let response = self.call_rpc(
            "insert_cash_settlement",
            &SettlementArgs {
                p_dossier_id: settlement.dossier_id,
                p_amount: settlement.amount,
                p_received_on: settlement.received_on,
                p_notes: settlement.notes.as_deref(),
                p_recorded_by: actor.as_str(),
            },
        )?;
        first_row(read_json(response)?, "cash settlement")
    }

    fn list_cash_settlements(&self, dossier_id: Uuid) -> Result<Vec<CashSettlement>> {
        self.get_rows(
            "cash_settlements",
            &[
                ("select", "*".to_string()),
                ("dossier_id", format!("eq.{dossier_id}")),
                ("order", "received_on.desc".to_string()),
            ],
        )
    }

    fn delete_cash_settlement(&self, settlement_id: Uuid, actor: &Actor) -> Result<()> {
        tracing::info!(settlement = %settlement_id, %actor, "deleting cash settlement");
        self.call_rpc(
            "delete_cash_settlement",
            &json!({ "p_settlement_id": settlement_id }),
        )?;
        Ok(())
    }
}

/// Turn a non-2xx response into `BillingError::Backend`
fn check(mut response: Response<Body>) -> Result<Response<Body>> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.body_mut().read_to_string().unwrap_or_default();
    tracing::debug!(status = status.as_u16(), %body, "backend error");
    Err(BillingError::Backend {
        status: status.as_u16(),
        message: backend_message(&body),
    })
}

fn read_json<T: DeserializeOwned>(response: Response<Body>) -> Result<T> {
    let mut response = check(response)?;
    let body = response.body_mut().read_to_string()?;
    Ok(serde_json::from_str(&body)?)
}

/// Set-returning procedures answer with an array, scalar ones with an object.
fn first_row<T: DeserializeOwned>(value: serde_json::Value, what: &str) -> Result<T> {
    let row = match value {
        serde_json::Value::Array(rows) => rows
            .into_iter()
            .next()
            .ok_or_else(|| BillingError::EmptyResponse(what.to_string()))?,
        other => other,
    };
    Ok(serde_json::from_value(row)?)
}

/// PostgREST errors are `{"code", "message", "details", "hint"}`; fall back to the raw body.
fn backend_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    if let Some(message) = parsed
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(|m| m.as_str())
    {
        return message.to_string();
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no details returned".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_message_prefers_postgrest_message() {
        let body = r#"{"code":"P0001","message":"allocation exceeds invoice balance","details":null,"hint":null}"#;
        assert_eq!(backend_message(body), "allocation exceeds invoice balance");
        assert_eq!(backend_message("  gateway timeout \n"), "gateway timeout");
        assert_eq!(backend_message(""), "no details returned");
    }

    #[test]
    fn test_urls_strip_trailing_slash() {
        let backend = RestBackend::new(&BackendSettings {
            url: "http://localhost:3000/".to_string(),
            api_key: None,
        });
        assert_eq!(backend.table("payments"), "http://localhost:3000/rest/v1/payments");
        assert_eq!(
            backend.rpc("allocate_payment_automatically"),
            "http://localhost:3000/rest/v1/rpc/allocate_payment_automatically"
        );
    }

    #[test]
    fn test_first_row_accepts_object_or_array() {
        let row = json!({
            "id": "7f4d3b1e-3c55-4b8e-9d3e-1f0b2f6a0a01",
            "dossier_id": "7f4d3b1e-3c55-4b8e-9d3e-1f0b2f6a0a02",
            "amount": "25.00",
            "received_on": "2026-05-04"
        });
        let single: CashSettlement = first_row(row.clone(), "cash settlement").unwrap();
        let listed: CashSettlement = first_row(json!([row]), "cash settlement").unwrap();
        assert_eq!(single, listed);
        assert!(matches!(
            first_row::<CashSettlement>(json!([]), "cash settlement"),
            Err(BillingError::EmptyResponse(_))
        ));
    }

    #[test]
    fn test_payment_row_flattens_request() {
        let payment = NewPayment::new(
            Uuid::nil(),
            Decimal::new(10000, 2),
            crate::model::PaymentMethod::Check,
        )
        .with_date(NaiveDate::from_ymd_opt(2026, 1, 2).unwrap());
        let value = serde_json::to_value(PaymentRow {
            payment: &payment,
            created_by: "alice",
        })
        .unwrap();
        assert_eq!(value["method"], "check");
        assert_eq!(value["created_by"], "alice");
        assert_eq!(value["auto_allocate"], true);
        assert!(value.get("reference").is_none());
    }
}
