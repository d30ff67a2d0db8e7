//! The collections tool set served by `collections-tools`.
//!
//! Four tools: two reads over the ledger and two side-effecting actions.
//! Handlers only see plain JSON arguments and a [`CollectionsBackend`]; they
//! know nothing about framing or the agent loop.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;

use super::errors::{ProviderError, ToolError};
use super::ledger::{CollectionNote, CollectionsBackend, OutgoingEmail};
use super::registry::{string_arg, ToolDescriptor, ToolRegistry};

pub const LIST_CUSTOMERS_WITH_BALANCE: &str = "list_customers_with_balance";
pub const GET_CUSTOMER_BALANCE: &str = "get_customer_balance";
pub const SEND_COLLECTION_EMAIL: &str = "send_collection_email";
pub const RECORD_COLLECTION_NOTE: &str = "record_collection_note";

/// Build the registry with all four collections tools.
pub fn collections_registry(
    backend: Arc<dyn CollectionsBackend>,
) -> Result<ToolRegistry, ProviderError> {
    let mut registry = ToolRegistry::new();

    let b = Arc::clone(&backend);
    registry.register(
        ToolDescriptor::read(
            LIST_CUSTOMERS_WITH_BALANCE,
            "List the ids of all customers that have at least one open invoice with an outstanding balance. Takes no arguments.",
            serde_json::json!({"type": "object", "properties": {}}),
        ),
        move |_| {
            let b = Arc::clone(&b);
            async move { list_customers_with_balance(b.as_ref()).await }
        },
    )?;

    let b = Arc::clone(&backend);
    registry.register(
        ToolDescriptor::read(
            GET_CUSTOMER_BALANCE,
            "Get a customer's contact details, open invoices and total outstanding balance (in cents).",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "customer_id": {"type": "string", "description": "Customer id, e.g. C001"}
                },
                "required": ["customer_id"]
            }),
        ),
        move |args| {
            let b = Arc::clone(&b);
            async move { get_customer_balance(b.as_ref(), &args).await }
        },
    )?;

    let b = Arc::clone(&backend);
    registry.register(
        ToolDescriptor::side_effecting(
            SEND_COLLECTION_EMAIL,
            "Send a payment reminder email to a customer's billing address. This really sends mail; call it at most once per customer.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "customer_id": {"type": "string"},
                    "subject": {"type": "string"},
                    "body": {"type": "string"}
                },
                "required": ["customer_id", "subject", "body"]
            }),
        ),
        move |args| {
            let b = Arc::clone(&b);
            async move { send_collection_email(b.as_ref(), &args).await }
        },
    )?;

    let b = backend;
    registry.register(
        ToolDescriptor::side_effecting(
            RECORD_COLLECTION_NOTE,
            "Record a note in a customer's collection history.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "customer_id": {"type": "string"},
                    "note": {"type": "string"}
                },
                "required": ["customer_id", "note"]
            }),
        ),
        move |args| {
            let b = Arc::clone(&b);
            async move { record_collection_note(b.as_ref(), &args).await }
        },
    )?;

    Ok(registry)
}

// ─── Handlers ───────────────────────────────────────────────────────────────

async fn list_customers_with_balance(
    backend: &dyn CollectionsBackend,
) -> Result<serde_json::Value, ToolError> {
    let ids: BTreeSet<String> = backend
        .invoices()
        .await?
        .into_iter()
        .filter(|inv| inv.is_outstanding())
        .map(|inv| inv.customer_id)
        .collect();

    Ok(serde_json::json!(ids))
}

async fn get_customer_balance(
    backend: &dyn CollectionsBackend,
    args: &serde_json::Value,
) -> Result<serde_json::Value, ToolError> {
    let customer_id = string_arg(args, "customer_id")?;

    let Some(customer) = backend.customer(&customer_id).await? else {
        return Ok(serde_json::json!({
            "error": format!("customer '{customer_id}' not found")
        }));
    };

    let mut open: Vec<_> = backend
        .invoices()
        .await?
        .into_iter()
        .filter(|inv| inv.customer_id == customer_id && inv.is_outstanding())
        .collect();
    open.sort_by(|a, b| a.due_date.cmp(&b.due_date));

    let total: i64 = open.iter().map(|inv| inv.balance_cents).sum();
    let invoices: Vec<serde_json::Value> = open
        .iter()
        .map(|inv| {
            serde_json::json!({
                "invoice_id": inv.invoice_id,
                "balance_cents": inv.balance_cents,
                "due_date": inv.due_date,
            })
        })
        .collect();

    Ok(serde_json::json!({
        "customer_id": customer.id,
        "name": customer.name,
        "email": customer.email,
        "open_invoices": invoices,
        "total_outstanding_cents": total,
    }))
}

async fn send_collection_email(
    backend: &dyn CollectionsBackend,
    args: &serde_json::Value,
) -> Result<serde_json::Value, ToolError> {
    let customer_id = string_arg(args, "customer_id")?;
    let subject = string_arg(args, "subject")?;
    let body = string_arg(args, "body")?;

    if subject.trim().is_empty() || body.trim().is_empty() {
        return Err(ToolError::InvalidArguments {
            tool: SEND_COLLECTION_EMAIL.to_string(),
            reason: "subject and body must not be empty; email was NOT sent".to_string(),
        });
    }

    let customer = backend
        .customer(&customer_id)
        .await?
        .ok_or_else(|| ToolError::NotFound {
            what: format!("customer '{customer_id}' (email was NOT sent)"),
        })?;

    let Some(to) = customer.email.filter(|e| !e.trim().is_empty()) else {
        return Err(ToolError::Failed {
            reason: format!("customer '{customer_id}' has no email address on file; email was NOT sent"),
        });
    };

    let email = OutgoingEmail {
        message_id: uuid::Uuid::new_v4().to_string(),
        customer_id,
        to,
        subject,
        body,
        sent_at: Utc::now(),
    };
    backend.send_email(&email).await?;

    tracing::info!(
        customer_id = %email.customer_id,
        message_id = %email.message_id,
        "collection email sent"
    );

    Ok(serde_json::json!({
        "status": "sent",
        "message_id": email.message_id,
        "to": email.to,
    }))
}

async fn record_collection_note(
    backend: &dyn CollectionsBackend,
    args: &serde_json::Value,
) -> Result<serde_json::Value, ToolError> {
    let customer_id = string_arg(args, "customer_id")?;
    let note = string_arg(args, "note")?;

    if note.trim().is_empty() {
        return Err(ToolError::InvalidArguments {
            tool: RECORD_COLLECTION_NOTE.to_string(),
            reason: "note must not be empty; nothing was recorded".to_string(),
        });
    }

    if backend.customer(&customer_id).await?.is_none() {
        return Err(ToolError::NotFound {
            what: format!("customer '{customer_id}' (note was NOT recorded)"),
        });
    }

    let record = CollectionNote {
        note_id: uuid::Uuid::new_v4().to_string(),
        customer_id,
        note,
        recorded_at: Utc::now(),
    };
    backend.record_note(&record).await?;

    Ok(serde_json::json!({
        "status": "recorded",
        "note_id": record.note_id,
    }))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
