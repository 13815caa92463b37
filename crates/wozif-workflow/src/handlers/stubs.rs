//! Placeholder handlers for memory and calendar nodes. They succeed with
//! canned data so workflows using them can be exercised end to end.

use serde_json::{json, Value};
use tracing::debug;

use wozif_core::types::{keys, ExecutionContext, NodeId, NodeResult};

use crate::spec::{AvailabilityConfig, BookingConfig, CancellationConfig, MemoryConfig};

const CANNED_SLOTS: [&str; 6] = [
    "Lundi 14:00",
    "Lundi 14:30",
    "Lundi 15:00",
    "Mardi 09:00",
    "Mardi 09:30",
    "Mardi 10:00",
];
const CANNED_BOOKING_ID: &str = "BK-9988";

pub fn long_term_memory(id: NodeId, config: &MemoryConfig, context: &ExecutionContext) -> NodeResult {
    let user_id = context.get_str(keys::USER_ID).unwrap_or("anonymous");
    let message = if config.action == "store" {
        format!("Clé '{}' sauvegardée pour {}", config.key, user_id)
    } else {
        format!("Clé '{}' chargée pour {}", config.key, user_id)
    };
    NodeResult::success(id, message)
}

pub fn check_availability(
    id: NodeId,
    config: &AvailabilityConfig,
    context: &mut ExecutionContext,
) -> NodeResult {
    debug!(timezone = %config.timezone, duration = config.duration, "Checking availability");
    let formatted = CANNED_SLOTS
        .iter()
        .map(|slot| format!("- {}", slot))
        .collect::<Vec<_>>()
        .join("\n");
    context.set("available_slots", json!(CANNED_SLOTS));
    context.set_str("formatted_slots", formatted);

    NodeResult::success(
        id,
        format!(
            "Trouvé {} créneaux disponibles pour une durée de {}min.",
            CANNED_SLOTS.len(),
            config.duration
        ),
    )
    .with_field("slots", json!(CANNED_SLOTS))
}

pub fn book_appointment(id: NodeId, config: &BookingConfig, context: &ExecutionContext) -> NodeResult {
    debug!(calendar_id = %config.calendar_id, "Booking appointment");
    let date = match context.get(keys::SELECTED_DATE) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "Demain à 10h00".to_string(),
        Some(other) => other.to_string(),
    };
    NodeResult::success(id, format!("RDV '{}' confirmé pour {}.", config.title, date))
        .with_field("booking_id", json!(CANNED_BOOKING_ID))
        .with_field("date", Value::String(date))
}

pub fn cancel_appointment(id: NodeId, config: &CancellationConfig) -> NodeResult {
    NodeResult::success(id, format!("RDV {} annulé avec succès.", config.booking_id))
}

/// Unrecognized node types are skipped without touching the context.
pub fn unknown(id: NodeId, tag: &str) -> NodeResult {
    debug!(node_id = %id, node_type = tag, "No handler for node type");
    NodeResult::success(id, format!("Bloc {} passé (non implémenté)", tag))
}
