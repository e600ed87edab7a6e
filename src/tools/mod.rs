//! Side-effecting support tools the engine may invoke.
//!
//! The registry is a closed set: one variant per operation, dispatched on
//! the wire name the reasoning provider returns. Parameters arrive as the
//! opaque JSON map from the provider and are validated per tool.

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::{ToolError, ToolResult};

/// Orders are refundable for this many days after purchase.
const REFUND_WINDOW_DAYS: u32 = 30;

/// The closed set of support tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportTool {
    /// Send a password-reset email.
    ResetPassword,
    /// Check whether an order is inside the refund window.
    CheckRefundPolicy,
    /// Open a ticket for non-urgent human follow-up.
    CreateTicket,
    /// Hand the conversation to a human agent.
    EscalateToHuman,
}

impl SupportTool {
    /// Resolve a wire name from the reasoning provider. `"none"` and
    /// unknown names both return `None`; the caller treats the latter as
    /// a lookup miss, not an error.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "reset_password" => Some(SupportTool::ResetPassword),
            "check_refund_policy" => Some(SupportTool::CheckRefundPolicy),
            "create_ticket" => Some(SupportTool::CreateTicket),
            "escalate_to_human" => Some(SupportTool::EscalateToHuman),
            _ => None,
        }
    }

    /// The string-keyed name used on the wire.
    pub fn wire_name(&self) -> &'static str {
        match self {
            SupportTool::ResetPassword => "reset_password",
            SupportTool::CheckRefundPolicy => "check_refund_policy",
            SupportTool::CreateTicket => "create_ticket",
            SupportTool::EscalateToHuman => "escalate_to_human",
        }
    }

    /// Execute the tool with the provider-supplied parameters.
    pub async fn execute(&self, params: &Value) -> ToolResult<Value> {
        match self {
            SupportTool::ResetPassword => {
                let params: ResetPasswordParams = parse_params(self, params)?;
                info!(email = %params.email, "Password reset initiated");
                Ok(json!({
                    "success": true,
                    "action": "email_sent",
                    "message": "Password reset email has been sent. Please check your inbox."
                }))
            }
            SupportTool::CheckRefundPolicy => {
                let params: CheckRefundPolicyParams = parse_params(self, params)?;
                // Without an orders backend the purchase age is simulated;
                // a stable hash keeps repeated checks consistent.
                let days_since_purchase = params
                    .days_since_purchase
                    .unwrap_or_else(|| simulated_purchase_age(&params.order_id));
                let eligible = days_since_purchase <= REFUND_WINDOW_DAYS;
                Ok(json!({
                    "order_id": params.order_id,
                    "eligible": eligible,
                    "days_since_purchase": days_since_purchase,
                    "reason": if eligible {
                        "Order is within 30-day refund window"
                    } else {
                        "Order is past the 30-day refund window"
                    }
                }))
            }
            SupportTool::CreateTicket => {
                let params: CreateTicketParams = parse_params(self, params)?;
                let ticket_id = format!("TKT-{}", base36_upper(Utc::now().timestamp_millis()));
                info!(ticket_id = %ticket_id, title = %params.title, "Ticket created");
                Ok(json!({
                    "ticket_id": ticket_id,
                    "status": "created",
                    "priority": params.priority,
                    "message": format!("Ticket {} has been created and will be reviewed shortly.", ticket_id)
                }))
            }
            SupportTool::EscalateToHuman => {
                let params: EscalateToHumanParams = parse_params(self, params)?;
                info!(reason = %params.reason, "Escalation triggered");
                let estimated_wait = if params.urgency == "high" {
                    "2-5 minutes"
                } else {
                    "10-15 minutes"
                };
                Ok(json!({
                    "escalated": true,
                    "estimated_wait": estimated_wait,
                    "message": "Connecting you with a human specialist who can better assist you."
                }))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResetPasswordParams {
    email: String,
}

#[derive(Debug, Deserialize)]
struct CheckRefundPolicyParams {
    order_id: String,
    days_since_purchase: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CreateTicketParams {
    title: String,
    #[serde(default = "default_priority")]
    priority: String,
    #[serde(default)]
    #[allow(dead_code)]
    description: String,
}

fn default_priority() -> String {
    "medium".to_string()
}

#[derive(Debug, Deserialize)]
struct EscalateToHumanParams {
    #[serde(default)]
    reason: String,
    #[serde(default = "default_urgency")]
    urgency: String,
}

fn default_urgency() -> String {
    "normal".to_string()
}

fn parse_params<T: serde::de::DeserializeOwned>(
    tool: &SupportTool,
    params: &Value,
) -> ToolResult<T> {
    serde_json::from_value(params.clone()).map_err(|e| ToolError::Validation {
        field: tool.wire_name().to_string(),
        reason: e.to_string(),
    })
}

/// Deterministic 0..45 day purchase age derived from the order id (FNV-1a).
fn simulated_purchase_age(order_id: &str) -> u32 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in order_id.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    (hash % 45) as u32
}

fn base36_upper(mut value: i64) -> String {
    const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if value <= 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize] as char);
        value /= 36;
    }
    out.reverse();
    out.into_iter().collect()
}
