//! Wire types shared between the backend and its clients.
//!
//! Every struct here is a JSON body (or fragment of one) on the REST
//! surface. Field names are camelCase on the wire, matching what the
//! mobile/web clients send.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request body for `POST /auth/send-otp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpRequest {
    /// Raw phone number as the user typed it (local or international form).
    pub phone_number: String,
}

/// Response body for `POST /auth/send-otp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpResponse {
    pub success: bool,
    /// Whether the phone already belongs to a family (parent or child).
    pub is_existing_family: bool,
    /// Whether the code was handed to the delivery collaborator.
    pub sms_sent: bool,
}

/// Request body for `POST /auth/verify-otp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    pub phone_number: String,
    pub otp_code: String,
}

/// Response body for `POST /auth/verify-otp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpResponse {
    pub success: bool,
    pub family_id: String,
    pub is_child: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_id: Option<String>,
    pub is_additional_parent: bool,
}

/// Request body for `POST /families/:familyId/children`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChildRequest {
    pub name: String,
    /// Optional phone for child sign-in; must be unique system-wide.
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// Child as reported by listing endpoints. Transaction history is
/// deliberately excluded; it is fetched through the transactions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildSummary {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub balance: f64,
    pub cash_box_balance: f64,
    pub weekly_allowance: f64,
    pub allowance_type: String,
    pub allowance_day: u32,
    pub allowance_time: String,
    pub weekly_interest_rate: f64,
    pub total_interest_earned: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub savings_goal: Option<SavingsGoalDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsGoalDto {
    pub name: String,
    pub target_amount: f64,
}

/// Request body for `POST /families/:familyId/transactions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    pub child_id: String,
    /// "deposit" or "expense".
    #[serde(rename = "type")]
    pub transaction_type: String,
    pub amount: f64,
    pub description: String,
    /// Category name; required for expenses.
    #[serde(default)]
    pub category: Option<String>,
}

/// Transaction as serialized on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDto {
    pub id: String,
    /// Serialized as an RFC 3339 timestamp.
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub transaction_type: String,
    pub amount: f64,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub child_id: String,
}

/// Response body for transaction creation: the posted transaction plus the
/// balance immediately after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionResponse {
    pub transaction: TransactionDto,
    pub new_balance: f64,
}

/// Request body for `PUT /families/:familyId/children/:childId/weekly-allowance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAllowanceRequest {
    pub weekly_allowance: f64,
    /// "weekly" or "monthly".
    pub allowance_type: String,
    /// 0-6 (Sunday-Saturday) for weekly, 1-31 for monthly.
    pub allowance_day: u32,
    /// "HH:mm" in the family's reference timezone.
    pub allowance_time: String,
    #[serde(default)]
    pub weekly_interest_rate: Option<f64>,
}

/// Request body for `PUT .../children/:childId/savings-goal`.
/// A null body clears the goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSavingsGoalRequest {
    #[serde(default)]
    pub goal: Option<SavingsGoalDto>,
}

/// Request body for category create/update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRequest {
    pub name: String,
    /// Child ids the category is usable for.
    #[serde(default)]
    pub active_for: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDto {
    pub id: String,
    pub name: String,
    pub active_for: Vec<String>,
}

/// Request body for task create/update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub active_for: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDto {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub active_for: Vec<String>,
}

/// Request body for `POST /families/:familyId/tasks/:taskId/request-payment`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPaymentRequest {
    pub child_id: String,
    #[serde(default)]
    pub note: Option<String>,
    /// Base64-encoded proof image; capped server-side.
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequestDto {
    pub id: String,
    pub task_id: String,
    pub task_name: String,
    pub task_price: f64,
    pub child_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// "pending", "approved" or "rejected".
    pub status: String,
    pub requested_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Request body for `PUT .../payment-requests/:requestId/status`
/// (administrative correction from the history screen).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRequestStatusRequest {
    /// "approved" or "rejected".
    pub status: String,
}

/// Request body for `POST /families/:familyId/parents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddParentRequest {
    pub phone_number: String,
    pub name: String,
}

/// Uniform error body returned with non-2xx statuses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Machine-readable error kind, e.g. "DuplicatePhone".
    pub error: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_transaction_dto_wire_shape() {
        let dto = TransactionDto {
            id: "dep-1-abcd".into(),
            date: Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap(),
            transaction_type: "deposit".into(),
            amount: 50.0,
            description: "birthday".into(),
            category: None,
            child_id: "child-1-0".into(),
        };
        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["date"], "2025-06-02T08:00:00Z");
        assert_eq!(json["type"], "deposit");
        assert_eq!(json["childId"], "child-1-0");
        assert!(json.get("category").is_none());

        let back: TransactionDto = serde_json::from_value(json).unwrap();
        assert_eq!(back, dto);
    }

    #[test]
    fn test_create_transaction_request_accepts_wire_form() {
        let request: CreateTransactionRequest = serde_json::from_str(
            r#"{"childId":"child-1-0","type":"expense","amount":12.5,
                "description":"lego","category":"Toys"}"#,
        )
        .unwrap();
        assert_eq!(request.transaction_type, "expense");
        assert_eq!(request.category.as_deref(), Some("Toys"));
    }
}
