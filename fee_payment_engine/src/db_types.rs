use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use fpg_common::{Money, DEFAULT_CURRENCY_CODE};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------   PaymentStatus     ---------------------------------------------------------
/// The canonical settlement vocabulary. Everything the gateway says, over any channel, is folded into one of these
/// four states before it touches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// No terminal signal has arrived yet.
    Pending,
    /// The payment settled.
    Success,
    /// The payment was attempted and did not settle.
    Failed,
    /// The payer or the gateway abandoned the attempt.
    Cancelled,
}

impl PaymentStatus {
    /// Fold an arbitrary gateway status token into the canonical vocabulary.
    ///
    /// Total and deterministic: matching is case-insensitive, and anything unrecognized (including an empty
    /// token) is `Pending`. All three ingestion channels normalize through this one function before comparing or
    /// writing, so the synonym table lives here and nowhere else.
    pub fn normalize(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "success" | "successful" | "completed" | "paid" | "captured" | "authorized" => Self::Success,
            "failed" | "failure" | "declined" | "rejected" | "error" => Self::Failed,
            "cancelled" | "canceled" | "abandoned" | "aborted" => Self::Cancelled,
            _ => Self::Pending,
        }
    }

    /// A terminal status is one a lower-trust channel may no longer change.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl Default for PaymentStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid payment status: {0}")]
pub struct StatusConversionError(String);

impl FromStr for PaymentStatus {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(StatusConversionError(s.to_string())),
        }
    }
}

//--------------------------------------      Channel        ---------------------------------------------------------
/// The ingestion channel asserting a status, ordered by how much we trust it.
///
/// Browser-redirect parameters are attacker-influenceable, a poll answer comes straight from the gateway's status
/// API, and a webhook is a signature-verified push. Conflicts between channels are resolved by this ordering
/// alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Callback,
    Poller,
    Webhook,
}

impl Channel {
    pub fn trust(&self) -> u8 {
        match self {
            Self::Callback => 0,
            Self::Poller => 1,
            Self::Webhook => 2,
        }
    }

    /// The monotonic-trust rule. A write through `self` may replace what is currently recorded iff one of:
    ///
    /// 1. `self` is the webhook channel — an authenticated webhook is authoritative and always wins, including
    ///    over a terminal value a lower-trust channel guessed first;
    /// 2. the current status is still pending — any channel may settle an unsettled record;
    /// 3. the write agrees with the current status — re-asserting the same state is always harmless;
    /// 4. `self` outranks the channel that set the current value.
    ///
    /// Everything else is rejected, which is what keeps a stale callback from flipping a settled record.
    pub fn allows_transition(
        &self,
        current_status: PaymentStatus,
        current_source: Channel,
        new_status: PaymentStatus,
    ) -> bool {
        *self == Self::Webhook
            || !current_status.is_terminal()
            || new_status == current_status
            || self.trust() > current_source.trust()
    }
}

impl Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Callback => write!(f, "callback"),
            Self::Poller => write!(f, "poller"),
            Self::Webhook => write!(f, "webhook"),
        }
    }
}

//--------------------------------------      OrderId        ---------------------------------------------------------
/// The opaque id this system assigns to a payment intent at creation.
#[derive(Debug, Clone, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    /// Ids are random, not sequential, since they travel through browser query strings.
    pub fn random() -> Self {
        Self(format!("ord-{:016x}", rand::random::<u64>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------     CollectId       ---------------------------------------------------------
/// The gateway's handle for one payment attempt. Assigned by the gateway at initiation and echoed back on every
/// subsequent status signal, which makes it the hot lookup path.
#[derive(Debug, Clone, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct CollectId(pub String);

impl CollectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CollectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CollectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for CollectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------    StudentInfo      ---------------------------------------------------------
/// The student a fee payment is collected for. Only the name is required from callers; the id and email are
/// generated when absent so downstream records are always fully populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentInfo {
    pub name: String,
    pub student_id: String,
    pub email: String,
}

impl StudentInfo {
    pub fn with_defaults(name: String, student_id: Option<String>, email: Option<String>) -> Self {
        let student_id = student_id.unwrap_or_else(|| format!("stu-{:08x}", rand::random::<u32>()));
        let email = email.unwrap_or_else(|| format!("{student_id}@students.invalid"));
        Self { name, student_id, email }
    }
}

//--------------------------------------      NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    /// The school this deployment collects fees for.
    pub school_id: String,
    /// Identifier of the collector who initiated the payment, when the auth layer supplies one.
    pub initiated_by: Option<String>,
    pub student: StudentInfo,
    /// Name of the gateway the collect request will be routed through.
    pub gateway: String,
    pub amount: Money,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(school_id: String, gateway: String, amount: Money, student: StudentInfo) -> Self {
        Self {
            order_id: OrderId::random(),
            school_id,
            initiated_by: None,
            student,
            gateway,
            amount,
            currency: DEFAULT_CURRENCY_CODE.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn with_initiated_by(mut self, user: String) -> Self {
        self.initiated_by = Some(user);
        self
    }
}

//--------------------------------------        Order        ---------------------------------------------------------
/// The payment intent. Created once, never deleted; the status field mirrors the settlement record's canonical
/// status so list views never need a join.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub school_id: String,
    pub initiated_by: Option<String>,
    pub student_name: String,
    pub student_id: String,
    pub student_email: String,
    pub gateway: String,
    pub amount: Money,
    pub currency: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------    OrderStatus      ---------------------------------------------------------
/// The mutable settlement record for one order, keyed by the gateway's collect id.
///
/// `source_channel` remembers which channel last set the status; the monotonic-trust rule needs it to decide
/// whether the next writer may overwrite. The record starts pending, attributed to the lowest-trust channel, so
/// any channel may settle it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderStatus {
    pub collect_id: CollectId,
    pub order_id: OrderId,
    pub order_amount: Money,
    /// What the payer was actually charged. May differ from `order_amount` by gateway fees.
    pub transaction_amount: Option<Money>,
    pub payment_mode: Option<String>,
    pub payment_details: Option<String>,
    pub bank_reference: Option<String>,
    pub payment_message: Option<String>,
    pub status: PaymentStatus,
    pub source_channel: Channel,
    pub error_message: Option<String>,
    pub payment_time: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------    StatusUpdate     ---------------------------------------------------------
/// One channel's assertion about a settlement. Fields left `None` keep whatever the record already holds —
/// except when the webhook channel writes, which replaces every mutable field wholesale.
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub status: PaymentStatus,
    pub transaction_amount: Option<Money>,
    pub payment_mode: Option<String>,
    pub payment_details: Option<String>,
    pub bank_reference: Option<String>,
    pub payment_message: Option<String>,
    pub error_message: Option<String>,
    pub payment_time: Option<DateTime<Utc>>,
}

impl StatusUpdate {
    pub fn new(status: PaymentStatus) -> Self {
        Self { status, ..Default::default() }
    }
}

//--------------------------------------   UpdateOutcome     ---------------------------------------------------------
/// What became of an attempted status write. A rejected write is not an error; it means a higher-trust channel
/// got there first, and the caller carries on with the record as it stands.
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    /// The write was applied; this is the record afterwards.
    Applied(OrderStatus),
    /// The monotonic-trust rule rejected the write; this is the untouched record.
    Superseded(OrderStatus),
}

impl UpdateOutcome {
    pub fn record(&self) -> &OrderStatus {
        match self {
            Self::Applied(r) | Self::Superseded(r) => r,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn normalizer_recognizes_success_synonyms() {
        for token in ["success", "Successful", "COMPLETED", "paid", "Captured", "authorized"] {
            assert_eq!(PaymentStatus::normalize(token), PaymentStatus::Success, "{token}");
        }
    }

    #[test]
    fn normalizer_recognizes_failure_synonyms() {
        for token in ["failed", "FAILURE", "declined", "Rejected", "error"] {
            assert_eq!(PaymentStatus::normalize(token), PaymentStatus::Failed, "{token}");
        }
    }

    #[test]
    fn normalizer_recognizes_cancellation_synonyms() {
        for token in ["cancelled", "canceled", "ABANDONED", "aborted"] {
            assert_eq!(PaymentStatus::normalize(token), PaymentStatus::Cancelled, "{token}");
        }
    }

    #[test]
    fn normalizer_defaults_to_pending() {
        for token in ["", "   ", "pending", "in_progress", "what-even-is-this", "süccess"] {
            assert_eq!(PaymentStatus::normalize(token), PaymentStatus::Pending, "{token:?}");
        }
    }

    #[test]
    fn normalizer_trims_whitespace() {
        assert_eq!(PaymentStatus::normalize("  SUCCESS  "), PaymentStatus::Success);
    }

    #[test]
    fn any_channel_may_settle_a_pending_record() {
        use Channel::*;
        for channel in [Callback, Poller, Webhook] {
            assert!(channel.allows_transition(PaymentStatus::Pending, Callback, PaymentStatus::Success));
            assert!(channel.allows_transition(PaymentStatus::Pending, Callback, PaymentStatus::Failed));
        }
    }

    #[test]
    fn callback_cannot_flip_a_terminal_status() {
        use Channel::*;
        assert!(!Callback.allows_transition(PaymentStatus::Success, Webhook, PaymentStatus::Failed));
        assert!(!Callback.allows_transition(PaymentStatus::Failed, Poller, PaymentStatus::Success));
        assert!(!Callback.allows_transition(PaymentStatus::Success, Callback, PaymentStatus::Cancelled));
    }

    #[test]
    fn agreement_is_always_allowed() {
        use Channel::*;
        assert!(Callback.allows_transition(PaymentStatus::Success, Webhook, PaymentStatus::Success));
        assert!(Poller.allows_transition(PaymentStatus::Failed, Poller, PaymentStatus::Failed));
    }

    #[test]
    fn poller_outranks_callback_but_not_webhook() {
        use Channel::*;
        assert!(Poller.allows_transition(PaymentStatus::Failed, Callback, PaymentStatus::Success));
        assert!(!Poller.allows_transition(PaymentStatus::Success, Webhook, PaymentStatus::Failed));
        assert!(!Poller.allows_transition(PaymentStatus::Success, Poller, PaymentStatus::Failed));
    }

    #[test]
    fn webhook_always_wins() {
        use Channel::*;
        assert!(Webhook.allows_transition(PaymentStatus::Failed, Poller, PaymentStatus::Success));
        assert!(Webhook.allows_transition(PaymentStatus::Success, Webhook, PaymentStatus::Failed));
        assert!(Webhook.allows_transition(PaymentStatus::Cancelled, Callback, PaymentStatus::Success));
    }

    #[test]
    fn student_defaults_are_generated() {
        let student = StudentInfo::with_defaults("Asha".to_string(), None, None);
        assert!(student.student_id.starts_with("stu-"));
        assert!(student.email.contains('@'));
        let explicit = StudentInfo::with_defaults(
            "Asha".to_string(),
            Some("ENR-42".to_string()),
            Some("asha@school.example".to_string()),
        );
        assert_eq!(explicit.student_id, "ENR-42");
        assert_eq!(explicit.email, "asha@school.example");
    }
}
