//! The status poller: ask the gateway what actually happened to a collect request, and feed the answer to the
//! reconciliation engine through the poller channel.
//!
//! Polling is deliberately forgiving. It runs inside a callback that has promised the payer's browser a redirect
//! no matter what, so every failure — transport, timeout, unparseable body, store trouble — collapses to
//! [`PollOutcome::Inconclusive`] and the record simply stays as it was.

use collect_gateway::{CollectGateway, CollectStatusReport};
use fee_payment_engine::{
    db_types::{Channel, CollectId, OrderStatus, PaymentStatus, StatusUpdate, UpdateOutcome},
    PaymentFlowApi,
    PaymentStore,
};
use log::*;

#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// The gateway answered and its answer was applied.
    Applied(OrderStatus),
    /// The gateway answered, but a higher-trust channel had already settled the record.
    Superseded(OrderStatus),
    /// The gateway could not be asked, or the answer could not be used. Nothing was written.
    Inconclusive,
}

impl PollOutcome {
    pub fn record(&self) -> Option<&OrderStatus> {
        match self {
            Self::Applied(r) | Self::Superseded(r) => Some(r),
            Self::Inconclusive => None,
        }
    }
}

/// Query the gateway's authoritative status endpoint for `collect_id` and apply the normalized result.
pub async fn poll_and_apply<B, G>(
    api: &PaymentFlowApi<B>,
    gateway: &G,
    collect_id: &CollectId,
) -> PollOutcome
where
    B: PaymentStore,
    G: CollectGateway,
{
    let report = match gateway.collect_status(collect_id.as_str()).await {
        Ok(report) => report,
        Err(e) => {
            warn!("🔍️ Status poll for [{collect_id}] was inconclusive: {e}");
            return PollOutcome::Inconclusive;
        },
    };
    let update = status_update_from_report(&report);
    match api.apply_status_update(Channel::Poller, collect_id, update).await {
        Ok(UpdateOutcome::Applied(record)) => PollOutcome::Applied(record),
        Ok(UpdateOutcome::Superseded(record)) => PollOutcome::Superseded(record),
        Err(e) => {
            warn!("🔍️ Could not apply poll result for [{collect_id}]: {e}");
            PollOutcome::Inconclusive
        },
    }
}

pub(crate) fn status_update_from_report(report: &CollectStatusReport) -> StatusUpdate {
    StatusUpdate {
        status: PaymentStatus::normalize(&report.status),
        transaction_amount: report.transaction_amount,
        payment_mode: report.payment_mode.clone(),
        payment_details: report.payment_details.clone(),
        bank_reference: report.bank_reference.clone(),
        payment_message: report.payment_message.clone(),
        error_message: report.error_message.clone(),
        payment_time: report.payment_time,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reports_are_normalized_before_application() {
        let report = CollectStatusReport { status: "CAPTURED".to_string(), ..Default::default() };
        let update = status_update_from_report(&report);
        assert_eq!(update.status, PaymentStatus::Success);

        let report = CollectStatusReport { status: "anything else".to_string(), ..Default::default() };
        assert_eq!(status_update_from_report(&report).status, PaymentStatus::Pending);
    }
}
