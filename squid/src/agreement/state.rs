//! Observable progress of one agreement flow.

use std::fmt;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::SquidError;
use crate::types::AgreementId;

/// Lifecycle of an agreement as seen from this process.
///
/// `Rejected` is reached before anything is submitted to the ledger;
/// `Failed` covers errors while waiting (transport, timeout, cancellation).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum AgreementState {
    Init,
    Signed,
    PaymentPending,
    Paid,
    AccessPending,
    AccessGranted,
    Delivered,
    Rejected,
    Failed,
}

impl AgreementState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgreementState::Delivered | AgreementState::Rejected | AgreementState::Failed
        )
    }
}

impl fmt::Display for AgreementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgreementState::Init => "INIT",
            AgreementState::Signed => "SIGNED",
            AgreementState::PaymentPending => "PAYMENT_PENDING",
            AgreementState::Paid => "PAID",
            AgreementState::AccessPending => "ACCESS_PENDING",
            AgreementState::AccessGranted => "ACCESS_GRANTED",
            AgreementState::Delivered => "DELIVERED",
            AgreementState::Rejected => "REJECTED",
            AgreementState::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Handle to the background half of a flow.
///
/// Resolves with the flow's outcome; the current [`AgreementState`] can be
/// polled at any time.
pub struct FlowHandle<T> {
    agreement_id: AgreementId,
    state: watch::Receiver<AgreementState>,
    task: JoinHandle<Result<T, SquidError>>,
}

impl<T> FlowHandle<T> {
    pub(crate) fn new(
        agreement_id: AgreementId,
        state: watch::Receiver<AgreementState>,
        task: JoinHandle<Result<T, SquidError>>,
    ) -> Self {
        Self {
            agreement_id,
            state,
            task,
        }
    }

    pub fn agreement_id(&self) -> &AgreementId {
        &self.agreement_id
    }

    pub fn state(&self) -> AgreementState {
        *self.state.borrow()
    }

    /// Stops waiting. No further ledger calls are made for this flow.
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn wait(self) -> Result<T, SquidError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(SquidError::Cancelled),
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        }
    }
}

impl<T> fmt::Debug for FlowHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowHandle")
            .field("agreement_id", &self.agreement_id)
            .field("state", &self.state())
            .finish()
    }
}
