use serde::{Deserialize, Serialize};
use settlement_engine::{records::ExportFormat, WebhookOutcome};

/// The reply to a gateway callback. The gateway only looks at the status code; the body is for operators.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub outcome: WebhookOutcome,
}

impl From<WebhookOutcome> for WebhookResponse {
    fn from(outcome: WebhookOutcome) -> Self {
        let message = match &outcome {
            WebhookOutcome::Settled(receipt) => format!("Transaction {} settled", receipt.transaction_id()),
            WebhookOutcome::AlreadyProcessed(payment) => {
                format!("Transaction {} was already processed", payment.transaction_id)
            },
            WebhookOutcome::FailureRecorded { transaction_id, reversed: Some(_) } => {
                format!("Transaction {transaction_id} failed. The settlement was reversed")
            },
            WebhookOutcome::FailureRecorded { transaction_id, reversed: None } => {
                format!("Transaction {transaction_id} failed")
            },
        };
        Self { success: true, message, outcome }
    }
}

/// Query parameters for the recovery endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RecoveryParams {
    /// The format of the uploaded export.
    #[serde(default)]
    pub format: ExportFormat,
    /// The format of the generated recovery file. Defaults to the upload format.
    pub output: Option<ExportFormat>,
}

impl RecoveryParams {
    pub fn output_format(&self) -> ExportFormat {
        self.output.unwrap_or(self.format)
    }
}
