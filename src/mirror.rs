// Google Sheets mirror: one SheetStore per tab, a shared rate limiter, and the outbound queue.

use std::sync::Arc;

use crate::config::GoogleSheetsConfig;
use crate::models::RecordKind;
use crate::outbound_queue::OutboundQueue;
use crate::sheets::{GoogleSheetsClient, RateLimiter, SheetStore, TabularClient};

pub struct Mirror {
    pub samples: Arc<SheetStore>,
    pub aggregates: Option<Arc<SheetStore>>,
    pub queue: Arc<OutboundQueue>,
}

impl Mirror {
    /// The aggregate tab exists only when daily aggregates are enabled.
    pub fn new(
        client: Arc<dyn TabularClient>,
        sheets: &GoogleSheetsConfig,
        aggregates_enabled: bool,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::default());
        let samples = Arc::new(SheetStore::new(
            client.clone(),
            limiter.clone(),
            sheets.sheet_name.clone(),
            RecordKind::Sample,
        ));
        let aggregates = aggregates_enabled.then(|| {
            Arc::new(SheetStore::new(
                client,
                limiter,
                sheets.daily_average_sheet_name.clone(),
                RecordKind::DailyAggregate,
            ))
        });
        let queue = Arc::new(OutboundQueue::new(Some(samples.clone()), aggregates.clone()));
        Self {
            samples,
            aggregates,
            queue,
        }
    }

    /// Builds the Google Sheets client from the configured spreadsheet and credentials.
    pub async fn connect(sheets: &GoogleSheetsConfig, aggregates_enabled: bool) -> anyhow::Result<Self> {
        let spreadsheet_id = sheets
            .spreadsheet_id
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("google_sheets.spreadsheet_id is required"))?;
        let credentials_path = sheets
            .credentials_path
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("google_sheets.credentials_path is required"))?;
        let client = GoogleSheetsClient::from_credentials_file(spreadsheet_id, credentials_path).await?;
        Ok(Self::new(Arc::new(client), sheets, aggregates_enabled))
    }
}
