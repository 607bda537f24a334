use async_trait::async_trait;

use crate::errors::Result;
use crate::router::{Renderable, ViewContext, ViewInput};

/// The visitor's past diagnoses, newest first as returned by the backend.
pub struct HistoryView;

#[async_trait]
impl Renderable for HistoryView {
    async fn render(&self, ctx: ViewContext<'_>) -> Result<String> {
        if *ctx.input != ViewInput::Show {
            return Err(super::unsupported(ctx.path, ctx.input));
        }

        let logs = ctx.api.diagnosis_history(ctx.credential.as_ref()).await?;
        if logs.is_empty() {
            return Ok("Diagnosis History\n\nNo diagnoses yet.".to_string());
        }

        let rows: Vec<Vec<String>> = logs
            .iter()
            .map(|log| {
                let date = match log.recorded_at() {
                    Some(at) => at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    None => log.timestamp.clone().unwrap_or_default(),
                };
                vec![
                    date,
                    log.prescription.clone(),
                    log.predicted_disease.clone(),
                    super::percent(log.confidence),
                ]
            })
            .collect();
        Ok(format!(
            "Diagnosis History\n\n{}",
            super::render_table(&["Date", "Prescription", "Predicted Disease", "Confidence"], &rows)
        ))
    }
}
