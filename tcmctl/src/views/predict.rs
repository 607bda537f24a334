use async_trait::async_trait;

use crate::errors::{Error, Result};
use crate::router::{Renderable, ViewContext, ViewInput};

/// Submits prescription text and shows the most likely diseases.
pub struct PredictView;

#[async_trait]
impl Renderable for PredictView {
    async fn render(&self, ctx: ViewContext<'_>) -> Result<String> {
        let prescription = match ctx.input {
            ViewInput::Show => return Ok("Enter a prescription with `tcmctl predict \"<prescription>\"`.".to_string()),
            ViewInput::Predict { prescription } => prescription.trim(),
            other => return Err(super::unsupported(ctx.path, other)),
        };
        if prescription.is_empty() {
            return Err(Error::BadRequest {
                message: "Prescription text is empty".to_string(),
            });
        }

        let predictions = ctx.api.predict(ctx.credential.as_ref(), prescription).await?;
        if predictions.is_empty() {
            return Ok("No predictions for this prescription.".to_string());
        }
        let lines: Vec<String> = predictions
            .iter()
            .map(|p| format!("{}: {}", p.disease, super::percent(p.probability)))
            .collect();
        Ok(lines.join("\n"))
    }
}
