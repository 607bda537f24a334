use async_trait::async_trait;
use tracing::warn;

use crate::client::ApiClient;
use crate::client::models::{CatalogEntry, CatalogKind};
use crate::errors::{Error, Result};
use crate::router::{Renderable, ViewContext, ViewInput};
use crate::types::Credential;

/// Herb and disease catalog management.
pub struct AdminView;

impl AdminView {
    async fn catalogs(api: &ApiClient, credential: Option<&Credential>) -> Result<String> {
        let herbs = api.list_catalog(credential, CatalogKind::Herb).await?;
        let diseases = api.list_catalog(credential, CatalogKind::Disease).await?;
        Ok(format!(
            "Admin Interface\n\nHerbs\n{}\n\nDiseases\n{}",
            catalog_table(&herbs),
            catalog_table(&diseases)
        ))
    }

    /// Report a completed write, followed by the refreshed catalogs when they can be listed.
    /// The write already happened, so a failed listing only becomes a note. A rejected
    /// credential still propagates so the session is reset.
    async fn after_write(api: &ApiClient, credential: Option<&Credential>, summary: String) -> Result<String> {
        match Self::catalogs(api, credential).await {
            Ok(listing) => Ok(format!("{summary}\n\n{listing}")),
            Err(Error::CredentialInvalidated) => Err(Error::CredentialInvalidated),
            Err(e) => {
                warn!("Could not refresh catalogs after write: {}", e);
                Ok(format!("{summary}\n\n(Catalog listing unavailable: {})", e.user_message()))
            }
        }
    }
}

fn catalog_table(entries: &[CatalogEntry]) -> String {
    if entries.is_empty() {
        return "(none)".to_string();
    }
    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|entry| {
            vec![
                entry.id.to_string(),
                entry.name.clone(),
                entry.description.clone().unwrap_or_default(),
            ]
        })
        .collect();
    super::render_table(&["ID", "Name", "Description"], &rows)
}

#[async_trait]
impl Renderable for AdminView {
    async fn render(&self, ctx: ViewContext<'_>) -> Result<String> {
        let credential = ctx.credential.as_ref();
        match ctx.input {
            ViewInput::Show => Self::catalogs(ctx.api, credential).await,
            ViewInput::CreateEntry { kind, entry } => {
                if entry.name.trim().is_empty() {
                    return Err(Error::BadRequest {
                        message: format!("{kind} name is required"),
                    });
                }
                let created = ctx.api.create_catalog_entry(credential, *kind, entry).await?;
                let summary = format!("Added {} #{}: {}", kind.to_string().to_lowercase(), created.id, created.name);
                Self::after_write(ctx.api, credential, summary).await
            }
            ViewInput::UpdateEntry { kind, id, update } => {
                if update.is_empty() {
                    return Err(Error::BadRequest {
                        message: "Nothing to update: pass --name and/or --description".to_string(),
                    });
                }
                let updated = ctx.api.update_catalog_entry(credential, *kind, *id, update).await?;
                let summary = format!("Updated {} #{}: {}", kind.to_string().to_lowercase(), updated.id, updated.name);
                Self::after_write(ctx.api, credential, summary).await
            }
            other => Err(super::unsupported(ctx.path, other)),
        }
    }
}
