//! The views behind the router.
//!
//! Each view is a thin request/response unit: it calls the backend with the credential it was
//! handed and formats the answer as text. None of them make access decisions; by the time a view
//! renders, the guard has already admitted the navigation.

mod admin;
mod history;
mod login;
mod predict;
mod register;

pub use admin::AdminView;
pub use history::HistoryView;
pub use login::LoginView;
pub use predict::PredictView;
pub use register::RegisterView;

use crate::auth::guard::RouteGuard;
use crate::client::ApiClient;
use crate::config::RoutesConfig;
use crate::errors::{Error, Result};
use crate::router::{Router, ViewInput};

/// Router with every view mounted at its conventional path and the login view at the configured
/// login path.
pub fn standard_router(routes: &RoutesConfig, api: ApiClient) -> Router {
    Router::new(RouteGuard::from_config(routes), api)
        .route(&routes.login_path, LoginView)
        .route("/register", RegisterView)
        .route("/predict", PredictView)
        .route("/history", HistoryView)
        .route("/admin", AdminView)
}

pub(crate) fn unsupported(path: &str, input: &ViewInput) -> Error {
    Error::BadRequest {
        message: format!("{path} does not support {input:?}"),
    }
}

/// Plain-text table with columns padded to their widest cell.
pub(crate) fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell}{}", " ".repeat(width - cell.chars().count())))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![line(headers.to_vec())];
    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push(line(separator.iter().map(String::as_str).collect()));
    for row in rows {
        out.push(line(row.iter().map(String::as_str).collect()));
    }
    out.join("\n")
}

pub(crate) fn percent(probability: f64) -> String {
    format!("{:.2}%", probability * 100.0)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_table_pads_columns() {
        let table = render_table(
            &["ID", "Name"],
            &[
                vec!["1".to_string(), "Ginseng".to_string()],
                vec!["12".to_string(), "Licorice root".to_string()],
            ],
        );
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "ID  Name");
        assert_eq!(lines[1], "--  -------------");
        assert_eq!(lines[2], "1   Ginseng");
        assert_eq!(lines[3], "12  Licorice root");
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0.7234), "72.34%");
        assert_eq!(percent(1.0), "100.00%");
    }
}
