use async_trait::async_trait;

use crate::errors::Result;
use crate::router::{Renderable, ViewContext, ViewInput};

/// Sign-in entry point. Every refused navigation ends up here.
pub struct LoginView;

#[async_trait]
impl Renderable for LoginView {
    async fn render(&self, ctx: ViewContext<'_>) -> Result<String> {
        if *ctx.input != ViewInput::Show {
            return Err(super::unsupported(ctx.path, ctx.input));
        }
        if ctx.session.authenticated() {
            return Ok(format!(
                "Signed in (role: {}). This page needs a different account, or run `tcmctl logout` to sign out.",
                ctx.session.role()
            ));
        }
        Ok("Sign in with `tcmctl login <username> --password <password>`.\n\
            No account yet? Run `tcmctl register <username> --password <password>`."
            .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::user_token;
    use crate::views::testing::{api_for, session_with};

    #[tokio::test]
    async fn test_login_view_for_anonymous_visitor() {
        let api = api_for("http://127.0.0.1:9");
        let session = session_with(None);
        let body = LoginView
            .render(ViewContext {
                path: "/login",
                session: session.current(),
                credential: None,
                api: &api,
                input: &ViewInput::Show,
            })
            .await
            .unwrap();
        assert!(body.contains("tcmctl login"));
    }

    #[tokio::test]
    async fn test_login_view_for_signed_in_visitor() {
        let api = api_for("http://127.0.0.1:9");
        let session = session_with(Some(user_token("alice")));
        let body = LoginView
            .render(ViewContext {
                path: "/login",
                session: session.current(),
                credential: session.credential(),
                api: &api,
                input: &ViewInput::Show,
            })
            .await
            .unwrap();
        assert!(body.contains("role: user"));
    }
}
