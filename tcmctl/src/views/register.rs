use async_trait::async_trait;

use crate::errors::Result;
use crate::router::{Renderable, ViewContext, ViewInput};

pub struct RegisterView;

#[async_trait]
impl Renderable for RegisterView {
    async fn render(&self, ctx: ViewContext<'_>) -> Result<String> {
        match ctx.input {
            ViewInput::Show => Ok("Create an account with `tcmctl register <username> --password <password>`.".to_string()),
            other => Err(super::unsupported(ctx.path, other)),
        }
    }
}
