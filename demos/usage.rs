use anyhow::{Context, Result};
use efihub_client::{AuthorizedClient, RequestOptions, Settings};
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    let mut settings = Settings::new(
        env::var("EFIHUB_CLIENT_ID").context("EFIHUB_CLIENT_ID is not set")?,
        env::var("EFIHUB_CLIENT_SECRET").context("EFIHUB_CLIENT_SECRET is not set")?,
    );
    if let Ok(token_url) = env::var("EFIHUB_TOKEN_URL") {
        settings.token_url = token_url;
    }
    if let Ok(api_base_url) = env::var("EFIHUB_API_BASE_URL") {
        settings.api_base_url = api_base_url;
    }

    let client = AuthorizedClient::new(settings)?;

    let users: serde_json::Value = client
        .get("/users", RequestOptions::new())
        .await?
        .json()
        .await?;
    println!("{:#}", users);

    Ok(())
}
