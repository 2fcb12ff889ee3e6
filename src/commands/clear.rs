use anyhow::{bail, Result};
use colored::Colorize;
use serde::Deserialize;

use super::resolve_daemon_url;

#[derive(Deserialize)]
struct ClearResponse {
    deleted: u64,
}

pub async fn execute(application_id: String, environment: Option<String>, url: Option<String>) -> Result<()> {
    let base_url = resolve_daemon_url(url)?;

    let mut params = vec![("application_id", application_id.clone())];
    if let Some(env) = &environment {
        params.push(("environment", env.clone()));
    }

    let response = reqwest::Client::new()
        .post(format!("{}/logs/clear", base_url))
        .query(&params)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        bail!("Daemon rejected clear request ({}): {}", status, body);
    }

    let cleared: ClearResponse = response.json().await?;
    let scope = match &environment {
        Some(env) => format!("{} ({})", application_id, env),
        None => application_id,
    };
    println!(
        "{} {} {}",
        "Deleted".yellow(),
        cleared.deleted.to_string().bold(),
        format!("records for {}", scope)
    );

    Ok(())
}
