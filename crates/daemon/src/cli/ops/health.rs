use clap::Args;

use lanrelay_daemon::state::{AppState, CONFIG_FILE_NAME, KEY_FILE_NAME, UPLOADS_DIR_NAME};

#[derive(Args, Debug, Clone)]
pub struct Health;

#[derive(Debug, thiserror::Error)]
pub enum HealthError {}

#[async_trait::async_trait]
impl crate::cli::op::Op for Health {
    type Error = HealthError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut lines = Vec::new();

        lines.push("Config:".to_string());
        match AppState::load(ctx.config_path.clone()) {
            Ok(state) => {
                lines.push(format!("  directory:    {}", state.relay_dir.display()));
                lines.push(format!("  {:<13} OK", format!("{}:", CONFIG_FILE_NAME)));
                match state.load_key() {
                    Ok(_) => lines.push(format!("  {:<13} OK", format!("{}:", KEY_FILE_NAME))),
                    Err(e) => lines.push(format!("  {:<13} {}", format!("{}:", KEY_FILE_NAME), e)),
                }
                lines.push(format!("  {:<13} OK", format!("{}/:", UPLOADS_DIR_NAME)));
                lines.push(format!("  port:         {}", state.config.port));
                lines.push(format!("  discovery:    {:?}", state.config.discovery));
            }
            Err(e) => {
                lines.push(format!("  error: {}", e));
            }
        }

        let base = ctx.client.base_url();
        let client = ctx.client.http_client();

        lines.push(String::new());
        lines.push(format!("Relay ({}):", base));

        for check in ["livez", "readyz"] {
            let url = format!("{}/_status/{}", base.as_str().trim_end_matches('/'), check);
            let status = match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => "OK".to_string(),
                Ok(resp) => format!("UNHEALTHY ({})", resp.status()),
                Err(_) => "NOT REACHABLE".to_string(),
            };
            lines.push(format!("  {:<7} {}", format!("{}:", check), status));
        }

        Ok(lines.join("\n"))
    }
}
