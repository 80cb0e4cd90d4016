use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api;
use crate::config;
use crate::data::{HttpPostService, MemoryPostService, PostService};
use crate::telemetry;
use crate::ui;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config_file: Option<PathBuf>,
    /// Serve the bundled sample blog from memory instead of the API.
    pub demo: bool,
    /// Inbound route such as `/archive` or `/post/<id>`.
    pub route: Option<String>,
}

pub fn run(options: RunOptions) -> Result<()> {
    let cfg = config::load(config::LoadOptions {
        config_file: options.config_file.clone(),
        env_prefix: None,
    })
    .context("load config")?;

    let log_path = telemetry::init(&cfg.logging).context("init logging")?;
    tracing::info!(
        version = crate::VERSION,
        log = ?log_path,
        demo = options.demo,
        "blog-tui starting"
    );

    let (service, status): (Arc<dyn PostService>, String) = if options.demo {
        let service = MemoryPostService::demo();
        let status = format!(
            "Demo mode. The admin passkey is \"{}\".",
            service.passkey()
        );
        (Arc::new(service), status)
    } else {
        let client = api::Client::new(api::ClientConfig {
            base_url: cfg.api.base_url.clone(),
            user_agent: cfg.api.user_agent.clone(),
            timeout: Some(cfg.api.timeout),
            http_client: None,
        })
        .context("initialize blog client")?;
        let status = format!("Connected to {}", client.base_url());
        (Arc::new(HttpPostService::new(Arc::new(client))), status)
    };

    let theme_path = options.config_file.clone().or_else(config::default_path);

    let mut model = ui::Model::new(ui::Options {
        service,
        route: options.route.unwrap_or_else(|| "/".to_string()),
        theme: cfg.ui.theme,
        theme_path,
        row_height: cfg.ui.row_height,
        buffer_rows: cfg.ui.buffer_rows,
        toast_ttl: cfg.ui.toast_ttl,
        render_capacity: cfg.cache.render_capacity,
        keying: cfg.cache.keying,
        status_message: status,
    })
    .context("start ui")?;
    model.run()?;

    tracing::info!("blog-tui stopped");
    Ok(())
}
