use finqa_core::error::AppError;

/// Client handle for a local Ollama endpoint.
///
/// The base URL is strictly limited to `127.0.0.1`: filing text and query
/// results never leave the machine through this client.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let base_url = base_url.trim_end_matches('/').to_string();

        let rest = base_url.strip_prefix("http://127.0.0.1").ok_or_else(|| {
            AppError::new(
                "LLM_REMOTE_NOT_ALLOWED",
                "Model base URL must be localhost (127.0.0.1)",
            )
            .with_details(format!("base_url={base_url}"))
        })?;

        // Either no port (bare host) or ":<valid port>", nothing else.
        // A path or userinfo suffix would smuggle requests elsewhere.
        if !rest.is_empty() {
            let port = rest.strip_prefix(':').ok_or_else(|| {
                AppError::new(
                    "LLM_REMOTE_NOT_ALLOWED",
                    "Model base URL must be localhost (127.0.0.1)",
                )
                .with_details(format!("base_url={base_url}"))
            })?;
            match port.parse::<u16>() {
                Ok(p) if p > 0 => {}
                _ => {
                    return Err(AppError::new(
                        "LLM_REMOTE_NOT_ALLOWED",
                        "Model base URL port is invalid",
                    )
                    .with_details(format!("base_url={base_url}")));
                }
            }
        }

        Ok(Self { base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn health_check(&self) -> Result<(), AppError> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = ureq::get(&url)
            .timeout(std::time::Duration::from_millis(800))
            .call();

        match resp {
            Ok(r) if r.status() == 200 => Ok(()),
            Ok(r) => Err(
                AppError::new("LLM_ENDPOINT_UNHEALTHY", "Model endpoint health check failed")
                    .with_details(format!("status={}", r.status())),
            ),
            Err(e) => Err(AppError::transport(
                "LLM_TRANSPORT_FAILED",
                "Failed to reach model endpoint on 127.0.0.1",
            )
            .with_details(e.to_string())),
        }
    }
}
