use axum::http::StatusCode;
use serde::Deserialize;

use crate::config::Config;
use crate::data_models::ClientQuery;

/// Raw `/stream` query string. Every field is optional here so that a missing
/// one yields our own 400 message instead of the extractor's.
#[derive(Debug, Default, Deserialize)]
pub struct StreamParams {
    pub prompt: Option<String>,
    pub session: Option<String>,
    pub modelname: Option<String>,
}

fn required(value: Option<String>, message: &'static str) -> Result<String, (StatusCode, String)> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err((StatusCode::BAD_REQUEST, message.to_string())),
    }
}

impl StreamParams {
    pub fn into_query(self, config: &Config) -> Result<ClientQuery, (StatusCode, String)> {
        let prompt = required(self.prompt, "prompt is required")?;
        let session = required(self.session, "session is required")?;
        let model_name = required(self.modelname, "modelname is required")?;
        let max_iterations = config.max_iterations().ok_or((
            StatusCode::BAD_REQUEST,
            "maxIterations must be a number".to_string(),
        ))?;

        Ok(ClientQuery {
            prompt,
            session,
            model_name,
            max_iterations,
        })
    }
}
