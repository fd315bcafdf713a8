use serde::Deserialize;

use crate::error::AppError;

/// Identity extracted from a scanned QR code. Parsing is a thin adapter in
/// front of the dispatcher; it never touches attendance state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPayload {
    pub student_id: String,
    pub full_name: Option<String>,
}

#[derive(Deserialize)]
struct JsonPayload {
    #[serde(alias = "id")]
    student_id: String,
    #[serde(default)]
    full_name: Option<String>,
}

/// Accepts the three payload formats seen in the field: a JSON object, the
/// legacy pipe-delimited `id|name|grade|section` string, or a bare student id.
pub fn parse_qr_payload(raw: &str) -> Result<ScanPayload, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppError::MalformedPayload("empty QR payload".to_string()));
    }

    if raw.starts_with('{') {
        let parsed: JsonPayload = serde_json::from_str(raw)
            .map_err(|e| AppError::MalformedPayload(format!("invalid JSON payload: {}", e)))?;
        if parsed.student_id.trim().is_empty() {
            return Err(AppError::MalformedPayload(
                "JSON payload has empty student_id".to_string(),
            ));
        }
        return Ok(ScanPayload {
            student_id: parsed.student_id.trim().to_string(),
            full_name: parsed
                .full_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
        });
    }

    if raw.contains('|') {
        let mut parts = raw.split('|');
        let id = parts.next().unwrap_or_default().trim();
        if id.is_empty() {
            return Err(AppError::MalformedPayload(
                "pipe-delimited payload has empty student id".to_string(),
            ));
        }
        let name = parts.next().map(str::trim).filter(|n| !n.is_empty());
        return Ok(ScanPayload {
            student_id: id.to_string(),
            full_name: name.map(str::to_string),
        });
    }

    Ok(ScanPayload {
        student_id: raw.to_string(),
        full_name: None,
    })
}
