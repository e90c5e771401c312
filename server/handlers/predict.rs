use serde::ser::{Serialize, SerializeMap, Serializer};
use tiny_http::Request;

use kanji_recognizer::ingest::decode_base64;
use kanji_recognizer::{Error, ErrorKind, PredictionResult, Result};

use crate::context::AppContext;
use crate::routes::{json_response, HttpResponse};
use crate::util::form::{form_get, parse_form};
use crate::util::multipart::{extract_boundary, find_part};

/// Form field carrying the image.
const DATA_FIELD: &str = "data";

// ---------------------------------------------------------------------------
// POST /post
// ---------------------------------------------------------------------------

pub fn handle(request: &mut Request, ctx: &AppContext) -> HttpResponse {
    let content_type = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Content-Type"))
        .map(|h| h.value.as_str().to_owned())
        .unwrap_or_default();

    let mut body = Vec::new();
    if let Err(e) = request.as_reader().read_to_end(&mut body) {
        return error_response(&Error::from(e));
    }

    match classify(ctx, &content_type, &body) {
        Ok(result) => json_response(200, &RankedJson(&result)),
        Err(e) => error_response(&e),
    }
}

/// Extracts the image from a request body and ranks it.
pub fn classify(ctx: &AppContext, content_type: &str, body: &[u8]) -> Result<PredictionResult> {
    let image = extract_image(content_type, body)?;
    ctx.engine.predict_encoded(&image, ctx.top_n)
}

/// Client mistakes are 400, everything else is ours.
pub fn status_for(err: &Error) -> u16 {
    match err.kind() {
        ErrorKind::Decode | ErrorKind::ShapeMismatch => 400,
        ErrorKind::Configuration | ErrorKind::Data => 500,
    }
}

fn error_response(err: &Error) -> HttpResponse {
    let status = status_for(err);
    if status >= 500 {
        tracing::error!("prediction failed: {err}");
    } else {
        tracing::debug!("rejected request: {err}");
    }
    json_response(status, &serde_json::json!({ "error": err.to_string() }))
}

// ---------------------------------------------------------------------------
// Body parsing
// ---------------------------------------------------------------------------

/// A multipart text field or a urlencoded field holds base64; a multipart
/// file upload holds the encoded image itself.
fn extract_image(content_type: &str, body: &[u8]) -> Result<Vec<u8>> {
    let missing = || Error::decode(format!("request has no `{DATA_FIELD}` field"));

    if content_type.starts_with("multipart/form-data") {
        let boundary =
            extract_boundary(content_type).ok_or_else(|| Error::decode("multipart body without a boundary"))?;
        let part = find_part(body, &boundary, DATA_FIELD).ok_or_else(missing)?;
        if part.is_file {
            Ok(part.data.to_vec())
        } else {
            decode_base64(&String::from_utf8_lossy(part.data))
        }
    } else {
        let body = std::str::from_utf8(body).map_err(|_| Error::decode("form body is not UTF-8"))?;
        let pairs = parse_form(body);
        decode_base64(form_get(&pairs, DATA_FIELD).ok_or_else(missing)?)
    }
}

// ---------------------------------------------------------------------------
// Response body
// ---------------------------------------------------------------------------

/// `{"0": {"cls": label, "score": log_prob}, "1": ...}`, best rank first.
struct RankedJson<'a>(&'a PredictionResult);

#[derive(serde::Serialize)]
struct RankEntry<'a> {
    cls: &'a str,
    score: f64,
}

impl Serialize for RankedJson<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (rank, p) in self.0.iter().enumerate() {
            map.serialize_entry(&rank.to_string(), &RankEntry { cls: &p.label, score: p.score })?;
        }
        map.end()
    }
}
