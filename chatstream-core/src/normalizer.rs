use crate::model::ChatRequest;
use unicode_normalization::UnicodeNormalization;

/// Largest `max_tokens` forwarded upstream.
pub const MAX_TOKENS_CAP: u32 = 100_000;

pub fn clean_text(s: &str) -> String {
    // Unicode NFC normalization + BOM strip + CRLF -> LF + trim
    let mut t = s.nfc().collect::<String>();
    if t.starts_with('\u{FEFF}') {
        t.remove(0);
    }
    if t.contains("\r\n") {
        t = t.replace("\r\n", "\n");
    }
    t.trim().to_string()
}

fn clamp_round_f32(x: f32, lo: f32, hi: f32, dp: u32) -> f32 {
    let clamped = x.clamp(lo, hi);
    let p = 10f32.powi(dp as i32);
    (clamped * p).round() / p
}

/// Clean message text and bring numeric parameters into range.
/// Unset parameters stay unset.
pub fn normalize_request(mut req: ChatRequest) -> ChatRequest {
    for msg in &mut req.messages {
        msg.content = clean_text(&msg.content);
    }
    req.temperature = req.temperature.map(|t| clamp_round_f32(t, 0.0, 2.0, 3));
    if let Some(max) = req.max_tokens
        && max > MAX_TOKENS_CAP
    {
        req.max_tokens = Some(MAX_TOKENS_CAP);
    }
    req
}
