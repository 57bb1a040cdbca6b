//! Compatibilità con il vecchio marcatore in-band `[Image](<url>)`.
//!
//! I messaggi nuovi usano il campo `attachment`; questo modulo serve solo a
//! leggere dati legacy e a produrre testo per client che conoscono solo il marcatore.

use std::sync::LazyLock;

use regex::Regex;

static IMAGE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[Image\]\((.*?)\)").expect("static regex"));

/// Estrae l'URL dal primo marcatore `[Image](<url>)` presente nel testo.
///
/// Restituisce il testo senza il marcatore (spazi ai bordi rimossi) e l'URL,
/// oppure il testo invariato e `None` se il marcatore non c'è.
pub fn decode_legacy(content: &str) -> (String, Option<String>) {
    let Some(caps) = IMAGE_MARKER.captures(content) else {
        return (content.to_string(), None);
    };
    let (Some(whole), Some(url)) = (caps.get(0), caps.get(1)) else {
        return (content.to_string(), None);
    };
    if url.as_str().is_empty() {
        return (content.to_string(), None);
    }
    let mut text = String::with_capacity(content.len());
    text.push_str(&content[..whole.start()]);
    text.push_str(&content[whole.end()..]);
    (text.trim().to_string(), Some(url.as_str().to_string()))
}

/// Inverso di [`decode_legacy`]: il testo seguito da `\n[Image](<url>)`.
pub fn encode_legacy(content: &str, attachment: Option<&str>) -> String {
    match attachment {
        Some(url) if content.is_empty() => format!("[Image]({url})"),
        Some(url) => format!("{content}\n[Image]({url})"),
        None => content.to_string(),
    }
}
