//! RFC 5322 message assembly for notification mail.
//!
//! Pure functions only: no I/O, no clock. The Gmail transport base64url-encodes
//! the bytes produced here.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// Line length for base64 bodies (RFC 2045).
const BASE64_LINE_LEN: usize = 76;

/// Attachment content type from the file extension.
pub fn attachment_content_type(filename: &str) -> &'static str {
    let ext = std::path::Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

pub struct Attachment<'a> {
    pub filename: &'a str,
    pub content: &'a [u8],
}

pub struct MessageParts<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub cc: &'a [String],
    pub subject: &'a str,
    pub body: &'a str,
    pub attachment: Attachment<'a>,
}

/// Assemble a `multipart/mixed` message: one text part, one attachment part.
pub fn build_message(parts: &MessageParts<'_>, boundary: &str) -> Vec<u8> {
    let mut out = String::new();

    out.push_str(&format!("From: {}\r\n", single_line(parts.from)));
    out.push_str(&format!("To: {}\r\n", single_line(parts.to)));
    if !parts.cc.is_empty() {
        out.push_str(&format!("Cc: {}\r\n", single_line(&parts.cc.join(", "))));
    }
    out.push_str(&format!("Subject: {}\r\n", encode_header(parts.subject)));
    out.push_str("MIME-Version: 1.0\r\n");
    out.push_str(&format!(
        "Content-Type: multipart/mixed; boundary=\"{boundary}\"\r\n\r\n"
    ));

    out.push_str(&format!("--{boundary}\r\n"));
    out.push_str("Content-Type: text/plain; charset=\"UTF-8\"\r\n");
    out.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
    out.push_str(&wrap_base64(parts.body.as_bytes()));

    let filename = single_line(parts.attachment.filename).replace('"', "");
    out.push_str(&format!("--{boundary}\r\n"));
    out.push_str(&format!(
        "Content-Type: {}; name=\"{filename}\"\r\n",
        attachment_content_type(&filename)
    ));
    out.push_str(&format!(
        "Content-Disposition: attachment; filename=\"{filename}\"\r\n"
    ));
    out.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
    out.push_str(&wrap_base64(parts.attachment.content));
    out.push_str(&format!("--{boundary}--\r\n"));

    out.into_bytes()
}

/// Header values may come from the vision model. Control characters
/// (CR/LF above all) become spaces so a value can never start a new header.
pub fn single_line(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

/// RFC 2047 encoded-word for non-ASCII header values.
fn encode_header(value: &str) -> String {
    let value = single_line(value);
    if value.is_ascii() {
        value
    } else {
        format!("=?UTF-8?B?{}?=", BASE64.encode(value.as_bytes()))
    }
}

/// Base64 split into CRLF-terminated lines.
fn wrap_base64(bytes: &[u8]) -> String {
    let encoded = BASE64.encode(bytes);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / BASE64_LINE_LEN * 2 + 2);
    // base64 output is ASCII, so byte chunks are char boundaries
    for chunk in encoded.as_bytes().chunks(BASE64_LINE_LEN) {
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push_str("\r\n");
    }
    out
}
