//! MIME body extraction: find the first inline `text/plain` part of a message.

use std::borrow::Cow;

use mail_parser::{Message, MessageParser, MessagePart, MimeHeaders, PartType};
use tracing::warn;

use super::header::skip_from_line;
use crate::error::{MboxError, Result};

/// Body text substituted when extraction fails.
pub const BODY_ERROR_SENTINEL: &str = "[Error extracting email body]";

/// Maximum depth for recursive multipart descent (to prevent stack overflow on adversarial input).
const MAX_DEPTH: usize = 32;

/// Extract the plain-text body of a raw message.
///
/// Never fails: any extraction error is logged and replaced by
/// [`BODY_ERROR_SENTINEL`].
pub fn extract_body(raw_message: &[u8]) -> String {
    try_extract_body(raw_message).unwrap_or_else(|e| {
        warn!(error = %e, "Error extracting email body");
        BODY_ERROR_SENTINEL.to_string()
    })
}

/// Extract the plain-text body of a raw message (headers + body, with or
/// without the leading MBOX `From ` line).
///
/// - A single-part message yields its decoded payload, whatever its type.
/// - A multipart message yields the first non-attachment `text/plain` part
///   with a non-empty payload, in depth-first document order.
/// - Otherwise the result is empty.
pub fn try_extract_body(raw_message: &[u8]) -> Result<String> {
    let message = MessageParser::default()
        .parse(skip_from_line(raw_message))
        .ok_or_else(|| MboxError::MimeError("message could not be parsed".into()))?;
    body_of(&message)
}

/// Plain-text body of an already parsed message.
pub fn body_of(message: &Message<'_>) -> Result<String> {
    let Some(root) = message.parts.first() else {
        return Ok(String::new());
    };

    match &root.body {
        PartType::Multipart(_) | PartType::Message(_) => {
            Ok(find_plain_text(message, 0, 0)?.unwrap_or_default())
        }
        _ => Ok(decode_payload(root).map(Cow::into_owned).unwrap_or_default()),
    }
}

/// Walk the part tree from `part_id` depth-first, returning the first usable plain-text payload.
///
/// Attachments are passed over, but their children are still visited.
fn find_plain_text(message: &Message<'_>, part_id: usize, depth: usize) -> Result<Option<String>> {
    if depth > MAX_DEPTH {
        return Err(MboxError::NestingTooDeep(MAX_DEPTH));
    }

    let part = message
        .parts
        .get(part_id)
        .ok_or_else(|| MboxError::MimeError(format!("dangling MIME part reference {part_id}")))?;

    if !is_attachment(part) && content_type(part) == "text/plain" {
        if let Some(text) = decode_payload(part).filter(|t| !t.is_empty()) {
            return Ok(Some(text.into_owned()));
        }
    }

    match &part.body {
        PartType::Multipart(children) => {
            for &child in children {
                if let Some(text) = find_plain_text(message, child as usize, depth + 1)? {
                    return Ok(Some(text));
                }
            }
            Ok(None)
        }
        PartType::Message(nested) if !nested.parts.is_empty() => {
            find_plain_text(nested, 0, depth + 1)
        }
        _ => Ok(None),
    }
}

/// Lowercase `type/subtype` of a part. Parts without a Content-Type are `text/plain`.
fn content_type(part: &MessagePart<'_>) -> String {
    match part.content_type() {
        Some(ct) => match ct.subtype() {
            Some(sub) => format!("{}/{}", ct.ctype(), sub).to_ascii_lowercase(),
            None => ct.ctype().to_ascii_lowercase(),
        },
        None => "text/plain".to_string(),
    }
}

/// Whether the part's Content-Disposition marks it as an attachment.
fn is_attachment(part: &MessagePart<'_>) -> bool {
    part.content_disposition()
        .is_some_and(|d| d.ctype().eq_ignore_ascii_case("attachment"))
}

/// Best-effort text rendering of a leaf part's payload.
///
/// Text parts are already charset-decoded by `mail-parser`; binary payloads
/// are decoded as lossy UTF-8. Container parts have no payload.
fn decode_payload<'x>(part: &'x MessagePart<'_>) -> Option<Cow<'x, str>> {
    match &part.body {
        PartType::Text(text) | PartType::Html(text) => Some(Cow::Borrowed(text.as_ref())),
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => {
            Some(String::from_utf8_lossy(bytes.as_ref()))
        }
        PartType::Message(_) | PartType::Multipart(_) => None,
    }
}
