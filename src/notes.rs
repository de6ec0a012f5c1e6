/// Notes sanitization: raw hydrated text to safe inline spans
///
/// Release notes arrive as raw text that may carry inline marker tokens of
/// the form `[[REMOVE:<text>]]` (including the literal `[[REMOVE:image]]`
/// variant). The transform rewrites each token into a highlighted span
/// holding the inner text and keeps everything else as plain spans. Output is
/// a span list rendered as styled text widgets, so untrusted input is never
/// interpreted as markup: a `<script>` in the notes stays the literal
/// characters `<script>`.

/// Marker opening the highlight token
const TOKEN_OPEN: &str = "[[REMOVE:";
/// Marker closing the highlight token
const TOKEN_CLOSE: &str = "]]";

/// One inline run of note text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteSpan {
    pub text: String,
    /// Highlighted spans render with the removal-marker style
    pub highlighted: bool,
}

impl NoteSpan {
    fn plain(text: &str) -> Self {
        NoteSpan {
            text: text.to_string(),
            highlighted: false,
        }
    }

    fn highlighted(text: &str) -> Self {
        NoteSpan {
            text: text.to_string(),
            highlighted: true,
        }
    }
}

/// Rewrite `[[REMOVE:...]]` tokens into highlighted spans.
///
/// Unterminated tokens are left as literal text. The inner text is trimmed,
/// matching how the markers are authored (`[[REMOVE: water damage ]]`).
pub fn sanitize_notes(raw: &str) -> Vec<NoteSpan> {
    let mut spans = Vec::new();
    let mut rest = raw;

    while let Some(start) = rest.find(TOKEN_OPEN) {
        let after_open = &rest[start + TOKEN_OPEN.len()..];
        let Some(end) = after_open.find(TOKEN_CLOSE) else {
            // No closing marker: keep the remainder verbatim
            break;
        };
        if start > 0 {
            spans.push(NoteSpan::plain(&rest[..start]));
        }
        spans.push(NoteSpan::highlighted(after_open[..end].trim()));
        rest = &after_open[end + TOKEN_CLOSE.len()..];
    }

    if !rest.is_empty() {
        spans.push(NoteSpan::plain(rest));
    }

    spans
}
