//! Narration script segmentation and sanitization.
//!
//! Turns marked-up narration text into an ordered list of segments: cue
//! markers become `Cue` segments, other bracketed tokens are dropped, and
//! the text in between is cleaned of markdown and speaker labels so it can
//! be handed to speech synthesis as is.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::error::PipelineError;

pub const OPENING_CUE: &str = "[VINHETA DE ABERTURA]";
pub const TRANSITION_CUE: &str = "[MÚSICA SUAVE DE FUNDO]";
pub const CLOSING_CUE: &str = "[VINHETA DE ENCERRAMENTO]";

/// Which cue marker produced a cue segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CueKind {
    Opening,
    Transition,
    Closing,
}

impl CueKind {
    /// Exact match against the recognised markers.
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            OPENING_CUE => Some(CueKind::Opening),
            TRANSITION_CUE => Some(CueKind::Transition),
            CLOSING_CUE => Some(CueKind::Closing),
            _ => None,
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            CueKind::Opening => OPENING_CUE,
            CueKind::Transition => TRANSITION_CUE,
            CueKind::Closing => CLOSING_CUE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SegmentKind {
    /// Sanitized text to be spoken.
    Narration { text: String },
    Cue(CueKind),
}

/// One entry of the script, in parse order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptSegment {
    /// Position in the script, contiguous from zero.
    pub order: usize,
    pub kind: SegmentKind,
}

impl ScriptSegment {
    pub fn is_cue(&self) -> bool {
        matches!(self.kind, SegmentKind::Cue(_))
    }

    /// Spoken text, `None` for cues.
    pub fn narration_text(&self) -> Option<&str> {
        match &self.kind {
            SegmentKind::Narration { text } => Some(text),
            SegmentKind::Cue(_) => None,
        }
    }
}

/// Raw lexical piece of the narration text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Text(&'a str),
    /// A `[...]` span including its brackets.
    Bracket(&'a str),
}

/// Split `input` into free text and bracketed spans, preserving order.
///
/// A bracketed span never contains a newline or another `[`. A span
/// directly followed by `(` is link markup and stays part of the text.
fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut text_start = 0;
    let mut pos = 0;

    while let Some(offset) = input[pos..].find('[') {
        let open = pos + offset;
        let rest = &input[open + 1..];
        let close = rest
            .find(|c: char| c == ']' || c == '[' || c == '\n')
            .filter(|&i| rest.as_bytes()[i] == b']')
            .map(|i| open + 1 + i);

        let Some(close) = close else {
            pos = open + 1;
            continue;
        };
        if input[close + 1..].starts_with('(') {
            pos = close + 1;
            continue;
        }

        if text_start < open {
            tokens.push(Token::Text(&input[text_start..open]));
        }
        tokens.push(Token::Bracket(&input[open..=close]));
        text_start = close + 1;
        pos = close + 1;
    }

    if text_start < input.len() {
        tokens.push(Token::Text(&input[text_start..]));
    }
    tokens
}

static FOOTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)(?:\A|\n)[ \t]*(?:-{3,}|\*{3,}|_{3,})[ \t]*(?:\n.*)?\z")
        .expect("valid footer regex")
});
static SPEAKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[ \t]*[*_]{0,3}[ \t]*(?:locutora?|narrador(?:a)?|apresentador(?:a)?|host|narrator|speaker)[ \t]*[*_]{0,3}[ \t]*:[ \t]*[*_]{0,3}[ \t]*",
    )
    .expect("valid speaker regex")
});
static BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*|__(.+?)__").expect("valid bold regex"));
static ITALIC_STAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*\n]+)\*").expect("valid italic regex"));
static ITALIC_UNDERSCORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[^\w])_([^_\n]+)_([^\w]|$)").expect("valid italic regex")
});
static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`+([^`]*)`+").expect("valid code regex"));
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(?:#{1,6}[ \t]*)+").expect("valid heading regex"));
static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(?:[-+•][ \t]+)+").expect("valid bullet regex"));
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]\n]*)\]\([^)\n]*\)").expect("valid link regex"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static SPACE_BEFORE_PUNCT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+([.,;:!?…])").expect("valid punctuation regex"));

/// Clean one narration piece for speech synthesis.
///
/// Steps run in a fixed order, each on the output of the previous one.
/// Removing one piece of markup can expose another (`# LOCUTOR: oi`), so
/// the steps repeat until the text stops changing. Applying it to its own
/// output changes nothing.
pub fn sanitize(text: &str) -> String {
    let mut current = sanitize_pass(text);
    loop {
        // After the first pass the text is a single line without runs of
        // whitespace, so any further change makes it strictly shorter.
        let next = sanitize_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn sanitize_pass(text: &str) -> String {
    let text = FOOTER_RE.replace(text, "");

    let text = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let text = SPEAKER_RE.replace_all(&text, "");

    let text = BOLD_RE.replace_all(&text, "$1$2");
    let text = ITALIC_STAR_RE.replace_all(&text, "$1");
    let text = replace_until_stable(&ITALIC_UNDERSCORE_RE, &text, "$1$2$3");
    let text = text.replace('*', "");

    let text = CODE_RE.replace_all(&text, "$1");
    let text = text.replace('`', "");

    let text = HEADING_RE.replace_all(&text, "");
    let text = BULLET_RE.replace_all(&text, "");
    let text = LINK_RE.replace_all(&text, "$1");
    let text = SPEAKER_RE.replace_all(&text, "");

    let text = WHITESPACE_RE.replace_all(&text, " ");
    let text = text.trim();
    SPACE_BEFORE_PUNCT_RE.replace_all(text, "$1").into_owned()
}

/// Patterns that consume their boundary characters miss adjacent matches
/// in one sweep; repeat until nothing matches.
fn replace_until_stable(re: &Regex, text: &str, rep: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = re.replace_all(&current, rep);
        if next == current {
            return current;
        }
        current = next.into_owned();
    }
}

/// Parse narration text into the ordered segment list.
///
/// Fails with `EmptyScript` when nothing is left to narrate or play.
pub fn segment_script(input: &str) -> Result<Vec<ScriptSegment>, PipelineError> {
    let mut segments = Vec::new();

    for token in tokenize(input) {
        let kind = match token {
            Token::Bracket(marker) => match CueKind::from_marker(marker) {
                Some(cue) => SegmentKind::Cue(cue),
                None => {
                    tracing::debug!(marker, "Dropping unrecognised marker");
                    continue;
                }
            },
            Token::Text(raw) => {
                let text = sanitize(raw);
                if text.is_empty() {
                    continue;
                }
                SegmentKind::Narration { text }
            }
        };

        segments.push(ScriptSegment {
            order: segments.len(),
            kind,
        });
    }

    if segments.is_empty() {
        return Err(PipelineError::EmptyScript);
    }

    tracing::debug!(
        segments = segments.len(),
        cues = segments.iter().filter(|s| s.is_cue()).count(),
        "Script segmented"
    );
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn narration(order: usize, text: &str) -> ScriptSegment {
        ScriptSegment {
            order,
            kind: SegmentKind::Narration {
                text: text.to_string(),
            },
        }
    }

    fn cue(order: usize, kind: CueKind) -> ScriptSegment {
        ScriptSegment {
            order,
            kind: SegmentKind::Cue(kind),
        }
    }

    #[test]
    fn test_opening_narration_closing() {
        let input = "[VINHETA DE ABERTURA]\nLOCUTOR: Olá **mundo**!\n[VINHETA DE ENCERRAMENTO]";
        let segments = segment_script(input).unwrap();
        assert_eq!(
            segments,
            vec![
                cue(0, CueKind::Opening),
                narration(1, "Olá mundo!"),
                cue(2, CueKind::Closing),
            ]
        );
    }

    #[test]
    fn test_unrecognised_marker_dropped() {
        let input = "Primeira parte [FOO] segunda parte.";
        let segments = segment_script(input).unwrap();
        assert_eq!(
            segments,
            vec![narration(0, "Primeira parte"), narration(1, "segunda parte.")]
        );
        for segment in &segments {
            assert!(!segment.narration_text().unwrap().contains("FOO"));
        }
    }

    #[test]
    fn test_order_is_contiguous() {
        let input = "[VINHETA DE ABERTURA] um [X] [MÚSICA SUAVE DE FUNDO] dois [VINHETA DE ENCERRAMENTO]";
        let segments = segment_script(input).unwrap();
        let orders: Vec<usize> = segments.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![0, 1, 2, 3, 4]);
        assert_eq!(segments[2], cue(2, CueKind::Transition));
    }

    #[test]
    fn test_empty_script_rejected() {
        assert!(matches!(segment_script(""), Err(PipelineError::EmptyScript)));
        assert!(matches!(
            segment_script("  \n [NOTA] \n**LOCUTOR:**  \n---\nrodapé"),
            Err(PipelineError::EmptyScript)
        ));
    }

    #[test]
    fn test_cue_only_script_is_not_empty() {
        let segments = segment_script("[VINHETA DE ABERTURA]").unwrap();
        assert_eq!(segments, vec![cue(0, CueKind::Opening)]);
    }

    #[test]
    fn test_markers_match_exactly() {
        let segments = segment_script("[vinheta de abertura] texto").unwrap();
        assert_eq!(segments, vec![narration(0, "texto")]);
    }

    #[test]
    fn test_links_survive_tokenizing() {
        let segments = segment_script("Veja [a documentação](https://docs.rs) agora.").unwrap();
        assert_eq!(segments, vec![narration(0, "Veja a documentação agora.")]);
    }

    #[test]
    fn test_footer_stripped() {
        let input = "LOCUTOR: Até a próxima!\n\n---\nRoteiro gerado automaticamente.\nRepositório: x";
        assert_eq!(sanitize(input), "Até a próxima!");
        assert_eq!(sanitize("---\nsó rodapé"), "");
    }

    #[test]
    fn test_speaker_label_variants() {
        assert_eq!(sanitize("**LOCUTOR:** Bom dia."), "Bom dia.");
        assert_eq!(sanitize("*Locutor*: Bom dia."), "Bom dia.");
        assert_eq!(sanitize("locutor: Bom dia."), "Bom dia.");
        assert_eq!(
            sanitize("LOCUTOR: Primeira.\n\nLOCUTOR: Segunda."),
            "Primeira. Segunda."
        );
        assert_eq!(sanitize("O LOCUTOR: fala"), "O LOCUTOR: fala");
    }

    #[test]
    fn test_markdown_stripped() {
        let input = "## Estrutura\n- O arquivo `main.rs` é a *entrada*\n+ Use __cargo__ para compilar";
        assert_eq!(
            sanitize(input),
            "Estrutura O arquivo main.rs é a entrada Use cargo para compilar"
        );
    }

    #[test]
    fn test_identifiers_with_underscores_kept() {
        assert_eq!(sanitize("A função snake_case_name roda."), "A função snake_case_name roda.");
    }

    #[test]
    fn test_space_before_punctuation_removed() {
        assert_eq!(sanitize("Olá , mundo !  Tudo bem ?"), "Olá, mundo! Tudo bem?");
    }

    #[test]
    fn test_sanitize_idempotent() {
        let inputs = [
            "[VINHETA] LOCUTOR: Olá **mundo** !",
            "## Título\n\n- item `code` [link](http://x)\n---\nfim",
            "Texto   simples.",
            "_ênfase_ e snake_case e * solto",
            "_a_ _b_",
            "# LOCUTOR: oi",
            "`LOCUTOR:` oi",
            "[LOCUTOR](x): oi",
            "## # Titulo",
            "- - item",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn test_exposed_markup_stripped_in_one_call() {
        assert_eq!(sanitize("_a_ _b_"), "a b");
        assert_eq!(sanitize("# LOCUTOR: oi"), "oi");
        assert_eq!(sanitize("`LOCUTOR:` oi"), "oi");
        assert_eq!(sanitize("[LOCUTOR](x): oi"), "oi");
        assert_eq!(sanitize("## # Titulo"), "Titulo");
        assert_eq!(sanitize("- - item"), "item");
    }

    #[test]
    fn test_tokenize_keeps_unclosed_brackets_as_text() {
        let tokens = tokenize("a [b\n] c [D]");
        assert_eq!(
            tokens,
            vec![Token::Text("a [b\n] c "), Token::Bracket("[D]")]
        );
    }
}
