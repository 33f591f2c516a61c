//! Tagged-output translation.
//!
//! The upstream wraps its output in `<think>...</think>` and
//! `<answer>...</answer>` tags. [`TagTranslator`] is a chunk-feedable
//! state machine that splits the two segments apart, recognizing
//! markers even when a transport chunk boundary falls in the middle of
//! one. The same machine serves the streaming and non-streaming paths,
//! so final content is identical regardless of how the input was
//! chunked.

pub mod stream;


use crate::constants::{ANSWER_END, ANSWER_START, THINK_END, THINK_START};

/// A piece of translated output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Reasoning(String),
    Answer(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Outside,
    InReasoning,
    InAnswer,
}

/// Longest tag marker; the pending buffer never holds more than this
/// many bytes minus one once a push returns.
const MAX_HOLDBACK: usize = ANSWER_END.len();

/// Incremental `<think>`/`<answer>` splitter.
#[derive(Debug)]
pub struct TagTranslator {
    state: State,
    pending: String,
}

impl Default for TagTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl TagTranslator {
    pub fn new() -> Self {
        Self { state: State::Outside, pending: String::new() }
    }

    fn active_markers(&self) -> &'static [&'static str] {
        match self.state {
            State::Outside => &[THINK_START, ANSWER_START],
            State::InReasoning => &[THINK_END],
            State::InAnswer => &[ANSWER_END],
        }
    }

    fn emit(&self, text: String, out: &mut Vec<Segment>) {
        if text.is_empty() {
            return;
        }
        let segment = match self.state {
            State::InReasoning => Segment::Reasoning(text),
            // text between tags flows to the answer channel
            State::Outside | State::InAnswer => Segment::Answer(text),
        };
        // merge with the previous segment of the same kind
        let merged = match (out.last_mut(), &segment) {
            (Some(Segment::Reasoning(acc)), Segment::Reasoning(t)) => {
                acc.push_str(t);
                true
            }
            (Some(Segment::Answer(acc)), Segment::Answer(t)) => {
                acc.push_str(t);
                true
            }
            _ => false,
        };
        if !merged {
            out.push(segment);
        }
    }

    /// Feeds one chunk and returns the segments that became
    /// unambiguous. A partial marker stays buffered until the next
    /// chunk resolves it.
    pub fn push(&mut self, chunk: &str) -> Vec<Segment> {
        self.pending.push_str(chunk);
        let mut out = Vec::new();

        loop {
            let markers = self.active_markers();
            let hit = markers
                .iter()
                .filter_map(|m| self.pending.find(m).map(|pos| (pos, *m)))
                .min_by_key(|(pos, _)| *pos);

            match hit {
                Some((pos, marker)) => {
                    let before = self.pending[..pos].to_string();
                    self.emit(before, &mut out);
                    self.pending.drain(..pos + marker.len());
                    self.state = match (self.state, marker) {
                        (State::Outside, m) if m == THINK_START => State::InReasoning,
                        (State::Outside, _) => State::InAnswer,
                        _ => State::Outside,
                    };
                }
                None => {
                    // hold back the longest suffix that could still
                    // grow into a marker
                    let keep = holdback_len(&self.pending, markers);
                    let safe_end = self.pending.len() - keep;
                    if safe_end > 0 {
                        let safe: String = self.pending.drain(..safe_end).collect();
                        self.emit(safe, &mut out);
                    }
                    break;
                }
            }
        }

        debug_assert!(self.pending.len() < MAX_HOLDBACK);
        out
    }

    /// Flushes whatever is still buffered at end of input. An
    /// unterminated partial marker is emitted as literal text.
    pub fn finish(&mut self) -> Vec<Segment> {
        let mut out = Vec::new();
        let rest = std::mem::take(&mut self.pending);
        self.emit(rest, &mut out);
        self.state = State::Outside;
        out
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of
/// any marker. Bounded by the marker lengths, so the pending buffer
/// cannot grow without limit.
fn holdback_len(text: &str, markers: &[&str]) -> usize {
    let max = markers.iter().map(|m| m.len() - 1).max().unwrap_or(0);
    for keep in (1..=max.min(text.len())).rev() {
        if !text.is_char_boundary(text.len() - keep) {
            continue;
        }
        let suffix = &text[text.len() - keep..];
        if markers.iter().any(|m| m.starts_with(suffix)) {
            return keep;
        }
    }
    0
}

/// Fully translated upstream message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslatedMessage {
    pub reasoning: String,
    pub answer: String,
}

/// Runs the state machine over a complete body. When `show_reasoning`
/// is false the reasoning segment is dropped entirely.
pub fn translate_full(content: &str, show_reasoning: bool) -> TranslatedMessage {
    let mut translator = TagTranslator::new();
    let mut segments = translator.push(content);
    segments.extend(translator.finish());

    let mut msg = TranslatedMessage::default();
    for segment in segments {
        match segment {
            Segment::Reasoning(t) if show_reasoning => msg.reasoning.push_str(&t),
            Segment::Reasoning(_) => {}
            Segment::Answer(t) => msg.answer.push_str(&t),
        }
    }
    msg.reasoning = msg.reasoning.trim().to_string();
    msg.answer = msg.answer.trim().to_string();
    msg
}
