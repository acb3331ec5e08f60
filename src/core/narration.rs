/// Narration templates, the entity's voice filter, and UI distortion.
///
/// Presentation owns rendering; this module only produces strings and
/// reorders choices from numeric parameters.
use log::warn;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use crate::schema::action::{PlayerAction, Side};
use crate::schema::content::UiDistortion;

#[derive(Debug, Error)]
pub enum NarrationError {
    #[error("template parse error: {0}")]
    TemplateParse(String),
}

/// A segment of a parsed narration template.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Literal(String),
    /// A named slot: `{enemy}`, `{damage}`.
    Slot(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub segments: Vec<Segment>,
}

impl Template {
    /// Parse `{slot}` references. `{{` and `}}` are literal braces; nested,
    /// empty, unclosed and unmatched braces are errors.
    pub fn parse(input: &str) -> Result<Template, NarrationError> {
        let mut segments = Vec::new();
        let mut literal_buf = String::new();
        let chars: Vec<char> = input.chars().collect();
        let len = chars.len();
        let mut i = 0;

        while i < len {
            if chars[i] == '{' {
                if i + 1 < len && chars[i + 1] == '{' {
                    literal_buf.push('{');
                    i += 2;
                    continue;
                }

                if !literal_buf.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal_buf)));
                }

                let start = i + 1;
                let mut end = start;
                while end < len && chars[end] != '}' {
                    if chars[end] == '{' {
                        return Err(NarrationError::TemplateParse(
                            "nested braces are not allowed".to_string(),
                        ));
                    }
                    end += 1;
                }
                if end == len {
                    return Err(NarrationError::TemplateParse("unclosed brace".to_string()));
                }

                let name: String = chars[start..end].iter().collect();
                let name = name.trim();
                if name.is_empty() {
                    return Err(NarrationError::TemplateParse("empty braces".to_string()));
                }
                segments.push(Segment::Slot(name.to_string()));
                i = end + 1;
            } else if chars[i] == '}' {
                if i + 1 < len && chars[i + 1] == '}' {
                    literal_buf.push('}');
                    i += 2;
                    continue;
                }
                return Err(NarrationError::TemplateParse(
                    "unmatched closing brace".to_string(),
                ));
            } else {
                literal_buf.push(chars[i]);
                i += 1;
            }
        }

        if !literal_buf.is_empty() {
            segments.push(Segment::Literal(literal_buf));
        }
        Ok(Template { segments })
    }

    /// Fill slots from `bindings`. Unbound slots are kept as `{name}`.
    pub fn render(&self, bindings: &[(&str, &str)]) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(name) => {
                    match bindings.iter().find(|(key, _)| key == name) {
                        Some((_, value)) => out.push_str(value),
                        None => {
                            out.push('{');
                            out.push_str(name);
                            out.push('}');
                        }
                    }
                }
            }
        }
        out
    }
}

/// Parse and render in one step. A malformed template is returned as-is.
pub fn narrate(template: &str, bindings: &[(&str, &str)]) -> String {
    match Template::parse(template) {
        Ok(t) => t.render(bindings),
        Err(e) => {
            warn!("narration template {:?} is malformed: {}", template, e);
            template.to_string()
        }
    }
}

/// Where a line of text will be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrationContext {
    Combat,
    Lore,
    Whisper,
    Trap,
}

/// Cosmetic transform applied to generated text before it is shown.
pub trait NarrationFilter {
    fn filter(&self, text: &str, context: NarrationContext) -> String;
}

/// Shows text unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainNarration;

impl NarrationFilter for PlainNarration {
    fn filter(&self, text: &str, _context: NarrationContext) -> String {
        text.to_string()
    }
}

/// The entity's voice: impersonal phrasing turns into direct address once
/// both the tone and the entity bias run high.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityVoice {
    pub tone_bias: f32,
    pub entity_bias: f32,
}

impl EntityVoice {
    pub fn gaslighting(&self) -> bool {
        self.tone_bias > 0.7 && self.entity_bias > 0.5
    }
}

impl NarrationFilter for EntityVoice {
    fn filter(&self, text: &str, _context: NarrationContext) -> String {
        if self.gaslighting() {
            gaslight(text)
        } else {
            text.to_string()
        }
    }
}

/// Rewrite impersonal phrasing into direct address. The verb after a
/// rewritten subject is conjugated to match it.
pub fn gaslight(text: &str) -> String {
    let text = readdress(text, "The code", "You", "Your");
    let text = readdress(&text, "The Entity", "I", "My");
    text.replace("Paths", "Your paths")
        .replace(" paths", " your paths")
}

fn readdress(text: &str, subject: &str, pronoun: &str, possessive: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(at) = rest.find(subject) {
        out.push_str(&rest[..at]);
        rest = &rest[at + subject.len()..];
        if let Some(after) = rest.strip_prefix("'s") {
            out.push_str(possessive);
            rest = after;
        } else if rest.starts_with(" (") {
            // A name such as "The Entity (True Form)", not a subject.
            out.push_str(subject);
        } else if let Some(tail) = rest.strip_prefix(' ') {
            let end = tail
                .find(|c: char| !c.is_ascii_alphabetic())
                .unwrap_or(tail.len());
            let (verb, after) = tail.split_at(end);
            out.push_str(pronoun);
            out.push(' ');
            out.push_str(&conjugate(verb, pronoun));
            rest = after;
        } else {
            out.push_str(pronoun);
        }
    }
    out.push_str(rest);
    out
}

/// Third-person singular to the form `pronoun` takes.
fn conjugate(verb: &str, pronoun: &str) -> String {
    match verb {
        "is" if pronoun == "I" => "am".to_string(),
        "is" => "are".to_string(),
        "was" if pronoun == "You" => "were".to_string(),
        "has" => "have".to_string(),
        "does" => "do".to_string(),
        v if ["ches", "shes", "sses", "xes", "zes"].iter().any(|e| v.ends_with(e)) => {
            v[..v.len() - 2].to_string()
        }
        v if v.len() > 3 && v.ends_with("ies") => format!("{}y", &v[..v.len() - 3]),
        v if v.ends_with('s') && !v.ends_with("ss") && !v.ends_with("us") => {
            v[..v.len() - 1].to_string()
        }
        v => v.to_string(),
    }
}

/// Maybe shuffle the displayed order of `choices` in place.
pub fn shuffle_choices<T>(distortion: &UiDistortion, choices: &mut [T], rng: &mut StdRng) -> bool {
    if !distortion.enabled || distortion.shuffle_chance <= 0.0 {
        return false;
    }
    if rng.gen::<f32>() < distortion.shuffle_chance {
        choices.shuffle(rng);
        true
    } else {
        false
    }
}

/// Maybe replace the player's input with a phantom one. Flee is never
/// substituted in, so a phantom can't end a fight on the player's behalf.
pub fn phantom_input(distortion: &UiDistortion, action: PlayerAction, rng: &mut StdRng) -> PlayerAction {
    const PHANTOMS: [PlayerAction; 4] = [
        PlayerAction::Attack,
        PlayerAction::Dodge(Side::Left),
        PlayerAction::Dodge(Side::Right),
        PlayerAction::Heal,
    ];
    if !distortion.enabled || distortion.phantom_chance <= 0.0 {
        return action;
    }
    if rng.gen::<f32>() < distortion.phantom_chance {
        PHANTOMS.choose(rng).copied().unwrap_or(action)
    } else {
        action
    }
}
