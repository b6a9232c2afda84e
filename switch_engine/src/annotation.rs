//! Switch annotations embedded in event page comments.
//!
//! Map designers declare switch preconditions in free-text comments:
//!
//! - `Switch: <name>: <on|off>` requires the named switch to be in the given state
//! - `SelfSwitch: <name>` requires the named switch to be on
//!
//! Keywords and states match case-insensitively; names are case-sensitive word tokens of at
//! most ten characters. Longer names do not match at all rather than being truncated.

use std::sync::LazyLock;

use log::warn;
use regex::Regex;
use switch_data::PageDef;

static STATE_ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bswitch:\s*(\w{1,10}):\s*(on|off)\b").expect("valid annotation regex"));

static SELF_SWITCH_ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bselfswitch:\s*(\w{1,10})\b").expect("valid annotation regex"));

/// Which of the two comment forms declared the switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationForm {
    State,
    SelfSwitch,
}

/// One switch precondition declared in a comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchAnnotation {
    pub name: String,
    pub required: bool,
    pub form: AnnotationForm,
}

/// Extract every switch annotation from one comment text.
pub fn parse_comment(text: &str) -> Vec<SwitchAnnotation> {
    let mut found = Vec::new();
    for caps in STATE_ANNOTATION.captures_iter(text) {
        found.push(SwitchAnnotation {
            name: caps[1].to_string(),
            required: caps[2].eq_ignore_ascii_case("on"),
            form: AnnotationForm::State,
        });
    }
    for caps in SELF_SWITCH_ANNOTATION.captures_iter(text) {
        found.push(SwitchAnnotation {
            name: caps[1].to_string(),
            required: true,
            form: AnnotationForm::SelfSwitch,
        });
    }
    found
}

/// Extract the annotations of every comment on a page, in command order.
///
/// Comments that mention a switch keyword but match neither form are logged and ignored.
pub fn parse_page(page: &PageDef) -> Vec<SwitchAnnotation> {
    let mut found = Vec::new();
    for text in page.comments() {
        let parsed = parse_comment(text);
        if parsed.is_empty() && looks_like_annotation(text) {
            warn!("ignoring malformed switch annotation: \"{text}\"");
        }
        found.extend(parsed);
    }
    found
}

fn looks_like_annotation(text: &str) -> bool {
    text.to_ascii_lowercase().contains("switch:")
}
