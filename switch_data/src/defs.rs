use serde::{Deserialize, Serialize};

/// Event command code for the first line of a comment.
pub const COMMENT_CODE: u16 = 108;
/// Event command code for a continuation line of a comment.
pub const COMMENT_CONTINUATION_CODE: u16 = 408;

/// A single map as delivered by the host's map-data loader.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MapDef {
    pub id: i32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub events: Vec<EventDef>,
}

/// An on-map event: a stack of pages, the last satisfied one being active.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EventDef {
    pub id: i32,
    #[serde(default)]
    pub name: String,
    /// Pages in declaration order. Slots may be `None` when the source data is damaged.
    #[serde(default)]
    pub pages: Vec<Option<PageDef>>,
}

/// One page of an event.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PageDef {
    #[serde(default)]
    pub condition: Option<PageConditionDef>,
    #[serde(default)]
    pub graphic: GraphicDef,
    #[serde(default)]
    pub move_type: MoveType,
    #[serde(default = "default_move_speed")]
    pub move_speed: u8,
    #[serde(default = "default_move_frequency")]
    pub move_frequency: u8,
    #[serde(default)]
    pub walk_anime: bool,
    #[serde(default)]
    pub step_anime: bool,
    #[serde(default)]
    pub direction_fix: bool,
    #[serde(default)]
    pub through: bool,
    #[serde(default)]
    pub always_on_top: bool,
    #[serde(default)]
    pub trigger: TriggerKind,
    /// Command list. `None` when the source data omitted it.
    #[serde(default)]
    pub list: Option<Vec<CommandDef>>,
}

impl PageDef {
    /// Iterate the text of every well-formed comment command on this page.
    ///
    /// Commands with other codes, or comments whose first parameter is not text, are skipped.
    pub fn comments(&self) -> impl Iterator<Item = &str> {
        self.list
            .iter()
            .flatten()
            .filter(|cmd| cmd.is_comment())
            .filter_map(CommandDef::text)
    }
}

fn default_move_speed() -> u8 {
    3
}

fn default_move_frequency() -> u8 {
    3
}

/// Standard page preconditions built into the host engine.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PageConditionDef {
    #[serde(default)]
    pub switch1: Option<u32>,
    #[serde(default)]
    pub switch2: Option<u32>,
    #[serde(default)]
    pub variable: Option<VariableConditionDef>,
    /// Built-in self switch letter ("A".."D").
    #[serde(default)]
    pub self_switch: Option<String>,
}

/// "Variable `id` is at least `value`."
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct VariableConditionDef {
    pub id: u32,
    pub value: i64,
}

/// Sprite settings for a page.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct GraphicDef {
    #[serde(default)]
    pub tile_id: u32,
    #[serde(default)]
    pub character_name: String,
    #[serde(default)]
    pub character_hue: u16,
    #[serde(default = "default_direction")]
    pub direction: u8,
    #[serde(default)]
    pub pattern: u8,
}

fn default_direction() -> u8 {
    2
}

/// Autonomous movement kind for a page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MoveType {
    #[default]
    Fixed,
    Random,
    Approach,
    Custom,
}

/// What starts a page's command list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TriggerKind {
    #[default]
    ActionButton,
    PlayerTouch,
    EventTouch,
    Autorun,
    Parallel,
}

/// A raw event command.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CommandDef {
    pub code: u16,
    #[serde(default)]
    pub parameters: Vec<ParamDef>,
}

impl CommandDef {
    /// Build a comment command carrying `text`.
    pub fn comment(text: impl Into<String>) -> Self {
        Self {
            code: COMMENT_CODE,
            parameters: vec![ParamDef::Text(text.into())],
        }
    }

    pub fn is_comment(&self) -> bool {
        self.code == COMMENT_CODE || self.code == COMMENT_CONTINUATION_CODE
    }

    /// First parameter, if it is text.
    pub fn text(&self) -> Option<&str> {
        match self.parameters.first() {
            Some(ParamDef::Text(text)) => Some(text),
            _ => None,
        }
    }
}

/// Loosely typed command parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ParamDef {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_skip_non_comment_and_non_text_commands() {
        let page = PageDef {
            list: Some(vec![
                CommandDef::comment("Switch: DOOR: on"),
                CommandDef {
                    code: 101,
                    parameters: vec![ParamDef::Text("Hello".into())],
                },
                CommandDef {
                    code: COMMENT_CONTINUATION_CODE,
                    parameters: vec![ParamDef::Int(4)],
                },
                CommandDef {
                    code: COMMENT_CONTINUATION_CODE,
                    parameters: vec![ParamDef::Text("SelfSwitch: LAMP".into())],
                },
            ]),
            ..PageDef::default()
        };
        let comments: Vec<_> = page.comments().collect();
        assert_eq!(comments, vec!["Switch: DOOR: on", "SelfSwitch: LAMP"]);
    }

    #[test]
    fn missing_list_yields_no_comments() {
        let page = PageDef::default();
        assert_eq!(page.comments().count(), 0);
    }

    #[test]
    fn sparse_map_definition_deserializes() {
        let text = r#"(
            id: 3,
            events: [
                (id: 1, pages: [None, Some((trigger: autorun))]),
                (id: 2),
            ],
        )"#;
        let map: MapDef = ron::from_str(text).expect("parse map");
        assert_eq!(map.events.len(), 2);
        assert!(map.events[0].pages[0].is_none());
        let page = map.events[0].pages[1].as_ref().expect("second page");
        assert_eq!(page.trigger, TriggerKind::Autorun);
        assert_eq!(page.move_speed, 3);
        assert!(page.list.is_none());
        assert!(map.events[1].pages.is_empty());
    }
}
