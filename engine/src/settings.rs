//! Settings and punctuation binding (C8): a named options bag plus a
//! subscription channel so other front-ends can react to changes without polling.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GalleryView {
    #[default]
    Compact,
    Detailed,
    Expanded,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FlowDirection {
    #[default]
    Ltr,
    Rtl,
    Ttb,
    Btu,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GlyphStacking {
    #[default]
    Horizontal,
    Vertical,
    None,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WordWrap {
    #[default]
    Word,
    Glyph,
    None,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BaselineAlignment {
    Top,
    #[default]
    Center,
    Bottom,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct WritingSystem {
    pub glyph_direction: FlowDirection,
    pub word_order: FlowDirection,
    pub line_progression: FlowDirection,
    pub glyph_stacking: GlyphStacking,
    pub word_wrap: WordWrap,
    pub baseline_alignment: BaselineAlignment,
}

/// How a single punctuation mark resolves to a rendered entry: either hidden,
/// bound to a concrete grapheme, or (when neither applies) the mark's default
/// IPA character, chosen by [`crate::translator`].
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PunctuationBinding {
    pub grapheme_id: Option<i64>,
    pub use_no_glyph: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct PunctuationSettings {
    pub word_separator: PunctuationBinding,
    pub sentence: PunctuationBinding,
    pub comma: PunctuationBinding,
    pub question: PunctuationBinding,
    pub exclamation: PunctuationBinding,
    pub colon: PunctuationBinding,
    pub semicolon: PunctuationBinding,
    pub ellipsis: PunctuationBinding,
    pub quotation_open: PunctuationBinding,
    pub quotation_close: PunctuationBinding,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    pub simple_script_system: bool,
    pub default_gallery_view: GalleryView,
    pub auto_save_interval_ms: u64,
    pub auto_manage_glyphs: bool,
    pub punctuation: PunctuationSettings,
    pub writing_system: WritingSystem,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            simple_script_system: false,
            default_gallery_view: GalleryView::default(),
            auto_save_interval_ms: 0,
            auto_manage_glyphs: false,
            punctuation: PunctuationSettings::default(),
            writing_system: WritingSystem::default(),
        }
    }
}

/// A partial update: every field left `None` keeps its current value.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SettingsPatch {
    pub simple_script_system: Option<bool>,
    pub default_gallery_view: Option<GalleryView>,
    pub auto_save_interval_ms: Option<u64>,
    pub auto_manage_glyphs: Option<bool>,
    pub punctuation: Option<PunctuationSettings>,
    pub writing_system: Option<WritingSystem>,
}

impl Settings {
    fn apply(&mut self, patch: SettingsPatch) {
        if let Some(v) = patch.simple_script_system {
            self.simple_script_system = v;
        }
        if let Some(v) = patch.default_gallery_view {
            self.default_gallery_view = v;
        }
        if let Some(v) = patch.auto_save_interval_ms {
            self.auto_save_interval_ms = v;
        }
        if let Some(v) = patch.auto_manage_glyphs {
            self.auto_manage_glyphs = v;
        }
        if let Some(v) = patch.punctuation {
            self.punctuation = v;
        }
        if let Some(v) = patch.writing_system {
            self.writing_system = v;
        }
    }
}

/// Listeners are plain closures; notification is synchronous and not re-entrant —
/// a listener must not call back into the settings store it was invoked from.
type Listener = Box<dyn Fn(&Settings) + Send>;

#[derive(Default)]
pub struct SettingsStore {
    current: Settings,
    listeners: Vec<Listener>,
}

impl SettingsStore {
    pub fn get(&self) -> &Settings {
        &self.current
    }

    pub fn update(&mut self, patch: SettingsPatch) -> &Settings {
        self.current.apply(patch);
        self.notify();
        &self.current
    }

    pub fn reset(&mut self) -> &Settings {
        self.current = Settings::default();
        self.notify();
        &self.current
    }

    pub fn subscribe(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    fn notify(&self) {
        for listener in &self.listeners {
            listener(&self.current);
        }
    }
}
