use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::{config::ExtractConfig, consts::DEFAULT_FRAGMENT_HEIGHT};

/// A positioned run of text as reported by the PDF engine.
///
/// `origin` is the lower-left corner in page space (y grows upwards), `size` is
/// the width and height of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    pub origin: Vec2,
    pub size: Vec2,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, origin: Vec2, size: Vec2) -> Self {
        Self {
            text: text.into(),
            origin,
            size,
        }
    }

    fn height(&self) -> f32 {
        if self.size.y > 0.0 {
            self.size.y
        } else {
            DEFAULT_FRAGMENT_HEIGHT
        }
    }

    /// Where the next glyph would start if the run continued on the same line.
    fn advance(&self) -> f32 {
        self.origin.x + self.size.x
    }
}

/// Text fragments of one page in document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub height: f32,
    pub fragments: Vec<TextFragment>,
}

/// Reconstructed text of one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    pub index: usize,
    pub text: String,
}

impl PageGeometry {
    fn in_body(&self, fragment: &TextFragment, margin: f32) -> bool {
        let y = fragment.origin.y;
        y < self.height * (1.0 - margin) && y > self.height * margin
    }
}

/// Rebuild reading-order text from positioned fragments.
///
/// Header and footer bands are dropped; a vertical jump starts a new line and a
/// horizontal gap inserts a space, both relative to the fragment height.
pub fn reconstruct(page: &PageGeometry, config: &ExtractConfig) -> String {
    let mut text = String::new();
    let mut last: Option<&TextFragment> = None;

    for fragment in page
        .fragments
        .iter()
        .filter(|fragment| !fragment.text.trim().is_empty())
        .filter(|fragment| page.in_body(fragment, config.header_footer_margin))
    {
        if let Some(prev) = last {
            let height = fragment.height();
            let dy = (fragment.origin.y - prev.origin.y).abs();
            if dy > height * config.line_break_ratio {
                text.push('\n');
            } else if fragment.origin.x - prev.advance() > height * config.space_gap_ratio {
                text.push(' ');
            }
        }
        text.push_str(&fragment.text);
        last = Some(fragment);
    }

    text.push('\n');
    text
}
