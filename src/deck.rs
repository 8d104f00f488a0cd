// Deck Gate - Presentation Document Model
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// In-memory presentation handle: layouts, slides, placeholders, core
// properties. Serialized as JSON under the document extension.
// Tools mutate a Deck in place through the session store.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Default master layouts, in the order decks expose them
const DEFAULT_LAYOUTS: &[(&str, &[u32])] = &[
    ("Title Slide", &[0, 1]),
    ("Title and Content", &[0, 1]),
    ("Section Header", &[0, 1]),
    ("Two Content", &[0, 1, 2]),
    ("Comparison", &[0, 1, 2, 3, 4]),
    ("Title Only", &[0]),
    ("Blank", &[]),
    ("Content with Caption", &[0, 1, 2]),
    ("Picture with Caption", &[0, 1, 2]),
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Layout {
    pub name: String,
    /// Placeholder indices the layout provides (0 is always the title)
    pub placeholders: Vec<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Slide {
    pub layout_index: usize,
    pub title: Option<String>,
    /// Placeholder index -> paragraphs
    #[serde(default)]
    pub placeholders: BTreeMap<u32, Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CoreProperties {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub author: Option<String>,
    pub keywords: Option<String>,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Deck {
    pub layouts: Vec<Layout>,
    pub slides: Vec<Slide>,
    #[serde(default)]
    pub core: CoreProperties,
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}

impl Deck {
    /// Empty deck with the default master layouts
    pub fn new() -> Self {
        Self {
            layouts: DEFAULT_LAYOUTS
                .iter()
                .map(|(name, placeholders)| Layout {
                    name: name.to_string(),
                    placeholders: placeholders.to_vec(),
                })
                .collect(),
            slides: Vec::new(),
            core: CoreProperties::default(),
        }
    }

    pub fn open(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        if content.trim().is_empty() {
            bail!("{} is empty", path.display());
        }
        let deck: Deck = serde_json::from_str(&content)
            .with_context(|| format!("{} is not a presentation", path.display()))?;
        if deck.layouts.is_empty() {
            bail!("{} has no slide layouts", path.display());
        }
        Ok(deck)
    }

    /// New deck sharing a template's layouts, slides and properties
    pub fn from_template(path: &Path) -> Result<Self> {
        Self::open(path)
    }

    /// Write the deck, returning the path written
    pub fn save(&self, path: &Path) -> Result<String> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("cannot write {}", path.display()))?;
        Ok(path.display().to_string())
    }

    /// Append a slide using `layout_index`, returning its index
    pub fn add_slide(&mut self, layout_index: usize) -> Result<usize> {
        if layout_index >= self.layouts.len() {
            bail!(
                "Invalid slide layout index {}. Available layouts: 0-{}",
                layout_index,
                self.layouts.len() - 1
            );
        }
        self.slides.push(Slide {
            layout_index,
            ..Slide::default()
        });
        Ok(self.slides.len() - 1)
    }

    pub fn slide(&self, index: usize) -> Result<&Slide> {
        self.slides.get(index).ok_or_else(|| self.slide_range_error(index))
    }

    pub fn slide_mut(&mut self, index: usize) -> Result<&mut Slide> {
        let err = self.slide_range_error(index);
        self.slides.get_mut(index).ok_or(err)
    }

    fn slide_range_error(&self, index: usize) -> anyhow::Error {
        if self.slides.is_empty() {
            anyhow!("Invalid slide index {}: presentation has no slides", index)
        } else {
            anyhow!(
                "Invalid slide index {}. Available slides: 0-{}",
                index,
                self.slides.len() - 1
            )
        }
    }

    pub fn set_title(&mut self, slide_index: usize, title: &str) -> Result<()> {
        let slide = self.slide_mut(slide_index)?;
        slide.title = Some(title.to_string());
        Ok(())
    }

    /// Replace a placeholder's text. Fails when the layout lacks it.
    pub fn populate_placeholder(&mut self, slide_index: usize, placeholder: u32, text: &str) -> Result<()> {
        let layout_index = self.slide(slide_index)?.layout_index;
        let layout = &self.layouts[layout_index];
        if !layout.placeholders.contains(&placeholder) {
            bail!(
                "Placeholder {} not found on layout '{}' (has {:?})",
                placeholder,
                layout.name,
                layout.placeholders
            );
        }
        let slide = self.slide_mut(slide_index)?;
        if placeholder == 0 {
            slide.title = Some(text.to_string());
        }
        slide
            .placeholders
            .insert(placeholder, text.lines().map(str::to_string).collect());
        Ok(())
    }

    /// Append bullet paragraphs to the slide's body placeholder (index 1)
    pub fn add_bullets(&mut self, slide_index: usize, bullets: &[String]) -> Result<usize> {
        let layout_index = self.slide(slide_index)?.layout_index;
        if !self.layouts[layout_index].placeholders.contains(&1) {
            bail!("Slide {} has no body placeholder for bullet points", slide_index);
        }
        let slide = self.slide_mut(slide_index)?;
        let body = slide.placeholders.entry(1).or_default();
        body.extend(bullets.iter().cloned());
        Ok(body.len())
    }

    /// All text on a slide, title first
    pub fn slide_text(&self, slide_index: usize) -> Result<Vec<String>> {
        let slide = self.slide(slide_index)?;
        let mut text = Vec::new();
        if let Some(title) = &slide.title {
            text.push(title.clone());
        }
        for (idx, paragraphs) in &slide.placeholders {
            if *idx == 0 {
                continue;
            }
            text.extend(paragraphs.iter().cloned());
        }
        Ok(text)
    }

    pub fn info(&self) -> Value {
        json!({
            "slide_count": self.slides.len(),
            "slide_layouts": self.layouts.iter().map(|l| l.name.clone()).collect::<Vec<_>>(),
            "core_properties": self.core,
        })
    }

    pub fn slide_info(&self, slide_index: usize) -> Result<Value> {
        let slide = self.slide(slide_index)?;
        let layout = &self.layouts[slide.layout_index];
        Ok(json!({
            "slide_index": slide_index,
            "layout_index": slide.layout_index,
            "layout_name": layout.name,
            "title": slide.title,
            "placeholders": slide.placeholders.iter().map(|(idx, paragraphs)| json!({
                "idx": idx,
                "text": paragraphs.join("\n"),
            })).collect::<Vec<_>>(),
        }))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn new_deck_has_layouts_and_no_slides() {
        let deck = Deck::new();
        assert_eq!(deck.layouts.len(), DEFAULT_LAYOUTS.len());
        assert!(deck.slides.is_empty());
    }

    #[test]
    fn save_then_open_preserves_content() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("d.pptx");
        let mut deck = Deck::new();
        let idx = deck.add_slide(0)?;
        deck.set_title(idx, "Hello")?;
        deck.core.author = Some("me".into());
        deck.save(&path)?;
        assert_eq!(Deck::open(&path)?, deck);
        Ok(())
    }

    #[test]
    fn open_rejects_empty_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("e.pptx");
        std::fs::write(&path, "")?;
        assert!(Deck::open(&path).is_err());
        Ok(())
    }

    #[test]
    fn bad_layout_index_rejected() {
        let mut deck = Deck::new();
        let err = deck.add_slide(99).unwrap_err();
        assert!(err.to_string().contains("Invalid slide layout index"));
    }

    #[test]
    fn placeholder_must_exist_on_layout() -> Result<()> {
        let mut deck = Deck::new();
        let blank = deck.layouts.iter().position(|l| l.name == "Blank").unwrap();
        let idx = deck.add_slide(blank)?;
        assert!(deck.populate_placeholder(idx, 1, "x").is_err());
        Ok(())
    }

    #[test]
    fn bullets_accumulate_in_body() -> Result<()> {
        let mut deck = Deck::new();
        let idx = deck.add_slide(1)?;
        deck.set_title(idx, "Agenda")?;
        deck.add_bullets(idx, &["one".into(), "two".into()])?;
        let count = deck.add_bullets(idx, &["three".into()])?;
        assert_eq!(count, 3);
        assert_eq!(deck.slide_text(idx)?, vec!["Agenda", "one", "two", "three"]);
        Ok(())
    }
}
