//! UI widget data literals.
//!
//! The front end renders tables and lists from fixed-shape JSON fragments.
//! Each builder here produces exactly the shape the UI expects; changing a
//! field name or nesting level breaks rendering.

use serde::{Deserialize, Serialize};

/// A single text cell.
///
/// Every table cell, regardless of its source type, is rendered as one of
/// these wrapped in a one-element list.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TextCell {
    /// Widget type discriminator, always `"text"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Display text.
    pub label: String,
    /// Text colour.
    pub color: String,
}

impl TextCell {
    /// Return a black text cell for `label`.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            label: label.into(),
            color: "black".to_string(),
        }
    }
}

/// An image widget, used for generated plots.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ImageWidget {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: ImageData,
}

/// Payload of an [ImageWidget].
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ImageData {
    pub url: String,
    pub width: String,
}

impl ImageWidget {
    /// Return an image widget for `url` at the given CSS width.
    pub fn new(url: impl Into<String>, width: impl Into<String>) -> Self {
        Self {
            kind: "image".to_string(),
            data: ImageData {
                url: url.into(),
                width: width.into(),
            },
        }
    }
}

/// A hyperlink widget.
#[derive(Clone, Debug, Serialize)]
pub struct LinkWidget {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub target: String,
    pub url: String,
    pub label: String,
}

impl LinkWidget {
    /// Return a link opening in a new tab.
    pub fn new(url: impl Into<String>, label: impl Into<String>, tooltip: impl Into<String>) -> Self {
        Self {
            kind: "link".to_string(),
            title: tooltip.into(),
            target: "_blank".to_string(),
            url: url.into(),
            label: label.into(),
        }
    }
}

/// An image that links elsewhere when clicked.
#[derive(Clone, Debug, Serialize)]
pub struct LinkableImage {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: LinkableImageData,
}

#[derive(Clone, Debug, Serialize)]
pub struct LinkableImageData {
    pub title: String,
    pub width: String,
    pub url: String,
    pub link: String,
}

impl LinkableImage {
    pub fn new(
        img_url: impl Into<String>,
        target_url: impl Into<String>,
        tooltip: impl Into<String>,
        width: impl Into<String>,
    ) -> Self {
        Self {
            kind: "linkable_image".to_string(),
            data: LinkableImageData {
                title: tooltip.into(),
                width: width.into(),
                url: img_url.into(),
                link: target_url.into(),
            },
        }
    }
}

/// A button that navigates to a URL.
#[derive(Clone, Debug, Serialize)]
pub struct ButtonWidget {
    #[serde(rename = "type")]
    pub kind: String,
    pub action: String,
    pub label: String,
    pub data: ButtonData,
}

#[derive(Clone, Debug, Serialize)]
pub struct ButtonData {
    pub url: String,
}

impl ButtonWidget {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: "button".to_string(),
            action: "link".to_string(),
            label: label.into(),
            data: ButtonData { url: url.into() },
        }
    }
}

/// A container stacking several widgets in one cell.
#[derive(Clone, Debug, Serialize)]
pub struct MultiElement {
    #[serde(rename = "type")]
    pub kind: String,
    pub elements: Vec<Widget>,
    #[serde(rename = "layout_align", skip_serializing_if = "Option::is_none")]
    pub alignment: Option<String>,
}

impl MultiElement {
    pub fn new(alignment: Option<&str>) -> Self {
        Self {
            kind: "multi".to_string(),
            elements: Vec::new(),
            alignment: alignment.map(str::to_string),
        }
    }

    pub fn push(&mut self, element: impl Into<Widget>) {
        self.elements.push(element.into());
    }
}

/// Any widget that may appear in an overview table cell.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum Widget {
    Text(TextCell),
    Link(LinkWidget),
    LinkableImage(LinkableImage),
    Button(ButtonWidget),
    Multi(MultiElement),
}

impl From<TextCell> for Widget {
    fn from(w: TextCell) -> Self {
        Widget::Text(w)
    }
}

impl From<LinkWidget> for Widget {
    fn from(w: LinkWidget) -> Self {
        Widget::Link(w)
    }
}

impl From<LinkableImage> for Widget {
    fn from(w: LinkableImage) -> Self {
        Widget::LinkableImage(w)
    }
}

impl From<ButtonWidget> for Widget {
    fn from(w: ButtonWidget) -> Self {
        Widget::Button(w)
    }
}

impl From<MultiElement> for Widget {
    fn from(w: MultiElement) -> Self {
        Widget::Multi(w)
    }
}

/// An entry in a typeahead or selection list.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ListEntry {
    pub id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,
}

impl ListEntry {
    /// Return a list entry, optionally carrying an icon path.
    pub fn new(id: impl Into<String>, label: impl Into<String>, img: Option<&str>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            img: img.map(str::to_string),
        }
    }
}
