use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Visual styles a logo can be restyled into, in catalog order.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, EnumString, EnumIter, Display, PartialEq, Eq, Hash,
)]
#[strum(serialize_all = "title_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum Style {
    Cyberpunk,
    Vaporwave,
    Minimalist,
    Watercolor,
    Steampunk,
    Graffiti,
    PixelArt,
    Neon,
    Origami,
    ArtDeco,
}

impl Style {
    /// The full catalog, in generation order.
    pub fn catalog() -> Vec<Style> {
        Style::iter().collect()
    }

    /// Lowercase, hyphenated name used in download file names and URLs.
    pub fn slug(&self) -> String {
        self.to_string().to_lowercase().replace(' ', "-")
    }

    /// Parse either the display name ("Pixel Art") or the slug ("pixel-art").
    pub fn from_slug(value: &str) -> Option<Style> {
        let normalized = value.replace(['-', '_'], " ");
        normalized.parse().ok()
    }

    /// Style-specific guidance appended to the restyle instruction.
    pub fn guidance(&self) -> &'static str {
        match self {
            Style::Cyberpunk => "neon magenta and cyan glow, chrome edges, dark futuristic city mood",
            Style::Vaporwave => "pastel pink and teal gradients, retro 80s grid, glitchy nostalgic feel",
            Style::Minimalist => "flat shapes, a restrained two or three color palette, generous negative space",
            Style::Watercolor => "soft bleeding pigment, visible paper texture, loose hand-painted edges",
            Style::Steampunk => "brass and copper materials, gears and rivets, Victorian industrial detail",
            Style::Graffiti => "spray paint texture, bold outlines, drips and a street-art wall backdrop",
            Style::PixelArt => "a crisp low-resolution pixel grid, limited palette, no anti-aliasing",
            Style::Neon => "glowing neon tube lettering against a dark brick wall",
            Style::Origami => "folded paper facets, crisp creases, soft studio lighting",
            Style::ArtDeco => "gold geometric ornament, symmetrical lines, 1920s luxury poster look",
        }
    }

    /// Full instruction text sent alongside the uploaded image.
    pub fn instruction(&self) -> String {
        format!(
            "Redesign this logo in a {} style: {}. Keep the original composition, \
             text and silhouette recognizable. Return only the restyled logo image.",
            self,
            self.guidance()
        )
    }
}
