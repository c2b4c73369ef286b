//! Department colour palette.
//!
//! A [`DepartmentPalette`] is an explicit context object: callers create one
//! (seeded with the default departments), mutate it only through the
//! operations below, and pass it by reference to whatever renders cards.
//! Nothing here is global.

use crate::error::PaletteError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The seven departments every palette starts with.
pub const DEFAULT_DEPARTMENTS: [(&str, HexColor); 7] = [
    ("Hardware", HexColor::new(0x4F, 0x46, 0xE5)),
    ("Software", HexColor::new(0x10, 0xB9, 0x81)),
    ("Electronics", HexColor::new(0xF5, 0x9E, 0x0B)),
    ("Mechanical", HexColor::new(0xEF, 0x44, 0x44)),
    ("Production", HexColor::new(0x8B, 0x5C, 0xF6)),
    ("Quality", HexColor::new(0xEC, 0x48, 0x99)),
    ("Logistics", HexColor::new(0x06, 0xB6, 0xD4)),
];

/// Colour for a department with no palette entry and no explicit row colour.
pub const FALLBACK_COLOR: HexColor = HexColor::new(0x4F, 0x46, 0xE5);

/// Base colour given to a department added without one.
pub const NEW_DEPARTMENT_COLOR: HexColor = HexColor::new(0x80, 0x80, 0x80);

// ── Colour ───────────────────────────────────────────────────────────────

/// An sRGB colour written as `#rgb` or `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl HexColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Move each channel `amount` of the way towards white.
    pub fn lighten(self, amount: f64) -> Self {
        let ch = |c: u8| {
            let c = f64::from(c);
            (c + (255.0 - c) * amount).clamp(0.0, 255.0).round() as u8
        };
        Self::new(ch(self.r), ch(self.g), ch(self.b))
    }

    /// Scale each channel by `1 - amount`.
    pub fn darken(self, amount: f64) -> Self {
        let ch = |c: u8| (f64::from(c) * (1.0 - amount)).clamp(0.0, 255.0).round() as u8;
        Self::new(ch(self.r), ch(self.g), ch(self.b))
    }

    /// Channels as 0.0–1.0 floats, the form PDF colour operators take.
    pub fn unit(self) -> (f32, f32, f32) {
        (
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        )
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl FromStr for HexColor {
    type Err = PaletteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PaletteError::InvalidColor(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| invalid());
        match hex.len() {
            3 => {
                let d = |i: usize| channel(&hex[i..i + 1]).map(|v| v * 17);
                Ok(Self::new(d(0)?, d(1)?, d(2)?))
            }
            6 => Ok(Self::new(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for HexColor {
    type Error = PaletteError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HexColor> for String {
    fn from(value: HexColor) -> Self {
        value.to_string()
    }
}

/// A base colour and the shades derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shades {
    pub light: HexColor,
    pub base: HexColor,
    pub dark: HexColor,
    pub border: HexColor,
}

impl Shades {
    pub fn from_base(base: HexColor) -> Self {
        Self {
            light: base.lighten(0.15),
            base,
            dark: base.darken(0.15),
            border: base.darken(0.1),
        }
    }
}

// ── Palette ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub name: String,
    pub color: HexColor,
    pub is_default: bool,
}

/// Department name → base colour, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentPalette {
    departments: Vec<Department>,
}

impl Default for DepartmentPalette {
    fn default() -> Self {
        Self {
            departments: DEFAULT_DEPARTMENTS
                .iter()
                .map(|(name, color)| Department {
                    name: (*name).to_string(),
                    color: *color,
                    is_default: true,
                })
                .collect(),
        }
    }
}

impl DepartmentPalette {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn departments(&self) -> &[Department] {
        &self.departments
    }

    fn position(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.departments.iter().position(|d| d.name == name)
    }

    /// Add a department with the neutral grey base colour.
    pub fn add(&mut self, name: &str) -> Result<(), PaletteError> {
        self.add_with_color(name, NEW_DEPARTMENT_COLOR)
    }

    pub fn add_with_color(&mut self, name: &str, color: HexColor) -> Result<(), PaletteError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(PaletteError::EmptyName);
        }
        if self.position(trimmed).is_some() {
            return Err(PaletteError::DuplicateDepartment(trimmed.to_string()));
        }
        self.departments.push(Department {
            name: trimmed.to_string(),
            color,
            is_default: false,
        });
        Ok(())
    }

    /// Change a department's base colour.
    pub fn update(&mut self, name: &str, color: HexColor) -> Result<(), PaletteError> {
        let idx = self
            .position(name)
            .ok_or_else(|| PaletteError::UnknownDepartment(name.trim().to_string()))?;
        self.departments[idx].color = color;
        Ok(())
    }

    /// Remove a department the user added. Defaults cannot be removed.
    pub fn remove(&mut self, name: &str) -> Result<(), PaletteError> {
        let idx = self
            .position(name)
            .ok_or_else(|| PaletteError::UnknownDepartment(name.trim().to_string()))?;
        if self.departments[idx].is_default {
            return Err(PaletteError::DefaultDepartment(
                self.departments[idx].name.clone(),
            ));
        }
        self.departments.remove(idx);
        Ok(())
    }

    /// Restore the default mapping, dropping added departments.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn color_for(&self, name: &str) -> Option<HexColor> {
        self.position(name).map(|i| self.departments[i].color)
    }

    pub fn shades(&self, name: &str) -> Option<Shades> {
        self.color_for(name).map(Shades::from_base)
    }

    /// The accent colour for a row: its explicit colour when it parses, then
    /// the palette entry, then [`FALLBACK_COLOR`].
    pub fn resolve(&self, department: &str, explicit: Option<&str>) -> HexColor {
        explicit
            .and_then(|c| c.parse::<HexColor>().ok())
            .or_else(|| self.color_for(department))
            .unwrap_or(FALLBACK_COLOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_long_hex() {
        assert_eq!("#4F46E5".parse::<HexColor>().unwrap(), HexColor::new(0x4F, 0x46, 0xE5));
        assert_eq!("#fff".parse::<HexColor>().unwrap(), HexColor::new(255, 255, 255));
        assert!("4F46E5".parse::<HexColor>().is_err());
        assert!("#12345".parse::<HexColor>().is_err());
        assert!("#GGGGGG".parse::<HexColor>().is_err());
        assert!("#é12".parse::<HexColor>().is_err());
    }

    #[test]
    fn display_is_upper_hex() {
        assert_eq!(HexColor::new(6, 182, 212).to_string(), "#06B6D4");
    }

    #[test]
    fn shades_of_hardware() {
        let s = Shades::from_base(HexColor::new(0x4F, 0x46, 0xE5));
        // 79 + 176*0.15 = 105.4, 70 + 185*0.15 = 97.75, 229 + 26*0.15 = 232.9
        assert_eq!(s.light, HexColor::new(105, 98, 233));
        // 79*0.85 = 67.15, 70*0.85 = 59.5, 229*0.85 = 194.65
        assert_eq!(s.dark, HexColor::new(67, 60, 195));
        assert_eq!(s.border, HexColor::new(71, 63, 206));
    }

    #[test]
    fn defaults_cannot_be_removed() {
        let mut p = DepartmentPalette::new();
        assert_eq!(
            p.remove("Hardware"),
            Err(PaletteError::DefaultDepartment("Hardware".into()))
        );
        assert_eq!(p.departments().len(), 7);
    }

    #[test]
    fn add_update_remove_reset() {
        let mut p = DepartmentPalette::new();
        p.add(" Shipping ").unwrap();
        assert_eq!(p.color_for("Shipping"), Some(NEW_DEPARTMENT_COLOR));
        assert_eq!(
            p.add("Shipping"),
            Err(PaletteError::DuplicateDepartment("Shipping".into()))
        );
        assert_eq!(p.add("  "), Err(PaletteError::EmptyName));

        let teal = "#008080".parse().unwrap();
        p.update("Shipping", teal).unwrap();
        assert_eq!(p.color_for("Shipping"), Some(teal));
        p.update("Hardware", teal).unwrap();

        p.remove("Shipping").unwrap();
        assert_eq!(p.color_for("Shipping"), None);

        p.reset();
        assert_eq!(p, DepartmentPalette::default());
    }

    #[test]
    fn resolve_precedence() {
        let p = DepartmentPalette::new();
        assert_eq!(p.resolve("Software", Some("#000000")), HexColor::new(0, 0, 0));
        assert_eq!(p.resolve("Software", Some("teal")), HexColor::new(0x10, 0xB9, 0x81));
        assert_eq!(p.resolve("Unknown", None), FALLBACK_COLOR);
    }

    #[test]
    fn serde_uses_hex_strings() {
        let json = serde_json::to_string(&HexColor::new(1, 2, 3)).unwrap();
        assert_eq!(json, "\"#010203\"");
        let back: HexColor = serde_json::from_str("\"#abc\"").unwrap();
        assert_eq!(back, HexColor::new(0xAA, 0xBB, 0xCC));
    }
}
