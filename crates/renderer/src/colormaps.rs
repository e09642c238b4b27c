//! Fixed registry of named colormaps.
//!
//! Lookups return an explicit miss rather than an error: the render path
//! treats an unknown name as "no colormap" and falls back to grayscale.

use std::collections::HashMap;

use crate::gradient::Rgb;

/// The registry of built-in colormap stop lists.
pub struct Colormaps {
    stops: HashMap<String, Vec<Rgb>>,
}

impl Colormaps {
    /// Registry with the built-in colormaps.
    pub fn builtin() -> Self {
        let mut stops = HashMap::new();
        stops.insert("default".to_string(), default_stops());
        stops.insert("thermal".to_string(), thermal_stops());
        stops.insert(
            "grayscale".to_string(),
            vec![Rgb(0, 0, 0), Rgb(255, 255, 255)],
        );
        Self { stops }
    }

    /// Stop list for a named colormap, if registered.
    pub fn get(&self, name: &str) -> Option<&[Rgb]> {
        self.stops.get(name).map(|v| v.as_slice())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.stops.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for Colormaps {
    fn default() -> Self {
        Self::builtin()
    }
}

/// The house 16-stop ramp (purple → teal → green → amber → red).
fn default_stops() -> Vec<Rgb> {
    vec![
        Rgb(0x8b, 0x49, 0xbd),
        Rgb(0x62, 0x4f, 0xad),
        Rgb(0x41, 0x5b, 0xa0),
        Rgb(0x44, 0x77, 0xaa),
        Rgb(0x4c, 0x97, 0xb7),
        Rgb(0x59, 0xbc, 0xc8),
        Rgb(0x68, 0xe0, 0xd6),
        Rgb(0x67, 0xd0, 0xd0),
        Rgb(0x69, 0xb8, 0x5e),
        Rgb(0x8c, 0xb2, 0x3d),
        Rgb(0xe6, 0xca, 0x44),
        Rgb(0xec, 0xb1, 0x3f),
        Rgb(0xdd, 0xb8, 0x37),
        Rgb(0xe0, 0x4d, 0x2a),
        Rgb(0xc3, 0x36, 0x22),
        Rgb(0x95, 0x27, 0x17),
    ]
}

/// Cold-to-hot ramp for temperature-like fields.
fn thermal_stops() -> Vec<Rgb> {
    vec![
        Rgb(25, 0, 76),
        Rgb(0, 0, 255),
        Rgb(0, 255, 255),
        Rgb(0, 255, 0),
        Rgb(255, 255, 0),
        Rgb(255, 165, 0),
        Rgb(255, 0, 0),
        Rgb(139, 0, 0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gradient::build_gradient;

    #[test]
    fn test_builtin_names() {
        let colormaps = Colormaps::builtin();
        assert_eq!(colormaps.names(), vec!["default", "grayscale", "thermal"]);
    }

    #[test]
    fn test_unknown_name_is_a_miss_not_an_error() {
        let colormaps = Colormaps::builtin();
        assert!(colormaps.get("sepia").is_none());
    }

    #[test]
    fn test_all_builtins_build() {
        let colormaps = Colormaps::builtin();
        for name in colormaps.names() {
            let stops = colormaps.get(name).unwrap();
            assert!(stops.len() >= 2, "{} has too few stops", name);
            build_gradient(stops).unwrap();
        }
    }
}
