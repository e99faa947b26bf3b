use std::collections::HashMap;

use egui::Color32;

// ── Task color palette ───────────────────────────────────────────────────────

/// Default bar color for tasks that resolve to no palette entry (steel blue).
pub const DEFAULT_TASK_COLOR: Color32 = Color32::from_rgb(70, 130, 180);

/// Palette used for positional group color assignment.
pub const TASK_COLORS: &[Color32] = &[
    Color32::from_rgb(66, 133, 244),  // Google blue
    Color32::from_rgb(52, 168, 83),   // Green
    Color32::from_rgb(171, 71, 188),  // Purple
    Color32::from_rgb(251, 140, 0),   // Orange
    Color32::from_rgb(3, 169, 244),   // Light blue
    Color32::from_rgb(229, 57, 53),   // Red
    Color32::from_rgb(0, 188, 212),   // Cyan
    Color32::from_rgb(255, 193, 7),   // Amber
];

/// Palette color for the n-th distinct group (wraps around).
pub fn task_color(index: usize) -> Color32 {
    TASK_COLORS[index % TASK_COLORS.len()]
}

// ── Group palette ────────────────────────────────────────────────────────────

/// Color configuration for group-based task coloring.
///
/// Resolution is three-tiered: an explicit mapping wins, otherwise groups get
/// palette colors in first-seen order, otherwise `fallback`.
#[derive(Debug, Clone)]
pub struct GroupPalette {
    /// Explicit group-name to color overrides.
    pub explicit: HashMap<String, Color32>,
    /// Positional palette cycled through in first-seen group order.
    pub palette: Vec<Color32>,
    /// Color for tasks with no group and for an empty palette.
    pub fallback: Color32,
}

impl Default for GroupPalette {
    fn default() -> Self {
        Self {
            explicit: HashMap::new(),
            palette: TASK_COLORS.to_vec(),
            fallback: DEFAULT_TASK_COLOR,
        }
    }
}

impl GroupPalette {
    /// Color for the group at positional `slot`, or `fallback` when the
    /// palette is empty.
    pub fn positional(&self, slot: usize) -> Color32 {
        if self.palette.is_empty() {
            self.fallback
        } else {
            self.palette[slot % self.palette.len()]
        }
    }
}

// ── Interaction states ───────────────────────────────────────────────────────

/// Pointer interaction state of a task bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionState {
    #[default]
    Normal,
    Hovered,
}

/// Resolve a base bar color against an interaction state.
///
/// Hover brightens every channel by a fixed step, saturating at white;
/// normal passes the base color through unchanged.
pub fn resolve(base: Color32, state: InteractionState) -> Color32 {
    match state {
        InteractionState::Normal => base,
        InteractionState::Hovered => Color32::from_rgb(
            base.r().saturating_add(24),
            base.g().saturating_add(24),
            base.b().saturating_add(24),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_wraps_around_palette() {
        let palette = GroupPalette::default();
        assert_eq!(palette.positional(0), TASK_COLORS[0]);
        assert_eq!(palette.positional(TASK_COLORS.len()), TASK_COLORS[0]);
        assert_eq!(palette.positional(TASK_COLORS.len() + 2), TASK_COLORS[2]);
    }

    #[test]
    fn empty_palette_falls_back() {
        let palette = GroupPalette {
            palette: Vec::new(),
            ..Default::default()
        };
        assert_eq!(palette.positional(0), palette.fallback);
        assert_eq!(palette.positional(7), palette.fallback);
    }

    #[test]
    fn hover_brightens_normal_passes_through() {
        let base = Color32::from_rgb(70, 130, 180);
        assert_eq!(resolve(base, InteractionState::Normal), base);
        let hovered = resolve(base, InteractionState::Hovered);
        assert_eq!(hovered, Color32::from_rgb(94, 154, 204));
    }

    #[test]
    fn hover_saturates_at_white() {
        let near_white = Color32::from_rgb(250, 250, 250);
        let hovered = resolve(near_white, InteractionState::Hovered);
        assert_eq!(hovered, Color32::from_rgb(255, 255, 255));
    }
}
