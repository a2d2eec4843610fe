pub const TABS: [&str; 2] = ["Home", "shuffle"];

pub fn section_id(tab: &str) -> String {
    tab.to_lowercase()
}

/// Sliding pill behind the hovered tab.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TabHighlight {
    pub left: f64,
    pub width: f64,
    pub opacity: f64,
}

impl TabHighlight {
    pub fn hovered(left: f64, width: f64) -> Self {
        Self {
            left,
            width,
            opacity: 1.0,
        }
    }

    /// Fades out in place so the next hover slides from here.
    pub fn faded(self) -> Self {
        Self {
            opacity: 0.0,
            ..self
        }
    }

    pub fn style(&self) -> String {
        format!(
            "left: {:.2}px; width: {:.2}px; opacity: {};",
            self.left, self.width, self.opacity
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tabs_map_to_lowercase_anchors() {
        let ids = TABS.iter().map(|tab| section_id(tab)).collect::<Vec<_>>();
        assert_eq!(ids, vec!["home".to_string(), "shuffle".to_string()]);
    }

    #[test]
    fn highlight_starts_hidden() {
        assert_eq!(TabHighlight::default().opacity, 0.0);
    }

    #[test]
    fn leaving_keeps_the_last_bounds() {
        let highlight = TabHighlight::hovered(84.0, 96.5);
        assert_eq!(highlight.opacity, 1.0);

        let faded = highlight.faded();
        assert_eq!(faded.left, 84.0);
        assert_eq!(faded.width, 96.5);
        assert_eq!(faded.opacity, 0.0);
    }

    #[test]
    fn style_carries_position_and_opacity() {
        assert_eq!(
            TabHighlight::hovered(4.0, 70.25).style(),
            "left: 4.00px; width: 70.25px; opacity: 1;"
        );
    }
}
