use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PRIMARY_QUERY: SearchQuery = SearchQuery {
    term: "aesthetic",
    per_page: 10,
};
pub const TRAIL_QUERY: SearchQuery = SearchQuery {
    term: "interactive",
    per_page: 16,
};
pub const CARD_STACK_SIZE: usize = 6;
pub const REFRESH_SETTLE_MS: u32 = 300;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchQuery {
    pub term: &'static str,
    pub per_page: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("photo request failed: {0}")]
    Transport(String),
    #[error("photo request returned status {0}")]
    Status(u16),
    #[error("photo payload was malformed: {0}")]
    Payload(String),
    #[error("photo search returned no results")]
    Empty,
}

/// Wire shape of a photo search response. Only the landscape rendition is read; the
/// proxy re-emits the same shape so the page can talk to either.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    #[serde(default)]
    pub photos: Vec<Photo>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Photo {
    pub src: PhotoSources,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PhotoSources {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landscape: Option<String>,
}

impl SearchResponse {
    pub fn from_urls(urls: impl IntoIterator<Item = String>) -> Self {
        Self {
            photos: urls
                .into_iter()
                .map(|url| Photo {
                    src: PhotoSources {
                        landscape: Some(url),
                    },
                })
                .collect(),
        }
    }

    pub fn landscape_urls(&self) -> Vec<String> {
        self.photos
            .iter()
            .filter_map(|photo| photo.src.landscape.as_deref())
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(ToString::to_string)
            .collect()
    }

    pub fn into_batch(self) -> Result<Vec<String>, FetchError> {
        let urls = self.landscape_urls();
        if urls.is_empty() {
            return Err(FetchError::Empty);
        }

        Ok(urls)
    }
}

/// Maps a uniform sample in `[0, 1)` onto an index of a list of `len` items.
pub fn pick_index(len: usize, sample: f64) -> Option<usize> {
    if len == 0 {
        return None;
    }

    let sample = if sample.is_finite() {
        sample.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let index = (sample * len as f64).floor() as usize;
    Some(index.min(len - 1))
}

/// One step of the page's fetch lifecycle. Loads carry the raw fetch outcome so a
/// failure flows through the same path as a success.
#[derive(Debug)]
pub enum GalleryAction {
    RefreshStarted,
    RefreshSettled,
    PrimaryLoaded {
        batch: Result<Vec<String>, FetchError>,
        sample: f64,
    },
    TrailLoaded(Result<Vec<String>, FetchError>),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Gallery {
    pub feature: Option<String>,
    pub cards: Vec<String>,
    pub trail: Vec<String>,
    pub refreshing: bool,
}

impl Gallery {
    /// Failed or empty loads leave every field untouched and hand the error back.
    /// Only the refresh markers move `refreshing`.
    pub fn apply(&mut self, action: GalleryAction) -> Result<(), FetchError> {
        match action {
            GalleryAction::RefreshStarted => {
                self.refreshing = true;
                Ok(())
            }
            GalleryAction::RefreshSettled => {
                self.refreshing = false;
                Ok(())
            }
            GalleryAction::PrimaryLoaded { batch, sample } => self.apply_primary(batch?, sample),
            GalleryAction::TrailLoaded(batch) => self.apply_trail(batch?),
        }
    }

    /// Installs a primary batch: one random member becomes the feature image and the
    /// whole batch becomes the card pool. An empty batch leaves everything untouched.
    pub fn apply_primary(&mut self, batch: Vec<String>, sample: f64) -> Result<(), FetchError> {
        let index = pick_index(batch.len(), sample).ok_or(FetchError::Empty)?;
        self.feature = Some(batch[index].clone());
        self.cards = batch;
        Ok(())
    }

    pub fn apply_trail(&mut self, batch: Vec<String>) -> Result<(), FetchError> {
        if batch.is_empty() {
            return Err(FetchError::Empty);
        }

        self.trail = batch;
        Ok(())
    }

    pub fn card_stack(&self) -> &[String] {
        let end = self.cards.len().min(CARD_STACK_SIZE);
        &self.cards[..end]
    }

    pub fn visible_feature(&self) -> Option<&str> {
        if self.refreshing {
            return None;
        }

        self.feature.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(count: usize) -> Vec<String> {
        (0..count)
            .map(|index| format!("https://images.example/{index}.jpeg"))
            .collect()
    }

    #[test]
    fn search_response_reads_landscape_urls() {
        let raw = r#"{
            "page": 1,
            "photos": [
                { "id": 1, "src": { "landscape": "https://images.example/a.jpeg", "tiny": "x" } },
                { "id": 2, "src": { "original": "https://images.example/b.jpeg" } },
                { "id": 3, "src": { "landscape": "  " } },
                { "id": 4, "src": { "landscape": "https://images.example/c.jpeg" } }
            ]
        }"#;

        let response: SearchResponse = serde_json::from_str(raw).expect("valid payload");
        assert_eq!(
            response.landscape_urls(),
            vec![
                "https://images.example/a.jpeg".to_string(),
                "https://images.example/c.jpeg".to_string(),
            ]
        );
    }

    #[test]
    fn missing_photos_field_is_an_empty_batch() {
        let response: SearchResponse = serde_json::from_str(r#"{"error":"nope"}"#).expect("valid json");
        assert_eq!(response.into_batch(), Err(FetchError::Empty));
    }

    #[test]
    fn pick_index_covers_the_whole_range() {
        assert_eq!(pick_index(0, 0.5), None);
        assert_eq!(pick_index(10, 0.0), Some(0));
        assert_eq!(pick_index(10, 0.999_999), Some(9));
        assert_eq!(pick_index(10, 1.0), Some(9));
        assert_eq!(pick_index(4, 0.5), Some(2));
        assert_eq!(pick_index(3, f64::NAN), Some(0));
    }

    #[test]
    fn primary_feature_is_always_a_member_of_the_batch() {
        let batch = urls(10);

        for step in 0..100 {
            let sample = f64::from(step) / 100.0;
            let mut gallery = Gallery::default();
            gallery
                .apply_primary(batch.clone(), sample)
                .expect("non-empty batch");

            let feature = gallery.feature.as_ref().expect("feature selected");
            assert!(batch.contains(feature));
            assert_eq!(gallery.cards, batch);
        }
    }

    #[test]
    fn empty_primary_batch_keeps_previous_state() {
        let mut gallery = Gallery::default();
        gallery.apply_primary(urls(3), 0.4).expect("non-empty batch");
        let before = gallery.clone();

        assert_eq!(gallery.apply_primary(Vec::new(), 0.4), Err(FetchError::Empty));
        assert_eq!(gallery, before);
    }

    #[test]
    fn empty_trail_batch_keeps_previous_pool() {
        let mut gallery = Gallery::default();
        gallery.apply_trail(urls(16)).expect("non-empty batch");

        assert_eq!(gallery.apply_trail(Vec::new()), Err(FetchError::Empty));
        assert_eq!(gallery.trail.len(), 16);
    }

    #[test]
    fn card_stack_is_capped() {
        let mut gallery = Gallery::default();
        assert!(gallery.card_stack().is_empty());

        gallery.apply_primary(urls(10), 0.1).expect("non-empty batch");
        assert_eq!(gallery.card_stack().len(), CARD_STACK_SIZE);
        assert_eq!(gallery.card_stack()[0], "https://images.example/0.jpeg");
    }

    #[test]
    fn refreshing_hides_the_feature() {
        let mut gallery = Gallery::default();
        gallery.apply_primary(urls(2), 0.0).expect("non-empty batch");
        assert_eq!(gallery.visible_feature(), Some("https://images.example/0.jpeg"));

        gallery.refreshing = true;
        assert_eq!(gallery.visible_feature(), None);
    }

    fn loaded_gallery() -> Gallery {
        let mut gallery = Gallery::default();
        gallery.apply_primary(urls(10), 0.35).expect("non-empty batch");
        gallery.apply_trail(urls(16)).expect("non-empty batch");
        gallery
    }

    #[test]
    fn failed_refresh_keeps_images_and_clears_the_flag() {
        let mut gallery = loaded_gallery();
        let before = gallery.clone();

        gallery.apply(GalleryAction::RefreshStarted).expect("always applies");
        assert!(gallery.refreshing);

        let outcome = gallery.apply(GalleryAction::PrimaryLoaded {
            batch: Err(FetchError::Status(429)),
            sample: 0.9,
        });
        assert_eq!(outcome, Err(FetchError::Status(429)));
        assert!(gallery.refreshing);
        assert_eq!(gallery.feature, before.feature);
        assert_eq!(gallery.cards, before.cards);

        gallery.apply(GalleryAction::RefreshSettled).expect("always applies");
        assert_eq!(gallery, before);
    }

    #[test]
    fn empty_refresh_keeps_images_and_clears_the_flag() {
        let mut gallery = loaded_gallery();
        let before = gallery.clone();

        gallery.apply(GalleryAction::RefreshStarted).expect("always applies");
        let outcome = gallery.apply(GalleryAction::PrimaryLoaded {
            batch: Ok(Vec::new()),
            sample: 0.5,
        });
        gallery.apply(GalleryAction::RefreshSettled).expect("always applies");

        assert_eq!(outcome, Err(FetchError::Empty));
        assert!(!gallery.refreshing);
        assert_eq!(gallery, before);
    }

    #[test]
    fn successful_refresh_swaps_images_then_shows_them() {
        let mut gallery = loaded_gallery();
        let fresh = vec![
            "https://images.example/new-0.jpeg".to_string(),
            "https://images.example/new-1.jpeg".to_string(),
        ];

        gallery.apply(GalleryAction::RefreshStarted).expect("always applies");
        gallery
            .apply(GalleryAction::PrimaryLoaded {
                batch: Ok(fresh.clone()),
                sample: 0.75,
            })
            .expect("non-empty batch");
        assert_eq!(gallery.visible_feature(), None);

        gallery.apply(GalleryAction::RefreshSettled).expect("always applies");
        assert_eq!(gallery.visible_feature(), Some("https://images.example/new-1.jpeg"));
        assert_eq!(gallery.cards, fresh);
        assert_eq!(gallery.trail.len(), 16);
    }

    #[test]
    fn trail_load_during_refresh_leaves_the_flag_alone() {
        let mut gallery = loaded_gallery();

        gallery.apply(GalleryAction::RefreshStarted).expect("always applies");
        gallery
            .apply(GalleryAction::TrailLoaded(Ok(urls(4))))
            .expect("non-empty batch");
        assert!(gallery.refreshing);
        assert_eq!(gallery.trail, urls(4));

        let failed = gallery.apply(GalleryAction::TrailLoaded(Err(FetchError::Transport(
            "offline".to_string(),
        ))));
        assert!(failed.is_err());
        assert!(gallery.refreshing);
        assert_eq!(gallery.trail, urls(4));
    }
}
