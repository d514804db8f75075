//! Image store trait and question-to-image matching.
//!
//! Matching looks at the first [`MAX_IMAGES_CONSIDERED`] images filed under
//! the detected category. An image is selected when either
//!
//! - its label appears (case-insensitively) inside the question, or
//! - the question mentions a synonym of a keyword in [`IMAGE_KEYWORDS`]
//!   and the label contains that keyword.
//!
//! Each image is tested on its own. When nothing matches but the category
//! has images, the first one is returned as a default.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::Image;

/// Only this many images of a category are tested against the question.
pub const MAX_IMAGES_CONSIDERED: usize = 5;

/// `(label keyword, question synonyms)`.
pub const IMAGE_KEYWORDS: &[(&str, &[&str])] = &[
    ("chairman", &["chairman", "chair"]),
    ("principal", &["principal", "head"]),
    ("director", &["director"]),
    ("hod", &["hod", "head of department"]),
    ("event", &["event", "festival", "function"]),
    ("sports", &["sports", "team", "match", "tournament"]),
    ("campus", &["campus", "building", "infrastructure"]),
    ("club", &["club"]),
];

/// Read access to labelled images, as consumed by the chat path.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Images filed under `category`, in upload order.
    async fn list_by_category(&self, category: &str) -> Result<Vec<Image>>;
}

/// Pick the images relevant to `question` from a category's images.
pub fn select_images(question: &str, images: &[Image]) -> Vec<Image> {
    let question = question.to_lowercase();
    let mut selected: Vec<Image> = images
        .iter()
        .take(MAX_IMAGES_CONSIDERED)
        .filter(|image| image_matches(&question, image))
        .cloned()
        .collect();

    if selected.is_empty() {
        if let Some(first) = images.first() {
            selected.push(first.clone());
        }
    }
    selected
}

fn image_matches(question: &str, image: &Image) -> bool {
    let label = image.label.trim().to_lowercase();
    if label.is_empty() {
        return false;
    }
    if question.contains(&label) {
        return true;
    }
    IMAGE_KEYWORDS.iter().any(|(keyword, synonyms)| {
        label.contains(keyword) && synonyms.iter().any(|s| question.contains(s))
    })
}

/// Images for a chat answer. Lookup failures yield an empty list.
pub async fn match_images(store: &dyn ImageStore, question: &str, category: &str) -> Vec<Image> {
    match store.list_by_category(category).await {
        Ok(images) => {
            let selected = select_images(question, &images);
            debug!(
                category = %category,
                available = images.len(),
                selected = selected.len(),
                "images matched"
            );
            selected
        }
        Err(e) => {
            warn!(category = %category, error = %e, "image lookup failed");
            Vec::new()
        }
    }
}

/// Image store with no images. Used when image storage is not configured.
pub struct NoImages;

#[async_trait]
impl ImageStore for NoImages {
    async fn list_by_category(&self, _category: &str) -> Result<Vec<Image>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn img(label: &str) -> Image {
        Image {
            label: label.to_string(),
            url: format!("http://localhost/api/v1/images/file/about/{}.png", label),
            description: String::new(),
            category: "about".to_string(),
        }
    }

    struct Failing;

    #[async_trait]
    impl ImageStore for Failing {
        async fn list_by_category(&self, _category: &str) -> Result<Vec<Image>> {
            Err(Error::ImageStore("disk gone".to_string()))
        }
    }

    #[test]
    fn test_verbatim_label_match() {
        let images = vec![img("Dr. Rao"), img("Library")];
        let out = select_images("Tell me about dr. rao please", &images);
        assert_eq!(out, vec![img("Dr. Rao")]);
    }

    #[test]
    fn test_keyword_synonym_match() {
        let images = vec![img("Principal Photo"), img("Chairman Portrait")];
        let out = select_images("who is the chair of the college?", &images);
        assert_eq!(out, vec![img("Chairman Portrait")]);
    }

    #[test]
    fn test_each_image_tested_independently() {
        let images = vec![img("Sports Day"), img("Cricket Team Sports"), img("Library")];
        let out = select_images("which team won the tournament", &images);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_fallback_to_first_image() {
        let images = vec![img("Library"), img("Canteen")];
        let out = select_images("what are the fees", &images);
        assert_eq!(out, vec![img("Library")]);
    }

    #[test]
    fn test_only_first_five_considered() {
        let mut images: Vec<Image> = (0..5).map(|i| img(&format!("photo{}", i))).collect();
        images.push(img("Chairman"));
        let out = select_images("show me the chairman", &images);
        assert_eq!(out, vec![img("photo0")]);
    }

    #[test]
    fn test_no_images_no_output() {
        assert!(select_images("chairman", &[]).is_empty());
    }

    #[tokio::test]
    async fn test_lookup_failure_is_empty() {
        assert!(match_images(&Failing, "chairman", "about").await.is_empty());
    }
}
