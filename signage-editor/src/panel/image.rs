use async_trait::async_trait;
use std::sync::Arc;

use super::{style_of, Committer, PanelContext, PropertyChangeCommand, PxSlider, RADIUS_RANGE};
use crate::error::{EditorError, EditorResult};
use crate::protocol::SelectedElement;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Stores an image somewhere reachable and returns its URL. Supplied by the host page.
#[async_trait]
pub trait ImageUploader: Send + Sync {
    async fn upload(&self, file: ImageFile) -> EditorResult<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectFit {
    Cover,
    Contain,
    Fill,
    None,
}

impl ObjectFit {
    pub const ALL: [ObjectFit; 4] = [ObjectFit::Cover, ObjectFit::Contain, ObjectFit::Fill, ObjectFit::None];

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectFit::Cover => "cover",
            ObjectFit::Contain => "contain",
            ObjectFit::Fill => "fill",
            ObjectFit::None => "none",
        }
    }

    /// Values outside the offered set (`scale-down`) show as `fill`.
    pub fn from_computed(value: &str) -> Self {
        match value {
            "cover" => ObjectFit::Cover,
            "contain" => ObjectFit::Contain,
            "none" => ObjectFit::None,
            _ => ObjectFit::Fill,
        }
    }
}

pub struct ImageEditor {
    committer: Committer,
    uploader: Option<Arc<dyn ImageUploader>>,
    /// `<img>` elements change `src`; background images change `backgroundImage`.
    is_img: bool,
    src: String,
    src_draft: Option<String>,
    object_fit: ObjectFit,
    border_radius: PxSlider,
}

impl ImageEditor {
    pub fn new(selection: &SelectedElement, ctx: &PanelContext) -> Self {
        let is_img = selection.tag_name == "img";
        let src = if is_img {
            selection.src.clone()
        } else {
            background_url(style_of(selection, "backgroundImage")).unwrap_or_default()
        };
        Self {
            committer: ctx.committer(&selection.element_id),
            uploader: ctx.uploader.clone(),
            is_img,
            src,
            src_draft: None,
            object_fit: ObjectFit::from_computed(style_of(selection, "objectFit")),
            border_radius: PxSlider::new(style_of(selection, "borderRadius"), RADIUS_RANGE),
        }
    }

    pub fn src(&self) -> &str {
        self.src_draft.as_deref().unwrap_or(&self.src)
    }

    pub fn object_fit(&self) -> ObjectFit {
        self.object_fit
    }

    pub fn border_radius(&self) -> u32 {
        self.border_radius.position()
    }

    fn commit_src(&mut self, url: &str) -> Option<PropertyChangeCommand> {
        let command = if self.is_img {
            self.committer.commit("src", &self.src, url)
        } else {
            self.committer.commit(
                "backgroundImage",
                &css_url(&self.src),
                &css_url(url),
            )
        };
        self.src = url.to_string();
        command
    }

    /// Typing in the URL field. Nothing is sent until blur.
    pub fn edit_src(&mut self, text: &str) {
        self.src_draft = Some(text.to_string());
    }

    pub fn blur_src(&mut self) -> Option<PropertyChangeCommand> {
        let draft = self.src_draft.take()?;
        let url = draft.trim();
        if url.is_empty() {
            return None;
        }
        self.commit_src(url)
    }

    /// Hand the file to the host's uploader and use the returned URL.
    pub async fn upload(&mut self, file: ImageFile) -> EditorResult<Option<PropertyChangeCommand>> {
        let uploader = self
            .uploader
            .clone()
            .ok_or_else(|| EditorError::Upload("no image uploader configured".into()))?;
        let name = file.name.clone();
        let url = uploader.upload(file).await.map_err(|e| {
            tracing::warn!(file = %name, error = %e, "image upload failed");
            match e {
                EditorError::Upload(_) => e,
                other => EditorError::Upload(other.to_string()),
            }
        })?;
        if url.trim().is_empty() {
            return Err(EditorError::Upload(format!("uploader returned no URL for {}", name)));
        }
        self.src_draft = None;
        Ok(self.commit_src(url.trim()))
    }

    pub fn set_object_fit(&mut self, fit: ObjectFit) -> Option<PropertyChangeCommand> {
        let command = self
            .committer
            .commit("objectFit", self.object_fit.as_str(), fit.as_str());
        self.object_fit = fit;
        command
    }

    pub fn set_border_radius(&mut self, px: u32) -> Option<PropertyChangeCommand> {
        self.border_radius.set(&self.committer, "borderRadius", px)
    }
}

fn css_url(url: &str) -> String {
    if url.is_empty() {
        "none".to_string()
    } else {
        format!("url(\"{}\")", url.replace('"', "\\\""))
    }
}

/// `url("a.png")` -> `a.png`.
fn background_url(computed: &str) -> Option<String> {
    let inner = computed.trim().strip_prefix("url(")?.strip_suffix(')')?;
    Some(inner.trim().trim_matches(['"', '\'']).to_string())
}
