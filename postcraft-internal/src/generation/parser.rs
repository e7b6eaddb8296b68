use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::prompt::POSTS_PER_GENERATION;
use crate::error::{Error, ErrorDetails};

/// One generated post: the three-part structure the client renders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub hook: String,
    pub body: String,
    pub cta: String,
}

/// The document the upstream model is instructed to produce.
#[derive(Debug, Deserialize)]
struct GenerationDocument {
    #[serde(default)]
    posts: Vec<PostCandidate>,
}

/// A post as the model actually returned it: any field may be missing.
#[derive(Debug, Deserialize)]
struct PostCandidate {
    #[serde(default)]
    hook: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    cta: Option<String>,
}

impl PostCandidate {
    /// Keeps only candidates with all three parts present and non-empty.
    fn into_post(self) -> Option<Post> {
        match (self.hook, self.body, self.cta) {
            (Some(hook), Some(body), Some(cta))
                if !hook.is_empty() && !body.is_empty() && !cta.is_empty() =>
            {
                Some(Post { hook, body, cta })
            }
            _ => None,
        }
    }
}

fn fenced_block_regex() -> &'static Regex {
    static FENCED_BLOCK: OnceLock<Regex> = OnceLock::new();
    FENCED_BLOCK.get_or_init(|| {
        #[expect(clippy::expect_used)]
        let regex =
            Regex::new(r"```(?:[A-Za-z0-9_-]+)?\s*(?s:(.*?))```").expect("fence regex is valid");
        regex
    })
}

/// Locates the JSON document inside the model's free-text output.
///
/// Strips one fenced block if present (an optional language tag on the
/// fence is tolerated); if the remainder still does not start with `{`,
/// falls back to the first-`{`-to-last-`}` substring.
fn extract_json_document(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(captures) = fenced_block_regex().captures(text) {
        if let Some(inner) = captures.get(1) {
            text = inner.as_str().trim();
        }
    }

    if !text.starts_with('{') {
        if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
            if start < end {
                text = &text[start..=end];
            }
        }
    }

    text
}

/// Parses and validates upstream output into at most
/// [`POSTS_PER_GENERATION`] posts.
///
/// The model is told to return bare JSON but routinely wraps it in
/// markdown fences or pads it with prose, so the document is located
/// first. Candidates missing any part are dropped; zero survivors is a
/// validation failure; surplus posts are truncated, not rejected.
pub fn parse_generation_text(raw: &str) -> Result<Vec<Post>, Error> {
    let document = extract_json_document(raw);

    let parsed: GenerationDocument = serde_json::from_str(document).map_err(|e| {
        Error::new(ErrorDetails::OutputParsing {
            message: e.to_string(),
            raw_output: raw.to_string(),
        })
    })?;

    if parsed.posts.is_empty() {
        return Err(Error::new(ErrorDetails::OutputValidation {
            message: "Invalid generation output: no posts in response".to_string(),
        }));
    }

    let posts: Vec<Post> = parsed
        .posts
        .into_iter()
        .filter_map(PostCandidate::into_post)
        .take(POSTS_PER_GENERATION)
        .collect();

    if posts.is_empty() {
        return Err(Error::new(ErrorDetails::OutputValidation {
            message: "Invalid generation output: no valid posts in response".to_string(),
        }));
    }

    Ok(posts)
}
