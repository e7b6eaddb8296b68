//! Generation orchestration: prompt composition, the upstream Gemini
//! call under a deadline, and parsing of the free-text result into
//! structured posts.

pub mod gemini;
pub mod parser;
pub mod prompt;

use std::future::Future;
use std::time::Duration;

pub use gemini::GeminiProvider;
pub use parser::{parse_generation_text, Post};
pub use prompt::{build_prompt, PostStyle, POSTS_PER_GENERATION};

use crate::error::{Error, ErrorDetails};

/// Races a generation future against the deadline.
///
/// On elapse the in-flight upstream call is dropped; its eventual
/// completion, if any, is discarded.
async fn with_deadline<T>(
    deadline: Duration,
    fut: impl Future<Output = Result<T, Error>>,
) -> Result<T, Error> {
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::new(ErrorDetails::GenerationTimeout { deadline })),
    }
}

/// Generates up to [`POSTS_PER_GENERATION`] posts for a topic/style pair.
///
/// Single upstream attempt; every failure mode (missing credential,
/// transport error, deadline elapse, unparseable output) surfaces as a
/// distinct [`ErrorDetails`] kind for the handler to map.
pub async fn generate(
    provider: &GeminiProvider,
    http_client: &reqwest::Client,
    deadline: Duration,
    topic: &str,
    style: PostStyle,
) -> Result<Vec<Post>, Error> {
    let prompt = build_prompt(topic, style);
    let raw = with_deadline(deadline, provider.generate_text(http_client, &prompt)).await?;
    parse_generation_text(&raw)
}
