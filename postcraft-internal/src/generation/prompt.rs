use serde::{Deserialize, Serialize};

/// Number of posts requested from, and returned to, the client.
pub const POSTS_PER_GENERATION: usize = 5;

/// The five recognized writing styles.
///
/// A closed enum: the HTTP boundary rejects anything else at
/// deserialization time. `Default` is `Inspirational`, the variant any
/// non-enumerable input path collapses to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStyle {
    #[default]
    Inspirational,
    Educational,
    SuccessStory,
    Tips,
    Provocative,
}

impl PostStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStyle::Inspirational => "inspirational",
            PostStyle::Educational => "educational",
            PostStyle::SuccessStory => "success_story",
            PostStyle::Tips => "tips",
            PostStyle::Provocative => "provocative",
        }
    }

    /// The writing-guideline block injected into the generation prompt.
    fn guideline(&self) -> &'static str {
        match self {
            PostStyle::Inspirational => {
                "Style: INSPIRATIONAL\n\
                 - Motivating tone\n\
                 - A personal story or insight\n\
                 - A call to action and growth\n\
                 - Emotional impact\n\
                 - Use metaphors and vivid imagery"
            }
            PostStyle::Educational => {
                "Style: EDUCATIONAL\n\
                 - Share concrete knowledge\n\
                 - Structured information\n\
                 - Practical advice\n\
                 - Numbers and facts\n\
                 - Step-by-step instructions where they fit"
            }
            PostStyle::SuccessStory => {
                "Style: SUCCESS STORY\n\
                 - A story of achievement or of overcoming something\n\
                 - Before/after framing\n\
                 - Concrete results with numbers\n\
                 - Lessons and takeaways\n\
                 - Honesty about the hard parts"
            }
            PostStyle::Tips => {
                "Style: TIPS\n\
                 - 3-5 short practical tips\n\
                 - A numbered or bulleted list\n\
                 - Every tip is a concrete action\n\
                 - Emoji bullets are fine\n\
                 - Easy to apply today"
            }
            PostStyle::Provocative => {
                "Style: PROVOCATIVE\n\
                 - A contrarian or bold idea\n\
                 - A challenge to established opinion\n\
                 - A strong authorial stance\n\
                 - An invitation to debate\n\
                 - Thought-provoking, never offensive"
            }
        }
    }
}

impl std::fmt::Display for PostStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composes the single instruction prompt sent upstream: the topic, the
/// style guideline, and the strict output contract the parser relies on.
pub fn build_prompt(topic: &str, style: PostStyle) -> String {
    let guideline = style.guideline();
    format!(
        r#"You are an expert at writing viral LinkedIn posts.
Your task: create {POSTS_PER_GENERATION} unique posts on the topic: "{topic}"

{guideline}

RULES:
1. Each post must be 150-200 words.
2. Post structure:
   - hook: an opening line that grabs attention (1-2 intriguing sentences)
   - body: the main text (short paragraphs of 1-2 sentences, line breaks between paragraphs)
   - cta: a closing call to action (a question or a prompt)
3. Use emoji where they fit (2-5 per post).
4. Keep paragraphs short for easy reading.
5. Write in the same language as the topic.
6. Every post must be UNIQUE, each taking a different angle.

RESPONSE FORMAT (strict JSON):
{{
  "posts": [
    {{
      "hook": "the attention-grabbing opening line",
      "body": "the main text with line breaks",
      "cta": "the call to action"
    }}
  ]
}}

Create exactly {POSTS_PER_GENERATION} posts. Respond ONLY with JSON, no markdown fences."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_wire_names() {
        assert_eq!(
            serde_json::from_str::<PostStyle>("\"success_story\"").unwrap(),
            PostStyle::SuccessStory
        );
        assert_eq!(
            serde_json::to_string(&PostStyle::Inspirational).unwrap(),
            "\"inspirational\""
        );
    }

    #[test]
    fn test_unknown_style_is_rejected_at_the_boundary() {
        assert!(serde_json::from_str::<PostStyle>("\"casual\"").is_err());
    }

    #[test]
    fn test_default_style_is_inspirational() {
        assert_eq!(PostStyle::default(), PostStyle::Inspirational);
    }

    #[test]
    fn test_prompt_embeds_topic_and_guideline() {
        let prompt = build_prompt("remote onboarding", PostStyle::Tips);
        assert!(prompt.contains("\"remote onboarding\""));
        assert!(prompt.contains("Style: TIPS"));
        assert!(prompt.contains("strict JSON"));
        assert!(prompt.contains("150-200 words"));
    }
}
