//! Local intent handler.
//!
//! Answers conversational noise ("hi", "thanks", "who are you?") without
//! touching retrieval or the language model. Each intent has a group of
//! case-insensitive patterns and a pool of canned responses.
//!
//! # Evaluation order
//!
//! Groups are tried in a fixed order and the first match wins:
//!
//! ```text
//! help → ack → confusion → praise → identity → time → howru → thanks → greeting → farewell → mood
//! ```
//!
//! Greeting and farewell only apply to short messages (at most
//! [`SIMPLE_MESSAGE_TOKENS`] whitespace-separated tokens), so a question
//! that merely opens with "hi" still goes through retrieval.
//!
//! The time intent answers with the current local time. Every other intent
//! draws from its pool with a seedable RNG.
//!
//! # Example
//!
//! ```rust
//! use campus_assistant_core::intent::{IntentHandler, GREETING_RESPONSES};
//!
//! let handler = IntentHandler::with_seed(7);
//! let (handled, response) = handler.handle("hey there");
//! assert!(handled);
//! assert!(GREETING_RESPONSES.contains(&response.unwrap().as_str()));
//! ```

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use regex::{Regex, RegexBuilder};
use tracing::{debug, error};

use crate::models::{Intent, IntentMatch};

/// Greeting and farewell only match messages with at most this many tokens.
pub const SIMPLE_MESSAGE_TOKENS: usize = 5;

pub const GREETING_RESPONSES: &[&str] = &[
    "Hey! 👋 Welcome to the Campus Assistant. How can I help?",
    "Hi there 😊 Ask me anything about academics, events or campus life!",
    "Hello! 🎓 Ready when you are. What would you like to know?",
];

pub const FAREWELL_RESPONSES: &[&str] = &[
    "Bye 👋 Take care and all the best!",
    "See you! 🎓 Come back anytime.",
    "Good luck! Catch you later 😄",
];

pub const THANKS_RESPONSES: &[&str] = &[
    "You got it 😄 Anything else?",
    "Happy to help 👍",
    "Anytime! 🚀",
];

pub const ACK_RESPONSES: &[&str] = &[
    "Cool 😄 What's next?",
    "Alright 👍 Ask away.",
    "Got it! I'm here whenever you need me.",
];

pub const CONFUSION_RESPONSES: &[&str] = &[
    "No stress 🙂 Tell me which part was unclear.",
    "Gotcha. Want me to try a simpler explanation?",
    "All good, let's go step by step.",
];

pub const PRAISE_RESPONSES: &[&str] = &[
    "Appreciate it 😄 Let's keep going!",
    "Thanks! Always here to help 🎓",
    "That means a lot 🚀",
];

pub const HOWRU_RESPONSES: &[&str] = &[
    "Doing great 😄 How can I help?",
    "All good here! What do you need?",
];

pub const HELP_RESPONSES: &[&str] = &["I'm the Campus Assistant 🎓

I can help you with:
📚 Academics & Departments
🏆 Placements, Companies & Interviews
💼 Internships & Career Roadmaps
🎉 Events & Clubs
🎓 Scholarships
🏛️ Campus Facilities & Management

Ask me anything about campus!"];

pub const IDENTITY_RESPONSES: &[&str] = &[
    "I'm a campus assistant 🤖🎓 built to get students answers fast.",
    "Not human, but very campus-smart 😄",
];

pub const MOOD_RESPONSES: &[&str] = &[
    "College life hits hard 😅 Want some campus info?",
    "Hang in there 💪 How can I help?",
];

/// `(intent, patterns, responses)` in evaluation order. Time has no pool.
const RULES: &[(Intent, &[&str], &[&str])] = &[
    (
        Intent::Help,
        &[
            r"^(help|help\s*me)$",
            r"\b(what\s*can\s*you\s*do|your\s*capabilities)\b",
        ],
        HELP_RESPONSES,
    ),
    (
        Intent::Ack,
        &[
            r"^(ok|okay|cool|fine|alright|sure|got\s*it|hmm+|yep|yeah|ya)$",
            r"\b(makes\s*sense|sounds\s*good)\b",
        ],
        ACK_RESPONSES,
    ),
    (
        Intent::Confusion,
        &[
            r"\b(i\s*don'?t\s*understand|confused|didn'?t\s*get)\b",
            r"\b(explain\s*again|simplify|break\s*it\s*down)\b",
        ],
        CONFUSION_RESPONSES,
    ),
    (
        Intent::Praise,
        &[
            r"\b(nice|awesome|great|good\s*job|well\s*done)\b",
            r"\b(you('?re)?\s*(smart|helpful|amazing))\b",
        ],
        PRAISE_RESPONSES,
    ),
    (
        Intent::Identity,
        &[
            r"\b(who\s*are\s*you|what\s*are\s*you)\b",
            r"\b(are\s*you\s*a\s*bot)\b",
        ],
        IDENTITY_RESPONSES,
    ),
    (
        Intent::Time,
        &[r"\b(time\s*now|current\s*time|what\s*time)\b"],
        &[],
    ),
    (
        Intent::HowRu,
        &[r"\b(how\s*(are|r)\s*(you|u)|how'?s\s*it\s*going)\b"],
        HOWRU_RESPONSES,
    ),
    (
        Intent::Thanks,
        &[r"\b(thanks+|thank\s*you|thx|ty|appreciate\s*it)\b"],
        THANKS_RESPONSES,
    ),
    (
        Intent::Greeting,
        &[
            r"\b(hi+|hey+|hello+|hii+|hai+|helo+|hola|yo+|sup+|howdy)\b",
            r"\b(good\s*(morning|afternoon|evening|night|day))\b",
            r"^(hi|hey|hello|hai)[\s!?.]*$",
        ],
        GREETING_RESPONSES,
    ),
    (
        Intent::Farewell,
        &[
            r"\b(bye+|good\s*bye|see\s*ya|cya|later|ttyl|gn|good\s*night)\b",
            r"^(bye|bai)[\s!?.]*$",
        ],
        FAREWELL_RESPONSES,
    ),
    (
        Intent::Mood,
        &[r"\b(i'?m\s*(bored|tired|stressed|sad|happy))\b"],
        MOOD_RESPONSES,
    ),
];

struct IntentRule {
    intent: Intent,
    patterns: Vec<Regex>,
    responses: &'static [&'static str],
}

/// Pattern-based short-circuit for conversational messages.
///
/// Holds compiled patterns and a mutex-guarded RNG; safe to share across
/// request tasks.
pub struct IntentHandler {
    rules: Vec<IntentRule>,
    rng: Mutex<StdRng>,
}

impl IntentHandler {
    /// Handler with an entropy-seeded RNG.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Handler whose response selection is reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        let rules = RULES
            .iter()
            .map(|(intent, patterns, responses)| IntentRule {
                intent: *intent,
                patterns: patterns
                    .iter()
                    .filter_map(|p| {
                        RegexBuilder::new(p)
                            .case_insensitive(true)
                            .build()
                            .map_err(|e| {
                                error!(intent = %intent, pattern = %p, error = %e, "invalid intent pattern")
                            })
                            .ok()
                    })
                    .collect(),
                responses: *responses,
            })
            .collect();
        Self {
            rules,
            rng: Mutex::new(rng),
        }
    }

    /// Detect the first matching intent and pick its response.
    pub fn detect(&self, message: &str) -> Option<IntentMatch> {
        let msg = message.trim();
        if msg.is_empty() {
            return None;
        }
        let simple = msg.split_whitespace().count() <= SIMPLE_MESSAGE_TOKENS;

        let rule = self.rules.iter().find(|rule| {
            let guarded = matches!(rule.intent, Intent::Greeting | Intent::Farewell);
            (simple || !guarded) && rule.patterns.iter().any(|p| p.is_match(msg))
        })?;

        let response = match rule.intent {
            Intent::Time => time_response(),
            _ => self.pick(rule.responses)?,
        };
        debug!(intent = %rule.intent, "local intent matched");
        Some(IntentMatch {
            intent: rule.intent,
            response,
        })
    }

    /// `(true, response)` when a local intent answers the message.
    pub fn handle(&self, message: &str) -> (bool, Option<String>) {
        match self.detect(message) {
            Some(m) => (true, Some(m.response)),
            None => (false, None),
        }
    }

    /// The response pool for `intent`. Empty for [`Intent::Time`].
    pub fn responses_for(intent: Intent) -> &'static [&'static str] {
        RULES
            .iter()
            .find(|(i, _, _)| *i == intent)
            .map(|(_, _, responses)| *responses)
            .unwrap_or(&[])
    }

    fn pick(&self, pool: &[&str]) -> Option<String> {
        let choice = match self.rng.lock() {
            Ok(mut rng) => pool.choose(&mut *rng),
            Err(_) => pool.first(),
        };
        choice.map(|s| s.to_string())
    }
}

impl Default for IntentHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn time_response() -> String {
    format!("It's {} ⏰", chrono::Local::now().format("%I:%M %p"))
}
