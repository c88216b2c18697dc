//! Decides whether an inbound message deserves an emoji reply.
//!
//! Rules run against a lower-cased copy of the text in fixed priority order
//! and the first one that fires wins:
//! 1. count request ("3 dinos")
//! 2. direct address by a trigger phrase
//! 3. the "(randy pooping)" phrase
//! 4. a question, answered at random

use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;
use tracing::debug;

use super::ResponderSettings;

static COUNT_REQUEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(.*\D|^)(\d+) (dino|dinolike|dino-like).*").expect("count request pattern")
});

const FIXED_PHRASE: &str = "(randy pooping)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// An explicit request for this many emoji, already clamped.
    CountRequest(u32),
    DirectAddress,
    FixedPhrase,
    Question,
}

enum CountMatch {
    Absent,
    Count(u32),
    /// Digits that do not fit an integer; the message gets no reply at all.
    Unparseable,
}

pub fn classify<R: Rng + ?Sized>(
    text: &str,
    user_id: &str,
    settings: &ResponderSettings,
    rng: &mut R,
) -> Option<Trigger> {
    let text = text.to_lowercase();

    match count_request(&text, settings.max_emoji) {
        CountMatch::Count(n) if n > 0 => return Some(Trigger::CountRequest(n)),
        CountMatch::Unparseable => {
            debug!("Count request does not fit an integer, ignoring message");
            return None;
        }
        CountMatch::Count(_) | CountMatch::Absent => {}
    }

    if is_direct_address(&text, user_id, settings) {
        return Some(Trigger::DirectAddress);
    }

    if text.contains(FIXED_PHRASE) {
        return Some(Trigger::FixedPhrase);
    }

    if text.contains('?') {
        let roll: f64 = rng.gen();
        debug!("Question roll {:.3} against weight {}", roll, settings.question_weight);
        if roll <= settings.question_weight {
            return Some(Trigger::Question);
        }
    }

    None
}

fn count_request(text: &str, max: u32) -> CountMatch {
    let Some(captures) = COUNT_REQUEST.captures(text) else {
        return CountMatch::Absent;
    };
    match captures[2].parse::<u32>() {
        Ok(n) => CountMatch::Count(n.min(max)),
        Err(_) => CountMatch::Unparseable,
    }
}

fn is_direct_address(text: &str, user_id: &str, settings: &ResponderSettings) -> bool {
    let allowed =
        settings.allowed_user_ids.is_empty() || settings.allowed_user_ids.contains(user_id);
    allowed && settings.trigger_phrases.iter().any(|p| text.contains(p.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;
    use std::collections::HashSet;

    fn settings() -> ResponderSettings {
        ResponderSettings {
            allowed_user_ids: HashSet::new(),
            trigger_phrases: vec!["hey dinobot".to_string()],
            question_weight: 0.075,
            max_emoji: 100,
            post_delay: std::time::Duration::ZERO,
        }
    }

    /// Always draws 0.0, so any question fires.
    fn lucky() -> StepRng {
        StepRng::new(0, 0)
    }

    /// Always draws just under 1.0, so no question fires.
    fn unlucky() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    fn run(text: &str, user_id: &str, settings: &ResponderSettings) -> Option<Trigger> {
        classify(text, user_id, settings, &mut unlucky())
    }

    #[test]
    fn test_count_request_exact_for_every_allowed_count() {
        let s = settings();
        for n in 1..=100u32 {
            assert_eq!(
                run(&format!("{} dino", n), "u1", &s),
                Some(Trigger::CountRequest(n)),
                "count {}",
                n
            );
        }
    }

    #[test]
    fn test_count_request_clamped_to_max() {
        let s = settings();
        assert_eq!(run("101 dinos", "u1", &s), Some(Trigger::CountRequest(100)));
        assert_eq!(run("5000 dino", "u1", &s), Some(Trigger::CountRequest(100)));
    }

    #[test]
    fn test_count_request_variants() {
        let s = settings();
        assert_eq!(run("3 dinos", "u1", &s), Some(Trigger::CountRequest(3)));
        assert_eq!(
            run("so cool 3 dinos yay", "u1", &s),
            Some(Trigger::CountRequest(3))
        );
        assert_eq!(run("I need 12 DINOS", "u1", &s), Some(Trigger::CountRequest(12)));
        assert_eq!(run("4 dinolike things", "u1", &s), Some(Trigger::CountRequest(4)));
        assert_eq!(run("7 dino-like", "u1", &s), Some(Trigger::CountRequest(7)));
        assert_eq!(run("abc12 dino", "u1", &s), Some(Trigger::CountRequest(12)));
        assert_eq!(run("abc123 dino", "u1", &s), Some(Trigger::CountRequest(100)));
    }

    #[test]
    fn test_count_needs_single_space_before_dino() {
        let s = settings();
        assert_eq!(run("3dinos", "u1", &s), None);
        assert_eq!(run("3  dinos", "u1", &s), None);
    }

    #[test]
    fn test_zero_count_falls_through_to_lower_rules() {
        let s = settings();
        assert_eq!(run("0 dinos", "u1", &s), None);
        assert_eq!(
            run("0 dinos hey dinobot", "u1", &s),
            Some(Trigger::DirectAddress)
        );
    }

    #[test]
    fn test_overflowing_count_is_no_action() {
        let s = settings();
        assert_eq!(run("99999999999999999999 dinos hey dinobot", "u1", &s), None);
        assert_eq!(
            classify("99999999999999999999 dinos?", "u1", &s, &mut lucky()),
            None
        );
    }

    #[test]
    fn test_direct_address_is_case_insensitive() {
        let s = settings();
        assert_eq!(run("HEY DINOBOT", "u1", &s), Some(Trigger::DirectAddress));
        assert_eq!(
            run("Oh hey dinobot what's up?", "u1", &s),
            Some(Trigger::DirectAddress)
        );
    }

    #[test]
    fn test_direct_address_respects_allow_list() {
        let mut s = settings();
        s.allowed_user_ids = HashSet::from(["u2".to_string()]);
        assert_eq!(run("HEY DINOBOT", "u1", &s), None);
        assert_eq!(run("HEY DINOBOT", "u2", &s), Some(Trigger::DirectAddress));
    }

    #[test]
    fn test_any_trigger_phrase_matches() {
        let mut s = settings();
        s.trigger_phrases = vec!["yo dino".to_string(), "sup rex".to_string()];
        assert_eq!(run("well sup rex", "u1", &s), Some(Trigger::DirectAddress));
        assert_eq!(run("hey dinobot", "u1", &s), None);
    }

    #[test]
    fn test_fixed_phrase() {
        let s = settings();
        assert_eq!(
            run("look (Randy Pooping) lol", "u1", &s),
            Some(Trigger::FixedPhrase)
        );
        assert_eq!(run("randy pooping", "u1", &s), None);
    }

    #[test]
    fn test_count_request_outranks_everything() {
        let s = settings();
        assert_eq!(
            classify("hey dinobot 2 dinos (randy pooping)?", "u1", &s, &mut lucky()),
            Some(Trigger::CountRequest(2))
        );
    }

    #[test]
    fn test_question_depends_on_roll() {
        let s = settings();
        assert_eq!(
            classify("what time is it?", "u1", &s, &mut lucky()),
            Some(Trigger::Question)
        );
        assert_eq!(classify("what time is it?", "u1", &s, &mut unlucky()), None);
    }

    #[test]
    fn test_question_roll_is_inclusive_of_weight() {
        let mut s = settings();
        s.question_weight = 0.0;
        assert_eq!(
            classify("anyone?", "u1", &s, &mut lucky()),
            Some(Trigger::Question)
        );
    }

    #[test]
    fn test_plain_text_never_draws() {
        let s = settings();
        // A lucky source would fire on a question; plain text must not consult it.
        for text in ["None here", "dinos are neat", "3 dogs", ""] {
            assert_eq!(classify(text, "u1", &s, &mut lucky()), None, "{}", text);
        }
    }
}
